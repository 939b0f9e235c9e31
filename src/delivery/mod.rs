//! Decorators that wrap a [`ChannelBackend`](crate::channels::ChannelBackend)
//! and expose the same contract, so they stack to any depth.

pub mod logging;
pub mod retry;

pub use logging::{AttemptJournal, JournalEntry, LoggingChannel};
pub use retry::{RetryChannel, RetryPolicy};
