use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::channels::ChannelBackend;
use crate::notification::{DeliveryOutcome, NotificationRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    Attempt {
        channel: String,
        recipient: String,
        attempt: u32,
        at: DateTime<Local>,
    },
    /// Always follows the `Attempt` entry with the same number.
    Outcome {
        attempt: u32,
        success: bool,
        error: Option<String>,
        elapsed: Duration,
    },
}

/// In-memory record of delivery attempts, for callers that want to inspect
/// them after a dispatch (the `send` command prints it).
#[derive(Default)]
pub struct AttemptJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl AttemptJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: JournalEntry) {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .push(entry);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().expect("journal lock poisoned").clone()
    }

    pub fn attempts(&self) -> usize {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .iter()
            .filter(|e| matches!(e, JournalEntry::Attempt { .. }))
            .count()
    }
}

/// Logs every call to the wrapped backend and its outcome. Never alters the outcome.
pub struct LoggingChannel {
    inner: Box<dyn ChannelBackend>,
    channel: String,
    journal: Option<Arc<AttemptJournal>>,
    calls: AtomicU32,
}

impl LoggingChannel {
    pub fn new(inner: Box<dyn ChannelBackend>, channel: impl Into<String>) -> Self {
        Self {
            inner,
            channel: channel.into(),
            journal: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_journal(mut self, journal: Arc<AttemptJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    fn record(&self, entry: JournalEntry) {
        if let Some(journal) = &self.journal {
            journal.push(entry);
        }
    }
}

#[async_trait::async_trait]
impl ChannelBackend for LoggingChannel {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let attempt = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let recipient = request.recipient();
        tracing::info!(channel = %self.channel, recipient, attempt, "Delivery attempt");
        self.record(JournalEntry::Attempt {
            channel: self.channel.clone(),
            recipient: recipient.to_string(),
            attempt,
            at: Local::now(),
        });

        let started = Instant::now();
        let outcome = self.inner.transmit(request).await;
        let elapsed = started.elapsed();

        let elapsed_ms = elapsed.as_millis() as u64;
        match &outcome {
            DeliveryOutcome::Delivered => {
                tracing::info!(channel = %self.channel, recipient, attempt, elapsed_ms, success = true, "Delivered");
            }
            DeliveryOutcome::Failed(e) => {
                tracing::warn!(channel = %self.channel, recipient, attempt, elapsed_ms, success = false, "Delivery failed: {e}");
            }
        }
        self.record(JournalEntry::Outcome {
            attempt,
            success: outcome.is_success(),
            error: outcome.error().map(ToString::to_string),
            elapsed,
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;

    struct Fixed(DeliveryOutcome);

    #[async_trait::async_trait]
    impl ChannelBackend for Fixed {
        async fn transmit(&self, _request: &NotificationRequest) -> DeliveryOutcome {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_passes_outcome_through() {
        let failure = DeliveryOutcome::Failed(DeliveryError::transmission("push-alert", "down"));
        for outcome in [DeliveryOutcome::Delivered, failure] {
            let channel = LoggingChannel::new(Box::new(Fixed(outcome.clone())), "push-alert");
            let req = NotificationRequest::new("dev-1", "Hi", "push-alert");
            assert_eq!(channel.transmit(&req).await, outcome);
        }
    }

    #[tokio::test]
    async fn test_journal_records_attempt_then_outcome() {
        let journal = Arc::new(AttemptJournal::new());
        let failure = DeliveryError::transmission("short-message", "gateway down");
        let channel = LoggingChannel::new(
            Box::new(Fixed(DeliveryOutcome::Failed(failure.clone()))),
            "short-message",
        )
        .with_journal(journal.clone());
        let req = NotificationRequest::new("+1555", "Urgent", "short-message");

        channel.transmit(&req).await;
        channel.transmit(&req).await;

        let entries = journal.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(journal.attempts(), 2);
        assert!(matches!(
            &entries[0],
            JournalEntry::Attempt { attempt: 1, channel, recipient, .. }
                if channel == "short-message" && recipient == "+1555"
        ));
        match &entries[3] {
            JournalEntry::Outcome { attempt, success, error, .. } => {
                assert_eq!(*attempt, 2);
                assert!(!success);
                assert_eq!(error.as_deref(), Some(failure.to_string().as_str()));
            }
            other => panic!("expected outcome, got {other:?}"),
        }
    }
}
