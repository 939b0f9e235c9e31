use std::sync::Arc;

use chrono::Local;

use crate::channels::{ChannelBackend, ChannelRegistry};
use crate::delivery::{AttemptJournal, LoggingChannel, RetryChannel, RetryPolicy};
use crate::notification::{DeliveryEvent, DeliveryOutcome, NotificationRequest};
use crate::observers::{Observer, ObserverSet};

/// Where a single dispatch ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    ResolutionFailed,
    DeliveredWithObserversNotified,
    DeliveryFailedAfterRetries,
}

/// Resolves, decorates and transmits notifications, then fans successful
/// deliveries out to observers.
///
/// The registry and observer list are frozen by [`DispatcherBuilder::build`],
/// so a `Dispatcher` can be shared across tasks and dispatch concurrently.
pub struct Dispatcher {
    registry: ChannelRegistry,
    observers: ObserverSet,
    retry: RetryPolicy,
    journal: Option<Arc<AttemptJournal>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn channel_types(&self) -> Vec<&str> {
        self.registry.channel_types()
    }

    pub async fn dispatch(&self, request: NotificationRequest) -> DeliveryOutcome {
        let (outcome, state) = self.run(&request).await;
        match state {
            DispatchState::DeliveredWithObserversNotified => tracing::info!(
                channel = request.channel_type(),
                recipient = request.recipient(),
                ?state,
                "Dispatch finished"
            ),
            _ => tracing::warn!(
                channel = request.channel_type(),
                recipient = request.recipient(),
                ?state,
                "Dispatch finished: {}",
                outcome.error().map(ToString::to_string).unwrap_or_default()
            ),
        }
        outcome
    }

    async fn run(&self, request: &NotificationRequest) -> (DeliveryOutcome, DispatchState) {
        let backend = match self.registry.resolve(request.channel_type()) {
            Ok(backend) => backend,
            Err(e) => return (DeliveryOutcome::Failed(e), DispatchState::ResolutionFailed),
        };

        let chain = self.decorate(backend, request.channel_type());
        let outcome = chain.transmit(request).await;
        if !outcome.is_success() {
            return (outcome, DispatchState::DeliveryFailedAfterRetries);
        }

        if !self.observers.is_empty() {
            let event = DeliveryEvent::from_request(request, Local::now());
            let faults = self.observers.notify(&event);
            if faults > 0 {
                tracing::debug!(
                    "{faults} of {} observers faulted; delivery still succeeded",
                    self.observers.len()
                );
            }
        }
        (outcome, DispatchState::DeliveredWithObserversNotified)
    }

    /// Retry(Logging(backend)): every attempt, retried ones included, is logged.
    fn decorate(&self, backend: Box<dyn ChannelBackend>, channel: &str) -> RetryChannel {
        let mut logging = LoggingChannel::new(backend, channel);
        if let Some(journal) = &self.journal {
            logging = logging.with_journal(journal.clone());
        }
        RetryChannel::new(Box::new(logging), self.retry.clone())
    }
}

#[derive(Default)]
pub struct DispatcherBuilder {
    registry: ChannelRegistry,
    observers: ObserverSet,
    retry: RetryPolicy,
    journal: Option<Arc<AttemptJournal>>,
}

impl DispatcherBuilder {
    pub fn register_channel<F>(mut self, channel_type: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ChannelBackend> + Send + Sync + 'static,
    {
        self.registry.register(channel_type, constructor);
        self
    }

    /// Observers run in the order they are registered.
    pub fn register_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn journal(mut self, journal: Arc<AttemptJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            observers: self.observers,
            retry: self.retry,
            journal: self.journal,
        }
    }
}
