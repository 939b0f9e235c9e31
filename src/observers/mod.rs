pub mod analytics;
pub mod billing;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;

use crate::notification::DeliveryEvent;

pub use analytics::AnalyticsObserver;
pub use billing::BillingObserver;

/// Listener run after a successful delivery. It cannot influence the outcome.
pub trait Observer: Send + Sync {
    fn name(&self) -> &str;
    fn on_delivered(&self, event: &DeliveryEvent) -> Result<()>;
}

/// Observers in registration order. Fixed once the dispatcher is built.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverSet {
    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run every observer in order. Errors and panics are logged and skipped.
    /// Returns how many observers faulted.
    pub fn notify(&self, event: &DeliveryEvent) -> usize {
        let mut faults = 0;
        for observer in &self.observers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer.on_delivered(event)));
            let fault = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            faults += 1;
            tracing::warn!(
                observer = observer.name(),
                channel = %event.channel_type,
                "Observer fault: {fault}"
            );
        }
        faults
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
