use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;

use super::Observer;
use crate::notification::DeliveryEvent;

/// Counts deliveries per (channel, notification type).
#[derive(Default)]
pub struct AnalyticsObserver {
    counts: Mutex<BTreeMap<(String, String), u64>>,
}

impl AnalyticsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<(String, String, u64)> {
        self.counts
            .lock()
            .expect("analytics lock poisoned")
            .iter()
            .map(|((channel, kind), n)| (channel.clone(), kind.clone(), *n))
            .collect()
    }
}

impl Observer for AnalyticsObserver {
    fn name(&self) -> &str {
        "analytics"
    }

    fn on_delivered(&self, event: &DeliveryEvent) -> Result<()> {
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| anyhow::anyhow!("analytics counters poisoned"))?;
        *counts
            .entry((event.channel_type.clone(), event.notification_type.clone()))
            .or_default() += 1;
        tracing::debug!(
            channel = %event.channel_type,
            notification_type = %event.notification_type,
            "Analytics recorded delivery"
        );
        Ok(())
    }
}
