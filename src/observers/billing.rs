use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use super::Observer;
use crate::notification::DeliveryEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charge {
    pub recipient: String,
    pub channel_type: String,
    pub notification_type: String,
    pub amount: f64,
    pub at: DateTime<Local>,
}

/// Charges a fixed unit cost per delivery, priced by channel.
pub struct BillingObserver {
    unit_costs: BTreeMap<String, f64>,
    ledger: Mutex<Vec<Charge>>,
}

impl BillingObserver {
    pub fn new(unit_costs: BTreeMap<String, f64>) -> Self {
        Self {
            unit_costs,
            ledger: Mutex::new(Vec::new()),
        }
    }

    pub fn charges(&self) -> Vec<Charge> {
        self.ledger.lock().expect("ledger lock poisoned").clone()
    }

    pub fn total(&self) -> f64 {
        self.ledger
            .lock()
            .expect("ledger lock poisoned")
            .iter()
            .map(|c| c.amount)
            .sum()
    }
}

impl Observer for BillingObserver {
    fn name(&self) -> &str {
        "billing"
    }

    fn on_delivered(&self, event: &DeliveryEvent) -> Result<()> {
        let Some(&amount) = self.unit_costs.get(&event.channel_type) else {
            anyhow::bail!("No unit cost for channel {}", event.channel_type);
        };
        let charge = Charge {
            recipient: event.recipient.clone(),
            channel_type: event.channel_type.clone(),
            notification_type: event.notification_type.clone(),
            amount,
            at: event.timestamp,
        };
        self.ledger
            .lock()
            .map_err(|_| anyhow::anyhow!("billing ledger poisoned"))?
            .push(charge);
        tracing::debug!(channel = %event.channel_type, amount, "Billing charge recorded");
        Ok(())
    }
}
