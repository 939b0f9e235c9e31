pub mod direct;
pub mod gateway;
pub mod push;
pub mod short;
#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::dispatcher::DispatcherBuilder;
use crate::error::DeliveryError;
use crate::notification::{DeliveryOutcome, NotificationRequest};

pub use direct::DirectMessageChannel;
pub use gateway::Gateway;
pub use push::PushAlertChannel;
pub use short::ShortMessageChannel;

pub const BUILTIN_CHANNELS: &[&str] = &[
    DirectMessageChannel::TYPE,
    ShortMessageChannel::TYPE,
    PushAlertChannel::TYPE,
];

/// Transmits a notification over one medium.
///
/// Implementations report every transport problem through
/// [`DeliveryOutcome::Failed`] and keep no per-request state once
/// `transmit` returns.
#[async_trait::async_trait]
pub trait ChannelBackend: Send + Sync {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome;
}

pub type ChannelConstructor = Arc<dyn Fn() -> Box<dyn ChannelBackend> + Send + Sync>;

#[derive(Default)]
pub struct ChannelRegistry {
    constructors: HashMap<String, ChannelConstructor>,
}

impl ChannelRegistry {
    /// Registering the same channel type twice replaces the earlier constructor.
    pub fn register<F>(&mut self, channel_type: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn ChannelBackend> + Send + Sync + 'static,
    {
        let channel_type = channel_type.into();
        if self
            .constructors
            .insert(channel_type.clone(), Arc::new(constructor))
            .is_some()
        {
            tracing::warn!("Channel {channel_type} registered twice, keeping the latest");
        }
    }

    /// Build a fresh backend for `channel_type`.
    pub fn resolve(&self, channel_type: &str) -> Result<Box<dyn ChannelBackend>, DeliveryError> {
        self.constructors
            .get(channel_type)
            .map(|make| make())
            .ok_or_else(|| DeliveryError::UnknownChannelType(channel_type.to_string()))
    }

    pub fn channel_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Register every enabled built-in channel, each with its own gateway handle.
pub fn register_builtin(mut builder: DispatcherBuilder, config: &Config) -> Result<DispatcherBuilder> {
    for &channel_type in BUILTIN_CHANNELS {
        let channel_cfg = config.channel(channel_type);
        if !channel_cfg.enabled {
            tracing::info!("Channel disabled: {channel_type}");
            continue;
        }
        let gateway = Gateway::new(channel_type, &channel_cfg)?;
        builder = match channel_type {
            DirectMessageChannel::TYPE => builder.register_channel(channel_type, move || {
                Box::new(DirectMessageChannel::new(gateway.clone()))
            }),
            ShortMessageChannel::TYPE => builder.register_channel(channel_type, move || {
                Box::new(ShortMessageChannel::new(gateway.clone()))
            }),
            PushAlertChannel::TYPE => builder.register_channel(channel_type, move || {
                Box::new(PushAlertChannel::new(gateway.clone()))
            }),
            other => anyhow::bail!("No backend for built-in channel {other}"),
        };
    }
    Ok(builder)
}

/// Cut `text` to at most `limit` characters, marking the cut with "...".
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&"..."[..limit.min(3)]);
    out
}
