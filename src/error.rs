use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Unknown channel type: {0}")]
    UnknownChannelType(String),

    #[error("Transmission failed on {channel}: {reason}")]
    TransmissionFailure {
        channel: String,
        reason: String,
        /// Set by a backend when retrying cannot help (e.g. the gateway rejected the input).
        permanent: bool,
    },
}

impl DeliveryError {
    pub fn transmission(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransmissionFailure {
            channel: channel.into(),
            reason: reason.into(),
            permanent: false,
        }
    }

    pub fn rejected(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransmissionFailure {
            channel: channel.into(),
            reason: reason.into(),
            permanent: true,
        }
    }

    pub fn is_permanent(&self) -> bool {
        match self {
            Self::UnknownChannelType(_) => true,
            Self::TransmissionFailure { permanent, .. } => *permanent,
        }
    }

    /// Short machine-readable tag, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownChannelType(_) => "unknown_channel_type",
            Self::TransmissionFailure { .. } => "transmission_failure",
        }
    }
}
