use thiserror::Error;

use crate::template::TemplateError;
use crate::transport::TransportError;

/// Terminal state of a dispatch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message was accepted by a transport or a delivery override.
    Delivered,
    /// The dispatch ended early without a delivery attempt.
    Skipped(SkipReason),
}

/// Why a dispatch was skipped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The recipient has no stored contact address.
    NoAddress,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] TemplateError),

    /// The delivery agent could not be located or invoked. Surfaced as its
    /// own kind so callers never see the transport's raw error shape.
    #[error("mail agent not available")]
    TransportUnavailable,

    #[error("delivery failed: {0}")]
    Transport(TransportError),

    #[error("delivery interceptor failed: {0}")]
    Interception(anyhow::Error),
}

impl DispatchError {
    /// Normalize a transport failure for callers. An agent-missing error,
    /// whatever its native shape, becomes [`DispatchError::TransportUnavailable`];
    /// everything else keeps its original detail.
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::AgentMissing(_) => DispatchError::TransportUnavailable,
            TransportError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                DispatchError::TransportUnavailable
            }
            other => DispatchError::Transport(other),
        }
    }
}

pub type DispatchResult = std::result::Result<Outcome, DispatchError>;
