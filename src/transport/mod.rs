//! Delivery transports.
//!
//! A transport accepts a fully assembled [`Envelope`] and attempts delivery.
//! Two backends ship with the crate: the local sendmail agent and a minimal
//! authenticated SMTP relay. The [`TransportRegistry`] holds them by name
//! and designates one fallback at startup.

mod message;
pub mod registry;
mod sendmail;
mod smtp;

pub use message::format_message;
pub use registry::{create_transport_registry, TransportRegistry};
pub use sendmail::SendmailTransport;
pub use smtp::SmtpRelayTransport;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::Envelope;

/// Transport-specific error type
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local delivery agent binary could not be located or started
    #[error("delivery agent not found: {0}")]
    AgentMissing(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A delivery backend capable of accepting an envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Registry name of this transport
    fn name(&self) -> &'static str;

    /// Attempt delivery. One attempt, no retries.
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}
