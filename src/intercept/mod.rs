//! Typed interception of outgoing messages.
//!
//! Two independent extension points, both registered at pipeline build time
//! as ordered lists:
//!
//! - [`EnvelopeModifier`] runs after envelope assembly and may rewrite any
//!   part of the envelope before the delivery decision.
//! - [`DeliveryOverride`] replaces transport delivery entirely. When one is
//!   registered the pipeline's own transport logic is skipped and the
//!   override owns the terminal outcome.

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::Envelope;

/// Interceptor that may rewrite the envelope before delivery.
#[async_trait]
pub trait EnvelopeModifier: Send + Sync {
    async fn modify(&self, envelope: Envelope) -> Envelope;
}

/// Interceptor that takes over delivery entirely.
///
/// Errors of any shape are accepted; the pipeline surfaces them as
/// interception failures without attempting fallback delivery.
#[async_trait]
pub trait DeliveryOverride: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()>;
}

/// Ordered interceptor registrations for a pipeline.
#[derive(Default)]
pub struct InterceptionGate {
    modifiers: Vec<Arc<dyn EnvelopeModifier>>,
    overrides: Vec<Arc<dyn DeliveryOverride>>,
}

impl InterceptionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope modifier. Modifiers run in registration order.
    pub fn register_modifier(&mut self, modifier: Arc<dyn EnvelopeModifier>) {
        self.modifiers.push(modifier);
    }

    /// Append a delivery override. Only the first registration is the
    /// delivery authority; later ones are inert.
    pub fn register_override(&mut self, interceptor: Arc<dyn DeliveryOverride>) {
        if !self.overrides.is_empty() {
            tracing::warn!(
                registered = self.overrides.len(),
                "additional delivery override registered; only the first will deliver"
            );
        }
        self.overrides.push(interceptor);
    }

    /// Whether any delivery override is registered
    pub fn has_delivery_override(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// The delivery authority, if any
    pub fn delivery_override(&self) -> Option<&Arc<dyn DeliveryOverride>> {
        self.overrides.first()
    }

    /// Run the envelope through every registered modifier. With none
    /// registered this is a pass-through.
    pub async fn apply_modifiers(&self, mut envelope: Envelope) -> Envelope {
        for modifier in &self.modifiers {
            envelope = modifier.modify(envelope).await;
        }
        envelope
    }
}
