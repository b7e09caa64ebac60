//! Transport registry and config-driven construction

use std::sync::Arc;

use dashmap::DashMap;

use super::{SendmailTransport, SmtpRelayTransport, Transport};
use crate::config::TransportConfig;

/// Named delivery backends with a fallback fixed at construction.
///
/// The fallback designation never changes at runtime; a registry built
/// without one reports `None` and sends through it fail at send time.
pub struct TransportRegistry {
    transports: DashMap<String, Arc<dyn Transport>>,
    fallback: Option<String>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    /// Create an empty registry with no fallback
    pub fn new() -> Self {
        Self {
            transports: DashMap::new(),
            fallback: None,
        }
    }

    /// Create an empty registry whose fallback will be the named transport
    pub fn with_fallback(name: impl Into<String>) -> Self {
        Self {
            transports: DashMap::new(),
            fallback: Some(name.into()),
        }
    }

    /// Register a transport under a name
    pub fn register(&self, name: impl Into<String>, transport: Arc<dyn Transport>) {
        self.transports.insert(name.into(), transport);
    }

    /// Look up a transport by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(name).map(|t| t.clone())
    }

    /// The designated fallback transport, if one is configured and registered
    pub fn fallback(&self) -> Option<Arc<dyn Transport>> {
        self.fallback.as_deref().and_then(|name| self.get(name))
    }

    /// Name of the designated fallback
    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Number of registered transports
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

/// Build the transport registry from configuration.
///
/// The sendmail agent is always registered. When the SMTP relay is enabled
/// it is registered as well and becomes the fallback; otherwise sendmail is
/// the fallback.
pub fn create_transport_registry(settings: &TransportConfig) -> TransportRegistry {
    let sendmail = Arc::new(SendmailTransport::new(&settings.sendmail.path));

    if settings.smtp.enabled {
        tracing::info!(
            fallback = "smtp",
            host = %settings.smtp.host,
            port = settings.smtp.port,
            "creating transport registry with relay fallback"
        );
        let registry = TransportRegistry::with_fallback("smtp");
        registry.register("smtp", Arc::new(SmtpRelayTransport::new(settings.smtp.clone())));
        registry.register("sendmail", sendmail);
        registry
    } else {
        tracing::info!(
            fallback = "sendmail",
            path = %settings.sendmail.path,
            "creating transport registry with local agent fallback"
        );
        let registry = TransportRegistry::with_fallback("sendmail");
        registry.register("sendmail", sendmail);
        registry
    }
}
