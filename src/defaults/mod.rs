//! Process-wide baseline payload fields.
//!
//! Every dispatch merges these under the caller's params before rendering,
//! so templates can reference `{{site_url}}`, `{{site_title}}` and
//! `{{logo.*}}` without callers passing them. Updates arrive through a
//! configuration-change channel and are applied one at a time; readers
//! always observe a complete pre- or post-update value.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::BrandingConfig;

/// Branding logo asset and dimensions
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BrandingLogo {
    pub src: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

/// Baseline fields merged into every outgoing message
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DefaultPayload {
    pub site_url: String,
    pub site_title: String,
    pub logo: BrandingLogo,
}

impl DefaultPayload {
    pub fn from_settings(branding: &BrandingConfig) -> Self {
        Self {
            site_url: branding.site_url.clone(),
            site_title: branding.site_title.clone(),
            logo: BrandingLogo {
                src: branding.logo.src.clone(),
                height: branding.logo.height,
                width: branding.logo.width,
            },
        }
    }

    /// Shallow merge under caller-supplied params: existing keys win.
    pub fn merge_under(&self, params: &mut serde_json::Map<String, serde_json::Value>) {
        let baseline = [
            ("site_url", json!(self.site_url)),
            ("site_title", json!(self.site_title)),
            ("logo", json!(self.logo)),
        ];
        for (key, value) in baseline {
            params.entry(key.to_string()).or_insert(value);
        }
    }
}

/// A recognized configuration change
#[derive(Debug, Clone, Copy)]
pub enum ConfigChange {
    LogoHeight(Option<u32>),
    LogoWidth(Option<u32>),
}

/// Holder for the current [`DefaultPayload`].
///
/// The payload is replaced wholesale on every update; snapshots are cheap
/// `Arc` clones and never see a partially-applied change.
pub struct DefaultPayloadState {
    inner: RwLock<Arc<DefaultPayload>>,
}

impl DefaultPayloadState {
    pub fn new(payload: DefaultPayload) -> Self {
        Self {
            inner: RwLock::new(Arc::new(payload)),
        }
    }

    pub fn from_settings(branding: &BrandingConfig) -> Self {
        Self::new(DefaultPayload::from_settings(branding))
    }

    /// Current payload
    pub fn snapshot(&self) -> Arc<DefaultPayload> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Apply one configuration change, replacing the payload atomically
    pub fn apply(&self, change: ConfigChange) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut next = (**guard).clone();

        match change {
            ConfigChange::LogoHeight(height) => next.logo.height = height,
            ConfigChange::LogoWidth(width) => next.logo.width = width,
        }

        tracing::info!(
            height = ?next.logo.height,
            width = ?next.logo.width,
            "default payload refreshed from configuration change"
        );

        *guard = Arc::new(next);
    }

    /// Consume configuration changes from a channel.
    ///
    /// Updates are applied strictly one at a time in arrival order; the
    /// task ends when the sender side is dropped.
    pub fn subscribe(self: &Arc<Self>, mut rx: mpsc::Receiver<ConfigChange>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                state.apply(change);
            }
            tracing::debug!("configuration-change channel closed");
        })
    }
}
