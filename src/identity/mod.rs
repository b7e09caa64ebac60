//! Recipient identity resolution.
//!
//! The pipeline only needs two facts about a recipient: a contact address
//! and a language preference. Both lookups are best-effort by contract; an
//! unknown recipient simply resolves to `None`.

use async_trait::async_trait;
use dashmap::DashMap;

/// Port for resolving recipient identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Contact address for a recipient, if one is stored.
    async fn address(&self, recipient_id: &str) -> Option<String>;

    /// Stored language preference for a recipient, if any.
    async fn language(&self, recipient_id: &str) -> Option<String>;
}

/// A stored recipient profile
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub address: Option<String>,
    pub language: Option<String>,
}

impl Profile {
    /// Profile with an address and no language preference
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            language: None,
        }
    }

    /// Set the language preference
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// In-memory identity store
pub struct MemoryIdentityStore {
    profiles: DashMap<String, Profile>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Insert or replace a recipient profile
    pub fn insert(&self, recipient_id: impl Into<String>, profile: Profile) {
        self.profiles.insert(recipient_id.into(), profile);
    }

    /// Remove a recipient profile
    pub fn remove(&self, recipient_id: &str) {
        self.profiles.remove(recipient_id);
    }

    /// Number of stored profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn address(&self, recipient_id: &str) -> Option<String> {
        self.profiles
            .get(recipient_id)
            .and_then(|p| p.address.clone())
    }

    async fn language(&self, recipient_id: &str) -> Option<String> {
        self.profiles
            .get(recipient_id)
            .and_then(|p| p.language.clone())
    }
}
