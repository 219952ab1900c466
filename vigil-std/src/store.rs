//! In-memory policy store.

use parking_lot::RwLock;
use std::collections::HashMap;
use vigil_core::{Policy, PolicyStore, StoreError};

/// A [`PolicyStore`] backed by a map.
///
/// Policies can be replaced at runtime; a subsequent reload of an entry picks
/// up the new definition.
#[derive(Debug, Default)]
pub struct MemoryStore {
    policies: RwLock<HashMap<String, Policy>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `policies`.
    pub fn with_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        let store = Self::new();
        for policy in policies {
            store.upsert(policy);
        }
        store
    }

    /// Insert or replace a policy, returning the previous definition.
    pub fn upsert(&self, policy: Policy) -> Option<Policy> {
        self.policies.write().insert(policy.name.clone(), policy)
    }

    /// Remove a policy.
    pub fn remove(&self, name: &str) -> Option<Policy> {
        self.policies.write().remove(name)
    }

    /// Names of every stored policy, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl PolicyStore for MemoryStore {
    fn policy(&self, name: &str) -> Result<Policy, StoreError> {
        self.policies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }
}
