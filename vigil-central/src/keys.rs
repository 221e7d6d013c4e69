//! In-memory API key store.
//!
//! Keys are opaque UUID tokens bound 1:1 to a pcId at issue time. The store
//! is memory-resident only; a restart invalidates every key, and agents are
//! expected to request a fresh one when they see 401/403.

use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub pc_id: String,
    pub created_at: OffsetDateTime,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, ApiKeyRecord>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new key for `pc_id`. Multiple active keys per machine are
    /// allowed; issuing never revokes earlier keys.
    pub fn issue(&mut self, pc_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.keys.insert(
            token.clone(),
            ApiKeyRecord {
                pc_id: pc_id.to_string(),
                created_at: OffsetDateTime::now_utc(),
                active: true,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<&ApiKeyRecord> {
        self.keys.get(token)
    }

    /// True when `token` is an active key bound to exactly `claimed_pc_id`.
    pub fn validate(&self, token: &str, claimed_pc_id: &str) -> bool {
        self.resolve(token)
            .map(|rec| rec.active && rec.pc_id == claimed_pc_id)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_key_validates_for_its_pc() {
        let mut store = ApiKeyStore::new();
        let key = store.issue("alice@laptop");
        assert!(store.validate(&key, "alice@laptop"));
    }

    #[test]
    fn key_rejected_for_other_pc() {
        let mut store = ApiKeyStore::new();
        let key = store.issue("alice@laptop");
        assert!(!store.validate(&key, "mallory@laptop"));
    }

    #[test]
    fn unknown_key_rejected() {
        let store = ApiKeyStore::new();
        assert!(!store.validate("not-a-key", "alice@laptop"));
    }

    #[test]
    fn multiple_active_keys_per_pc() {
        let mut store = ApiKeyStore::new();
        let first = store.issue("alice@laptop");
        let second = store.issue("alice@laptop");
        assert_ne!(first, second);
        assert!(store.validate(&first, "alice@laptop"));
        assert!(store.validate(&second, "alice@laptop"));
        assert_eq!(store.len(), 2);
    }
}
