//! Revoked-token tracking.
//!
//! Entries are keyed by `jti` and kept until the token would have expired on
//! its own; after that the signature check rejects it anyway.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub trait TokenBlacklist: Send + Sync {
    /// Revoke `jti` until `expires_at` (unix seconds). Returns `false` when
    /// the `jti` was already revoked, so only one caller can claim a token.
    fn revoke(&self, jti: &str, expires_at: i64) -> bool;
    fn is_revoked(&self, jti: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryBlacklist {
    entries: Mutex<HashMap<String, i64>>,
}

impl MemoryBlacklist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TokenBlacklist for MemoryBlacklist {
    fn revoke(&self, jti: &str, expires_at: i64) -> bool {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, expiry| *expiry >= now);
        if expires_at < now {
            return true;
        }
        entries.insert(jti.to_string(), expires_at).is_none()
    }

    fn is_revoked(&self, jti: &str) -> bool {
        let now = Utc::now().timestamp();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(jti)
            .is_some_and(|expiry| *expiry >= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_until_expiry() {
        let blacklist = MemoryBlacklist::new();
        let later = Utc::now().timestamp() + 60;
        assert!(!blacklist.is_revoked("a"));
        assert!(blacklist.revoke("a", later));
        assert!(blacklist.is_revoked("a"));
        assert!(!blacklist.is_revoked("b"));
    }

    #[test]
    fn expired_entries_are_purged() {
        let blacklist = MemoryBlacklist::new();
        let now = Utc::now().timestamp();
        assert!(blacklist.revoke("already-expired", now - 10));
        assert!(!blacklist.is_revoked("already-expired"));
        assert_eq!(blacklist.len(), 0);

        assert!(blacklist.revoke("live", now + 60));
        assert_eq!(blacklist.len(), 1);
    }

    #[test]
    fn second_revoke_of_same_jti_is_refused() {
        let blacklist = MemoryBlacklist::new();
        let later = Utc::now().timestamp() + 60;
        assert!(blacklist.revoke("jti", later));
        assert!(!blacklist.revoke("jti", later));
        assert!(blacklist.is_revoked("jti"));
    }
}
