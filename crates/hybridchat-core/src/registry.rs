//! Presence registry mapping usernames to public keys.
//!
//! A user is present while it keeps polling. Every join or poll refreshes the
//! user's last-seen instant; a user silent for longer than the TTL is evicted
//! and disappears from key listings, so senders stop encrypting for it.
//!
//! Records are kept in a `BTreeMap` so listings come out sorted, which keeps
//! responses deterministic under simulation.

use std::{collections::BTreeMap, time::Duration};

/// Default presence TTL.
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(30);

/// Registry entry for one active user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord<I> {
    /// base64 SPKI DER public key, stored as received
    pub public_key: String,

    /// Last join or poll. Never moves backwards.
    pub last_seen: I,
}

/// Active users and their public keys.
///
/// Generic over the environment's instant type so the same registry runs on
/// the system clock and on simulated time.
#[derive(Debug, Clone)]
pub struct PresenceRegistry<I> {
    records: BTreeMap<String, PublicKeyRecord<I>>,
}

impl<I> Default for PresenceRegistry<I> {
    fn default() -> Self {
        Self { records: BTreeMap::new() }
    }
}

impl<I> PresenceRegistry<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user's record and refresh its last-seen instant.
    ///
    /// Re-joining with the same key is a no-op apart from the refresh.
    /// Re-joining with a new key replaces the old one.
    pub fn join(&mut self, username: &str, public_key: &str, now: I) {
        match self.records.get_mut(username) {
            Some(record) => {
                public_key.clone_into(&mut record.public_key);
                record.last_seen = record.last_seen.max(now);
            },
            None => {
                self.records.insert(
                    username.to_string(),
                    PublicKeyRecord { public_key: public_key.to_string(), last_seen: now },
                );
            },
        }
    }

    /// Refresh a user's last-seen instant. Unknown users are ignored.
    ///
    /// Returns whether the user was present.
    pub fn touch(&mut self, username: &str, now: I) -> bool {
        match self.records.get_mut(username) {
            Some(record) => {
                record.last_seen = record.last_seen.max(now);
                true
            },
            None => false,
        }
    }

    /// Remove every user whose last-seen instant is more than `ttl` old.
    ///
    /// Returns the evicted usernames in sorted order.
    pub fn evict_expired(&mut self, now: I, ttl: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        self.records.retain(|username, record| {
            let expired = now > record.last_seen && now - record.last_seen > ttl;
            if expired {
                evicted.push(username.clone());
            }
            !expired
        });
        evicted
    }

    /// All present usernames, sorted.
    pub fn active_usernames(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Public key of a present user.
    pub fn public_key_of(&self, username: &str) -> Option<&str> {
        self.records.get(username).map(|record| record.public_key.as_str())
    }

    /// Public keys of every present user except `username`.
    pub fn all_public_keys_except(&self, username: &str) -> BTreeMap<String, String> {
        self.records
            .iter()
            .filter(|(name, _)| name.as_str() != username)
            .map(|(name, record)| (name.clone(), record.public_key.clone()))
            .collect()
    }

    /// Number of present users.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nobody is present.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[test]
    fn join_lists_user_and_key() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();

        registry.join("alice", "KEY_A", t0);

        assert_eq!(registry.active_usernames(), ["alice"]);
        assert_eq!(registry.public_key_of("alice"), Some("KEY_A"));
    }

    #[test]
    fn join_is_idempotent() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();

        registry.join("alice", "KEY_A", t0);
        registry.join("alice", "KEY_A", t0);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.public_key_of("alice"), Some("KEY_A"));
    }

    #[test]
    fn rejoin_replaces_key() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();

        registry.join("alice", "OLD", t0);
        registry.join("alice", "NEW", t0 + Duration::from_secs(1));

        assert_eq!(registry.public_key_of("alice"), Some("NEW"));
    }

    #[test]
    fn touch_unknown_user_is_noop() {
        let mut registry = PresenceRegistry::new();
        assert!(!registry.touch("ghost", Instant::now()));
        assert!(registry.is_empty());
    }

    #[test]
    fn touch_never_moves_last_seen_backwards() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);
        let mut registry = PresenceRegistry::new();

        registry.join("alice", "KEY_A", later);
        assert!(registry.touch("alice", t0));

        // Still present one TTL after the later instant
        assert!(registry.evict_expired(later + TTL, TTL).is_empty());
    }

    #[test]
    fn eviction_uses_strict_ttl() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();
        registry.join("alice", "KEY_A", t0);

        assert!(registry.evict_expired(t0 + TTL, TTL).is_empty());
        assert_eq!(registry.evict_expired(t0 + TTL + Duration::from_millis(1), TTL), ["alice"]);
        assert!(registry.public_key_of("alice").is_none());
    }

    #[test]
    fn touch_keeps_user_alive() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();
        registry.join("alice", "KEY_A", t0);
        registry.join("bob", "KEY_B", t0);

        registry.touch("alice", t0 + Duration::from_secs(20));
        let evicted = registry.evict_expired(t0 + Duration::from_secs(31), TTL);

        assert_eq!(evicted, ["bob"]);
        assert_eq!(registry.active_usernames(), ["alice"]);
    }

    #[test]
    fn keys_except_excludes_requester() {
        let t0 = Instant::now();
        let mut registry = PresenceRegistry::new();
        registry.join("alice", "KEY_A", t0);
        registry.join("bob", "KEY_B", t0);
        registry.join("carol", "KEY_C", t0);

        let keys = registry.all_public_keys_except("bob");

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("alice").map(String::as_str), Some("KEY_A"));
        assert_eq!(keys.get("carol").map(String::as_str), Some("KEY_C"));
    }
}
