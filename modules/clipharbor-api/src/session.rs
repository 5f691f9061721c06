//! Per-viewer short-term memory of served catalog ids.
//!
//! Process-local and best-effort: the only contract is that a returning
//! viewer is unlikely to see the same items again for roughly the TTL.
//! Not durable, not shared across instances.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Served ids remembered per fingerprint; oldest evicted beyond this.
const DEFAULT_MAX_IDS: usize = 300;
const DEFAULT_TTL_HOURS: i64 = 24;
/// Pressure bound on the whole map before expired entries are swept.
const MAX_SESSIONS: usize = 10_000;

/// Derive a viewer fingerprint from client signals. Order-independent and
/// one-way; used only for repeat-avoidance, never authentication.
pub fn fingerprint(signals: &[&str]) -> String {
    let mut sorted: Vec<&str> = signals.iter().filter(|s| !s.is_empty()).copied().collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for signal in &sorted {
        hasher.update(signal.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(&hasher.finalize()[..16])
}

struct SessionEntry {
    /// Insertion-ordered, deduplicated.
    ids: Vec<Uuid>,
    last_seen: DateTime<Utc>,
}

pub struct SessionMemory {
    inner: Mutex<HashMap<String, SessionEntry>>,
    max_ids: usize,
    ttl: TimeDelta,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_IDS, DEFAULT_TTL_HOURS)
    }

    pub fn with_limits(max_ids: usize, ttl_hours: i64) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_ids,
            ttl: TimeDelta::hours(ttl_hours),
        }
    }

    /// Record ids served to a viewer. Re-serving a known id keeps its
    /// original position; writes refresh the entry's TTL.
    pub fn remember(&self, fingerprint: &str, ids: &[Uuid]) {
        self.remember_at(fingerprint, ids, Utc::now());
    }

    /// Ids recently served to a viewer, oldest first. Expired entries are
    /// dropped here rather than by a background task.
    pub fn recent(&self, fingerprint: &str) -> Vec<Uuid> {
        self.recent_at(fingerprint, Utc::now())
    }

    fn remember_at(&self, fingerprint: &str, ids: &[Uuid], now: DateTime<Utc>) {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        if map.len() > MAX_SESSIONS {
            let ttl = self.ttl;
            map.retain(|_, e| now - e.last_seen <= ttl);
            tracing::debug!(remaining = map.len(), "Session memory pressure sweep");
        }

        let entry = map.entry(fingerprint.to_string()).or_insert(SessionEntry {
            ids: Vec::new(),
            last_seen: now,
        });

        if now - entry.last_seen > self.ttl {
            entry.ids.clear();
        }

        for id in ids {
            if !entry.ids.contains(id) {
                entry.ids.push(*id);
            }
        }
        let overflow = entry.ids.len().saturating_sub(self.max_ids);
        if overflow > 0 {
            entry.ids.drain(..overflow);
        }
        entry.last_seen = now;
    }

    fn recent_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        let expired = match map.get(fingerprint) {
            None => return Vec::new(),
            Some(entry) if now - entry.last_seen > self.ttl => true,
            Some(entry) => return entry.ids.clone(),
        };
        if expired {
            map.remove(fingerprint);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ns: &[u128]) -> Vec<Uuid> {
        ns.iter().map(|n| Uuid::from_u128(*n)).collect()
    }

    #[test]
    fn remember_dedups_preserving_insertion_order() {
        let mem = SessionMemory::new();
        mem.remember("fp", &ids(&[1, 2, 3]));
        mem.remember("fp", &ids(&[3, 4]));
        assert_eq!(mem.recent("fp"), ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mem = SessionMemory::new();
        let t0 = Utc::now();
        mem.remember_at("fp", &ids(&[1, 2]), t0);

        let before = t0 + TimeDelta::hours(23);
        assert_eq!(mem.recent_at("fp", before), ids(&[1, 2]));

        let after = t0 + TimeDelta::hours(25);
        assert!(mem.recent_at("fp", after).is_empty());
        // Entry was dropped, not just hidden.
        assert!(mem.recent_at("fp", before).is_empty());
    }

    #[test]
    fn write_after_ttl_starts_a_fresh_list() {
        let mem = SessionMemory::new();
        let t0 = Utc::now();
        mem.remember_at("fp", &ids(&[1, 2]), t0);
        mem.remember_at("fp", &ids(&[3]), t0 + TimeDelta::hours(25));
        assert_eq!(mem.recent_at("fp", t0 + TimeDelta::hours(25)), ids(&[3]));
    }

    #[test]
    fn list_is_capped_dropping_oldest() {
        let mem = SessionMemory::with_limits(3, 24);
        mem.remember("fp", &ids(&[1, 2, 3]));
        mem.remember("fp", &ids(&[4, 5]));
        assert_eq!(mem.recent("fp"), ids(&[3, 4, 5]));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = fingerprint(&["10.0.0.1", "Mozilla/5.0", "en-US"]);
        let b = fingerprint(&["en-US", "10.0.0.1", "Mozilla/5.0"]);
        assert_eq!(a, b);
        assert_ne!(a, fingerprint(&["10.0.0.2", "Mozilla/5.0", "en-US"]));
    }

    #[test]
    fn fingerprint_ignores_empty_signals() {
        assert_eq!(
            fingerprint(&["10.0.0.1", "", "en-US"]),
            fingerprint(&["10.0.0.1", "en-US"])
        );
    }
}
