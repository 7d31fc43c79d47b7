use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{config::CacheConfig, domain::Verdict, infrastructure::clock::Clock};

#[derive(Debug, Clone, PartialEq)]
pub struct VerdictEntry {
    pub key: String,
    pub verdict: Verdict,
    pub stored_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, VerdictEntry>,
    next_seq: u64,
}

/// URL verdict store bounded by age and by entry count.
///
/// Expired entries are ignored on read and removed lazily on the next write or
/// by the scheduled sweep. When the entry count goes over the limit the oldest
/// entries are dropped in one batch until half the limit remains.
pub struct VerdictCache {
    slots: Mutex<Slots>,
    ttl: chrono::Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl VerdictCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(config.ttl, config.max_entries, clock)
    }

    pub fn with_limits(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    pub fn get(&self, url: &str) -> Option<VerdictEntry> {
        let key = normalize_key(url);
        let now = self.clock.now();
        let slots = self.slots.lock();
        slots
            .entries
            .get(&key)
            .filter(|entry| !self.is_expired(entry, now))
            .cloned()
    }

    pub fn put(&self, url: &str, verdict: Verdict) {
        let key = normalize_key(url);
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        let seq = slots.next_seq;
        slots.next_seq += 1;
        slots.entries.insert(
            key.clone(),
            VerdictEntry {
                key,
                verdict,
                stored_at: now,
                seq,
            },
        );

        let expired = self.remove_expired(&mut slots, now);
        if expired > 0 {
            tracing::debug!(target: "cache", expired, "expired verdicts swept");
        }

        if slots.entries.len() > self.max_entries {
            let evicted = self.evict_oldest_half(&mut slots);
            tracing::debug!(
                target: "cache",
                evicted,
                retained = slots.entries.len(),
                "verdict cache over capacity"
            );
        }
    }

    /// Drops every entry older than the TTL and returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        self.remove_expired(&mut slots, now)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    fn is_expired(&self, entry: &VerdictEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) > self.ttl
    }

    fn remove_expired(&self, slots: &mut Slots, now: DateTime<Utc>) -> usize {
        let before = slots.entries.len();
        slots.entries.retain(|_, entry| !self.is_expired(entry, now));
        before - slots.entries.len()
    }

    fn evict_oldest_half(&self, slots: &mut Slots) -> usize {
        let keep = (self.max_entries / 2).max(1);
        let excess = slots.entries.len().saturating_sub(keep);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(DateTime<Utc>, u64, String)> = slots
            .entries
            .values()
            .map(|entry| (entry.stored_at, entry.seq, entry.key.clone()))
            .collect();
        by_age.sort_unstable();

        for (_, _, key) in by_age.into_iter().take(excess) {
            slots.entries.remove(&key);
        }
        excess
    }
}

/// Cache identity for a URL: surrounding whitespace trimmed, case-folded.
pub fn normalize_key(url: &str) -> String {
    url.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::RiskTier, infrastructure::clock::ManualClock};

    fn verdict(risk: RiskTier) -> Verdict {
        Verdict {
            risk,
            score: 0.5,
            reasons: vec!["test".to_string()],
        }
    }

    fn cache(ttl_ms: u64, max: usize) -> (VerdictCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = VerdictCache::with_limits(Duration::from_millis(ttl_ms), max, clock.clone());
        (cache, clock)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let (cache, _) = cache(300_000, 1000);
        cache.put("http://EXAMPLE.com/a", verdict(RiskTier::Malicious));

        let hit = cache.get("HTTP://example.COM/A").expect("entry");
        assert_eq!(hit.key, "http://example.com/a");
        assert_eq!(hit.verdict.risk, RiskTier::Malicious);
    }

    #[test]
    fn entries_expire_after_ttl_without_purge() {
        let (cache, clock) = cache(300_000, 1000);
        cache.put("https://a.test", verdict(RiskTier::Safe));

        clock.advance(Duration::from_millis(300_000));
        assert!(cache.get("https://a.test").is_some(), "age equal to ttl is still fresh");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("https://a.test").is_none());
        assert_eq!(cache.len(), 1, "stale read does not purge");

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn put_sweeps_expired_entries() {
        let (cache, clock) = cache(1_000, 1000);
        cache.put("https://old.test", verdict(RiskTier::Safe));
        clock.advance(Duration::from_secs(2));
        cache.put("https://new.test", verdict(RiskTier::Safe));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("https://new.test").is_some());
    }

    #[test]
    fn overflow_halves_cache_and_keeps_newest() {
        let (cache, clock) = cache(300_000, 10);
        for i in 0..10 {
            cache.put(&format!("https://site{i}.test"), verdict(RiskTier::Safe));
            clock.advance(Duration::from_millis(10));
        }
        assert_eq!(cache.len(), 10);

        cache.put("https://site10.test", verdict(RiskTier::Safe));
        assert_eq!(cache.len(), 5);
        for i in 6..=10 {
            assert!(cache.get(&format!("https://site{i}.test")).is_some(), "site{i} kept");
        }
        for i in 0..6 {
            assert!(cache.get(&format!("https://site{i}.test")).is_none(), "site{i} evicted");
        }
    }

    #[test]
    fn size_never_exceeds_limit_with_identical_timestamps() {
        let (cache, _) = cache(300_000, 7);
        for i in 0..50 {
            cache.put(&format!("https://same-instant{i}.test"), verdict(RiskTier::Safe));
            assert!(cache.len() <= 7);
        }
        assert!(cache.get("https://same-instant49.test").is_some());
    }

    #[test]
    fn overwrite_refreshes_timestamp() {
        let (cache, clock) = cache(1_000, 10);
        cache.put("https://a.test", verdict(RiskTier::Safe));
        clock.advance(Duration::from_millis(800));
        cache.put("https://a.test", verdict(RiskTier::Suspicious));
        clock.advance(Duration::from_millis(800));

        let entry = cache.get("https://a.test").expect("refreshed");
        assert_eq!(entry.verdict.risk, RiskTier::Suspicious);
        assert_eq!(cache.len(), 1);
    }
}
