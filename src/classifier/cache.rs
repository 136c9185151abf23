use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Where a cached label came from. User feedback entries are written by
/// explicit corrections; AI entries by successful remote classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    UserFeedback,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub productive: bool,
    pub timestamp: DateTime<Utc>,
    pub source: CacheSource,
}

/// Time-boxed label cache keyed by normalized app identifier.
///
/// Expired entries are treated as misses on read and garbage-collected in
/// bulk every `sweep_every` classification calls rather than on a timer.
pub struct ClassificationCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    sweep_every: u32,
    sweep_counter: u32,
}

impl ClassificationCache {
    pub fn new(ttl: Duration, sweep_every: u32) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            sweep_every,
            sweep_counter: 0,
        }
    }

    /// Cached label for `clean_app`, if present and not expired.
    pub fn get(&self, clean_app: &str) -> Option<bool> {
        let entry = self.entries.get(clean_app)?;
        if Utc::now() - entry.timestamp < self.ttl {
            Some(entry.productive)
        } else {
            None
        }
    }

    pub fn insert(&mut self, clean_app: &str, productive: bool, source: CacheSource) {
        self.insert_at(clean_app, productive, source, Utc::now());
    }

    pub fn insert_at(
        &mut self,
        clean_app: &str,
        productive: bool,
        source: CacheSource,
        timestamp: DateTime<Utc>,
    ) {
        self.entries.insert(
            clean_app.to_string(),
            CacheEntry {
                productive,
                timestamp,
                source,
            },
        );
    }

    /// Counter-based sweep: every `sweep_every`-th call drops all expired
    /// entries and resets the counter.
    pub fn maybe_sweep(&mut self) {
        self.sweep_counter += 1;
        if self.sweep_counter < self.sweep_every {
            return;
        }

        let now = Utc::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now - entry.timestamp <= self.ttl);
        let swept = before - self.entries.len();
        if swept > 0 {
            debug!("swept {swept} expired classification cache entries");
        }
        self.sweep_counter = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ClassificationCache {
        ClassificationCache::new(Duration::hours(24), 100)
    }

    #[test]
    fn fresh_entries_hit() {
        let mut cache = cache();
        cache.insert("slack", true, CacheSource::Ai);
        assert_eq!(cache.get("slack"), Some(true));
    }

    #[test]
    fn expired_entries_miss() {
        let mut cache = cache();
        cache.insert_at(
            "slack",
            true,
            CacheSource::Ai,
            Utc::now() - Duration::hours(25),
        );
        assert_eq!(cache.get("slack"), None);
        // Still present until a sweep runs
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_fires_on_the_hundredth_call() {
        let mut cache = cache();
        cache.insert_at(
            "old",
            false,
            CacheSource::Ai,
            Utc::now() - Duration::hours(48),
        );
        cache.insert("fresh", true, CacheSource::UserFeedback);

        for _ in 0..99 {
            cache.maybe_sweep();
        }
        assert_eq!(cache.len(), 2);

        cache.maybe_sweep();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(true));
    }

    #[test]
    fn overwrite_refreshes_entry() {
        let mut cache = cache();
        cache.insert_at(
            "app",
            true,
            CacheSource::Ai,
            Utc::now() - Duration::hours(25),
        );
        assert_eq!(cache.get("app"), None);
        cache.insert("app", false, CacheSource::UserFeedback);
        assert_eq!(cache.get("app"), Some(false));
    }
}
