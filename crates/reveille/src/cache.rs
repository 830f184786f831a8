// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::Payload;

/// Time-bounded store of decoded responses, keyed by cache key.
///
/// Expired entries are treated as absent and removed by the lookup that finds them.
/// The store is not synchronized; the client guards it together with the in-flight table.
#[derive(Debug, Default)]
pub(crate) struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    value: Payload,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

impl ResponseCache {
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Payload> {
        let entry = self.entries.get(key)?;

        if entry.is_live(now) {
            return Some(entry.value.clone());
        }

        self.entries.remove(key);
        None
    }

    /// Stores `value`, replacing any previous entry. A zero `ttl` stores nothing.
    pub fn insert(&mut self, key: String, value: Payload, ttl: Duration, now: Instant) {
        if ttl.is_zero() {
            return;
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
    }

    /// Removes every entry whose key contains `pattern`, or all entries for `None`.
    pub fn invalidate(&mut self, pattern: Option<&str>) -> usize {
        let before = self.entries.len();

        match pattern {
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
            None => self.entries.clear(),
        }

        before - self.entries.len()
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
