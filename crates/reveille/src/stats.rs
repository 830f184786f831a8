// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of the counters of a [`Client`][crate::Client].
///
/// Counters start at zero when the client is built and only grow. The entry counts reflect
/// the moment of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientStats {
    /// Cacheable requests answered from the cache.
    pub cache_hits: u64,
    /// Cacheable requests that started a network call.
    pub cache_misses: u64,
    /// Cacheable requests that attached to a call already in flight.
    pub coalesced: u64,
    /// Network attempts issued, including retries.
    pub attempts: u64,
    /// Attempts that were retried after a transient failure.
    pub retries: u64,
    /// Payloads currently held by the cache, including expired ones not yet dropped.
    pub cached_entries: usize,
    /// Cacheable requests currently in flight.
    pub in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    coalesced: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
}

impl Counters {
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            cached_entries: 0,
            in_flight: 0,
        }
    }
}
