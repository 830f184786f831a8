// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::{BoxFuture, Shared};

use crate::{Payload, Result};

/// The future shared by every caller attached to one in-flight request.
pub(crate) type SharedCall = Shared<BoxFuture<'static, Result<Payload>>>;

/// Table of in-flight cacheable requests, at most one per key.
///
/// The call that registers an entry is responsible for removing it when it settles, using
/// the id it was registered with. Ids keep a late settlement from removing a newer entry
/// registered under the same key.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    calls: HashMap<String, PendingCall>,
    next_id: u64,
}

pub(crate) struct PendingCall {
    id: u64,
    call: SharedCall,
    stale: Arc<AtomicBool>,
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("stale", &self.is_stale())
            .finish_non_exhaustive()
    }
}

impl PendingCall {
    /// Returns `true` if the cache was invalidated for this key after the call started.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}

impl InFlight {
    /// Returns the call in flight for `key`, if any.
    pub fn get(&self, key: &str) -> Option<SharedCall> {
        self.calls.get(key).map(|pending| pending.call.clone())
    }

    /// Reserves an id for a call that is about to be registered under a key.
    pub fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn register(&mut self, key: String, id: u64, call: SharedCall) {
        self.calls.insert(
            key,
            PendingCall {
                id,
                call,
                stale: Arc::default(),
            },
        );
    }

    /// Removes the entry registered under `key` with `id`.
    pub fn complete(&mut self, key: &str, id: u64) -> Option<PendingCall> {
        match self.calls.get(key) {
            Some(pending) if pending.id == id => self.calls.remove(key),
            _ => None,
        }
    }

    /// Marks every call whose key contains `pattern` (or every call for `None`) as stale.
    pub fn mark_stale(&self, pattern: Option<&str>) {
        self.calls
            .iter()
            .filter(|(key, _)| pattern.is_none_or(|pattern| key.contains(pattern)))
            .for_each(|(_, pending)| pending.stale.store(true, Ordering::Release));
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}
