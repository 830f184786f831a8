// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::AvailabilityState;

type TransitionFn = dyn Fn(&AvailabilityState, &AvailabilityState) + Send + Sync;

/// A registered transition handler, called with the previous and the new state.
#[derive(Clone)]
pub(crate) struct OnTransition(Arc<TransitionFn>);

impl OnTransition {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&AvailabilityState, &AvailabilityState) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn call(&self, previous: &AvailabilityState, next: &AvailabilityState) {
        (self.0)(previous, next);
    }
}

impl std::fmt::Debug for OnTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnTransition").finish()
    }
}

/// The transition handlers of one monitor.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    handlers: Mutex<Vec<(u64, OnTransition)>>,
    next_id: AtomicU64,
}

impl Observers {
    pub fn register(&self, handler: OnTransition) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, handler));
        id
    }

    pub fn unregister(&self, id: u64) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(registered, _)| *registered != id);
        handlers.len() != before
    }

    /// Calls every handler in registration order.
    ///
    /// Handlers run outside the lock, so a handler may register or drop subscriptions.
    pub fn notify(&self, previous: &AvailabilityState, next: &AvailabilityState) {
        let handlers: Vec<OnTransition> = self.handlers.lock().iter().map(|(_, handler)| handler.clone()).collect();

        for handler in handlers {
            handler.call(previous, next);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }
}

/// Keeps a transition handler registered.
///
/// Dropping the subscription unregisters the handler. Use
/// [`detach`][TransitionSubscription::detach] to keep the handler for as long as the
/// monitor lives.
#[derive(Debug)]
#[must_use = "dropping the subscription unregisters the handler"]
pub struct TransitionSubscription {
    observers: Weak<Observers>,
    id: u64,
}

impl TransitionSubscription {
    pub(crate) fn new(observers: &Arc<Observers>, id: u64) -> Self {
        Self {
            observers: Arc::downgrade(observers),
            id,
        }
    }

    /// Keeps the handler registered for the lifetime of the monitor.
    pub fn detach(mut self) {
        self.observers = Weak::new();
    }
}

impl Drop for TransitionSubscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.unregister(self.id);
        }
    }
}
