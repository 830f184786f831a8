// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tracking whether the backend is reachable, cold-starting or down.
//!
//! Backends hosted on platforms that suspend idle instances take a while to answer the first
//! request after a quiet period. The [`AvailabilityMonitor`] tells this apart from an outage:
//! a failed check starts a bounded cold-start sequence of further checks, and only when every
//! check in the sequence fails is the backend declared
//! [`Unavailable`][AvailabilityState::Unavailable].
//!
//! The monitor runs on demand through [`AvailabilityMonitor::probe`] and, optionally, in the
//! background through [`AvailabilityMonitor::spawn_watchdog`]. Dependents read the state
//! without blocking, subscribe to a watch channel, or register transition handlers.
//!
//! # Examples
//!
//! ```
//! use reveille::MonitorOptions;
//! use reveille::monitor::AvailabilityMonitor;
//!
//! # async fn example() {
//! let monitor = AvailabilityMonitor::new(|| async { Ok::<_, reveille::Error>(()) }, MonitorOptions::quick_wake());
//!
//! let _subscription = monitor.on_transition(|previous, next| {
//!     println!("backend went from {} to {}", previous.name(), next.name());
//! });
//!
//! let state = monitor.probe().await;
//! assert!(state.is_available());
//! # }
//! ```

mod observers;
mod probe;
mod state;
mod watchdog;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Level;

use observers::{Observers, OnTransition};
pub use observers::TransitionSubscription;
use probe::DynProbe;
pub use probe::{HttpProbe, Probe};
pub use state::AvailabilityState;
pub use watchdog::WatchdogHandle;

use crate::MonitorOptions;

/// Tracks the reachability of the backend.
///
/// The monitor is a cheap handle; clones share the same state, handlers and running check
/// sequence.
#[derive(Clone)]
pub struct AvailabilityMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    probe: Box<dyn DynProbe>,
    options: MonitorOptions,
    state: watch::Sender<AvailabilityState>,
    observers: Arc<Observers>,
    sequence: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AvailabilityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityMonitor")
            .field("state", &self.current_state())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl AvailabilityMonitor {
    /// Creates a monitor in the [`Unknown`][AvailabilityState::Unknown] state.
    ///
    /// No check runs until [`probe`][Self::probe] is called or a watchdog is spawned.
    pub fn new(probe: impl Probe, options: MonitorOptions) -> Self {
        let (state, _) = watch::channel(AvailabilityState::Unknown);

        Self {
            inner: Arc::new(MonitorInner {
                probe: Box::new(probe),
                options,
                state,
                observers: Arc::default(),
                sequence: Mutex::new(None),
            }),
        }
    }

    /// Returns the options of the monitor.
    #[must_use]
    pub fn options(&self) -> &MonitorOptions {
        &self.inner.options
    }

    /// Returns the last known state without waiting.
    #[must_use]
    pub fn current_state(&self) -> AvailabilityState {
        *self.inner.state.borrow()
    }

    /// Checks the backend, continuing into a full cold-start sequence if the first check fails,
    /// and returns the settled state.
    ///
    /// Concurrent calls attach to the sequence that is already running instead of starting
    /// another one. The sequence runs on its own task, so dropping the returned future does
    /// not interrupt it.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub async fn probe(&self) -> AvailabilityState {
        MonitorInner::start_sequence(&self.inner);
        self.wait_until_settled().await
    }

    /// Waits until the state is [`Available`][AvailabilityState::Available] or
    /// [`Unavailable`][AvailabilityState::Unavailable] and returns it.
    ///
    /// Resolves immediately if the state is already settled. Never resolves for a monitor
    /// that has not been probed.
    pub async fn wait_until_settled(&self) -> AvailabilityState {
        let mut states = self.subscribe();

        states
            .wait_for(AvailabilityState::is_settled)
            .await
            .map(|state| *state)
            .unwrap_or_else(|_| self.current_state())
    }

    /// Returns a receiver that observes every state the monitor publishes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AvailabilityState> {
        self.inner.state.subscribe()
    }

    /// Registers a handler called with the previous and the new state on every transition.
    ///
    /// Handlers run on the task that drives the transition and must not block.
    pub fn on_transition<F>(&self, handler: F) -> TransitionSubscription
    where
        F: Fn(&AvailabilityState, &AvailabilityState) + Send + Sync + 'static,
    {
        let id = self.inner.observers.register(OnTransition::new(handler));
        TransitionSubscription::new(&self.inner.observers, id)
    }

    /// Starts a background loop that keeps the state current.
    ///
    /// The loop checks right away while the state is unknown, re-checks every
    /// [healthy poll interval][MonitorOptions::healthy_poll_interval] while the backend is
    /// available, and stays idle while it is unavailable until a manual
    /// [`probe`][Self::probe] brings it back.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn_watchdog(&self) -> WatchdogHandle {
        WatchdogHandle::spawn(self.clone())
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }
}

impl MonitorInner {
    fn start_sequence(this: &Arc<Self>) {
        let mut running = this.sequence.lock();

        // the finished check covers a sequence task that was aborted by runtime shutdown
        if running.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        // published under the lock so a waiter never sees the settled state of the last sequence
        let started_from = this.state.send_replace(AvailabilityState::Probing);
        *running = Some(tokio::spawn(Self::run_sequence(Arc::clone(this), started_from)));
    }

    async fn run_sequence(self: Arc<Self>, started_from: AvailabilityState) {
        self.announce(started_from, AvailabilityState::Probing);

        let configured = self.options.get_cold_start_max_attempts();

        // a single failed re-check of a healthy backend must not declare an outage
        let max_attempts = if started_from.is_available() { configured.max(2) } else { configured };

        let mut attempt = 1;

        loop {
            if self.check().await {
                self.finish(AvailabilityState::Available {
                    last_success_at: Instant::now(),
                });
                return;
            }

            if attempt >= max_attempts {
                self.finish(AvailabilityState::Unavailable {
                    failed_attempts: max_attempts,
                });
                return;
            }

            self.transition(AvailabilityState::ColdStarting { attempt, max_attempts });
            tokio::time::sleep(self.options.get_cold_start_interval()).await;
            attempt += 1;
        }
    }

    async fn check(&self) -> bool {
        let timeout = self.options.get_probe_timeout();

        let check = AssertUnwindSafe(async { self.probe.check_boxed().await }).catch_unwind();

        match tokio::time::timeout(timeout, check).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(error))) => {
                tracing::event!(name: "reveille.probe.failed", Level::DEBUG, error = %error);
                false
            }
            Ok(Err(_panic)) => {
                tracing::event!(name: "reveille.probe.failed", Level::WARN, "reachability check panicked");
                false
            }
            Err(_elapsed) => {
                tracing::event!(name: "reveille.probe.failed", Level::DEBUG, timeout = timeout.as_secs_f32());
                false
            }
        }
    }

    /// Publishes the outcome of the sequence and releases it, so the next probe starts anew.
    fn finish(&self, state: AvailabilityState) {
        let previous = {
            let mut running = self.sequence.lock();
            *running = None;
            self.state.send_replace(state)
        };

        self.announce(previous, state);
    }

    fn transition(&self, next: AvailabilityState) {
        let previous = self.state.send_replace(next);
        self.announce(previous, next);
    }

    /// Logs a transition and runs the handlers. Must be called without holding `sequence`.
    fn announce(&self, previous: AvailabilityState, next: AvailabilityState) {
        tracing::event!(
            name: "reveille.transition",
            Level::INFO,
            availability.from = previous.name(),
            availability.to = next.name(),
        );

        if let AvailabilityState::Unavailable { failed_attempts } = next {
            tracing::event!(
                name: "reveille.unavailable",
                Level::WARN,
                failed_attempts,
                "backend did not answer any check of the cold-start sequence",
            );
        }

        self.observers.notify(&previous, &next);
    }
}
