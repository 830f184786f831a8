// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tokio::task::JoinHandle;

use super::{AvailabilityMonitor, AvailabilityState};

/// Stops the background watchdog of an [`AvailabilityMonitor`] when dropped.
///
/// Created by [`AvailabilityMonitor::spawn_watchdog`].
#[derive(Debug)]
#[must_use = "dropping the handle stops the watchdog"]
pub struct WatchdogHandle {
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    pub(crate) fn spawn(monitor: AvailabilityMonitor) -> Self {
        Self {
            task: tokio::spawn(run(monitor)),
        }
    }

    /// Returns `true` while the watchdog loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the watchdog. A check sequence that is already running still completes.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(monitor: AvailabilityMonitor) {
    let poll_interval = monitor.options().get_healthy_poll_interval();
    let mut states = monitor.subscribe();

    loop {
        let state = *states.borrow_and_update();

        match state {
            AvailabilityState::Unknown => {
                monitor.probe().await;
            }
            AvailabilityState::Probing | AvailabilityState::ColdStarting { .. } => {
                monitor.wait_until_settled().await;
            }
            AvailabilityState::Available { .. } => {
                tokio::time::sleep(poll_interval).await;

                // a manual probe may have settled elsewhere while sleeping
                if monitor.current_state().is_available() {
                    monitor.probe().await;
                }
            }
            AvailabilityState::Unavailable { .. } => {
                // parked until a manual probe revives the monitor
                if states.wait_for(|state| !state.is_unavailable()).await.is_err() {
                    return;
                }
            }
        }
    }
}
