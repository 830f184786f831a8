// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "test-util")]
#![allow(missing_docs, reason = "This is a test module")]

//! Integration tests for the availability monitor using only public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use reveille::MonitorOptions;
use reveille::monitor::{AvailabilityMonitor, AvailabilityState, HttpProbe};
use reveille::testing::{FakeProbe, FakeReply, FakeTransport};
use serde_json::json;

static_assertions::assert_impl_all!(AvailabilityMonitor: Send, Sync, Clone);
static_assertions::assert_impl_all!(AvailabilityState: Send, Sync, Copy);

fn names(log: &Mutex<Vec<&'static str>>) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn failures_below_budget_stay_cold_starting() {
    let probe = FakeProbe::down();
    let monitor = AvailabilityMonitor::new(probe.clone(), MonitorOptions::default().cold_start_max_attempts(4));
    let mut states = monitor.subscribe();

    let sequence = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.probe().await }
    });

    // after three failed checks the budget of four is not spent yet
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(*states.borrow_and_update(), AvailabilityState::ColdStarting { attempt: 3, max_attempts: 4 });
    assert!(monitor.current_state().is_warming_up());

    assert_eq!(sequence.await.unwrap(), AvailabilityState::Unavailable { failed_attempts: 4 });
}

#[tokio::test(start_paused = true)]
async fn http_probe_drives_monitor() {
    let transport = FakeTransport::new()
        .then(FakeReply::status(StatusCode::BAD_GATEWAY))
        .then(FakeReply::fail("connection refused"))
        .always(FakeReply::json(json!({ "status": "ok" })));
    let monitor = AvailabilityMonitor::new(HttpProbe::new(transport.clone(), "/health"), MonitorOptions::default());

    let state = monitor.probe().await;

    assert!(state.is_available());
    assert_eq!(transport.calls(), 3);
    assert!(transport.requests().iter().all(|request| request.target() == "/health"));
}

#[tokio::test(start_paused = true)]
async fn observers_see_every_transition() {
    let monitor = AvailabilityMonitor::new(FakeProbe::up().then_down(), MonitorOptions::default());
    let log = Arc::new(Mutex::new(Vec::new()));

    monitor
        .on_transition({
            let log = Arc::clone(&log);
            move |_, next| log.lock().unwrap().push(next.name())
        })
        .detach();

    monitor.probe().await;

    assert_eq!(names(&log), ["probing", "cold_starting", "available"]);
}

#[tokio::test(start_paused = true)]
async fn watchdog_polls_while_available() {
    let probe = FakeProbe::up();
    let options = MonitorOptions::default().healthy_poll_interval(Duration::from_secs(30));
    let monitor = AvailabilityMonitor::new(probe.clone(), options);

    let watchdog = monitor.spawn_watchdog();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(monitor.current_state().is_available());
    assert_eq!(probe.calls(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(probe.calls(), 3);
    assert!(watchdog.is_running());

    watchdog.shutdown();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(probe.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn watchdog_tolerates_blip() {
    let probe = FakeProbe::up();
    let monitor = AvailabilityMonitor::new(probe.clone(), MonitorOptions::default());
    let unavailable = Arc::new(Mutex::new(false));

    let _subscription = monitor.on_transition({
        let unavailable = Arc::clone(&unavailable);
        move |_, next| {
            if next.is_unavailable() {
                *unavailable.lock().unwrap() = true;
            }
        }
    });
    let _watchdog = monitor.spawn_watchdog();
    tokio::time::sleep(Duration::from_millis(1)).await;

    // the re-check at 30s fails once, the follow-up at 35s succeeds
    let probe = probe.then_down();
    tokio::time::sleep(Duration::from_secs(40)).await;

    assert_eq!(probe.calls(), 3);
    assert!(monitor.current_state().is_available());
    assert!(!*unavailable.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn watchdog_parks_while_unavailable() {
    let probe = FakeProbe::down();
    let monitor = AvailabilityMonitor::new(probe.clone(), MonitorOptions::default());
    let _watchdog = monitor.spawn_watchdog();

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(monitor.current_state(), AvailabilityState::Unavailable { failed_attempts: 3 });

    // no autonomous polling while unavailable
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(probe.calls(), 3);

    // a manual probe revives the monitor and the watchdog resumes polling
    probe.set_up(true);
    assert!(monitor.probe().await.is_available());
    assert_eq!(probe.calls(), 4);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(probe.calls(), 5);
}
