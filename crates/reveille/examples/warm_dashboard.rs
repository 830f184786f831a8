// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A dashboard that loads its widgets from a backend that is asleep when the page opens:
//!
//! 1. The first requests fail while the backend boots
//! 2. The client retries, then hands over to the availability monitor
//! 3. The monitor reports "warming up" until the backend answers
//! 4. The widgets sharing one query cause a single network call

use std::time::Duration;

use futures_util::future::join_all;
use reveille::monitor::AvailabilityMonitor;
use reveille::testing::{FakeProbe, FakeReply, FakeTransport};
use reveille::{CacheKey, Client, ClientOptions, MonitorOptions};
use serde_json::json;
use tracing::Level;

#[tokio::main]
async fn main() -> reveille::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    // Simulated backend that refuses connections until it has booted
    let transport = FakeTransport::new()
        .then(FakeReply::fail("connection refused"))
        .then(FakeReply::fail("connection refused"))
        .always(FakeReply::json(json!([{ "number": "INV-1", "total": 120 }])).after(Duration::from_millis(50)));
    let probe = FakeProbe::up().then_down().then_down();

    // Decrease the intervals to speed-up the example
    let monitor = AvailabilityMonitor::new(
        probe,
        MonitorOptions::long_wake().cold_start_interval(Duration::from_millis(200)),
    );
    monitor
        .on_transition(|_, next| {
            if next.is_warming_up() {
                println!("backend is warming up ({})", next.name());
            } else if next.is_unavailable() {
                println!("backend is down");
            }
        })
        .detach();

    let client = Client::builder(transport.clone())
        .options(
            ClientOptions::default()
                .max_attempts(2)
                .retry_base_delay(Duration::from_millis(100))
                .attempt_timeout(Duration::from_secs(1)),
        )
        .monitor(monitor.clone())
        .build();

    // Three widgets show the same query; they share one call
    let key = CacheKey::get("/invoices").param("status", "open").to_string();
    let widgets = (0..3).map(|_| client.get("/invoices?status=open", Some(key.as_str())));

    for (widget, result) in join_all(widgets).await.into_iter().enumerate() {
        println!("widget {widget}: {}", result?.value());
    }

    println!("monitor: {}", monitor.current_state().name());
    println!("network calls: {}", transport.calls());
    println!("{:?}", client.stats());

    Ok(())
}
