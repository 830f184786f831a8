// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "config", feature = "reqwest", feature = "test-util")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "feature-gated items are only linked when every feature is enabled"
    )
)]

//! A resilient request client for backends that go to sleep.
//!
//! This crate wraps the requests an application sends to its backend with the handling that
//! every client of a remote service ends up needing, and adds tracking of whether that
//! backend is awake at all.
//!
//! # Core Types
//!
//! - [`Client`]: caches reads for a configurable time, coalesces concurrent identical reads
//!   into one network call, bounds every attempt with a timeout, and retries transient
//!   failures with growing delays.
//! - [`AvailabilityMonitor`][monitor::AvailabilityMonitor]: tells a backend that is waking up
//!   from one that is down, and notifies dependents when that changes.
//! - [`Transport`]: the network boundary. Implement it over any HTTP stack, or enable the
//!   `reqwest` feature for a ready-made one.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use reveille::monitor::{AvailabilityMonitor, HttpProbe};
//! use reveille::{Client, ClientOptions, MonitorOptions};
//! # use reveille::{Request, Response, Transport, TransportError};
//! # use http::StatusCode;
//! # #[derive(Clone)]
//! # struct Backend;
//! # impl Transport for Backend {
//! #     async fn send(&self, _request: Request) -> Result<Response, TransportError> {
//! #         Ok(Response::new(StatusCode::OK, "[]"))
//! #     }
//! # }
//!
//! # async fn example(backend: Backend) -> reveille::Result<()> {
//! let monitor = AvailabilityMonitor::new(HttpProbe::new(backend.clone(), "/health"), MonitorOptions::long_wake());
//! let _watchdog = monitor.spawn_watchdog();
//!
//! let client = Client::builder(backend)
//!     .options(ClientOptions::default().cache_ttl(Duration::from_secs(600)))
//!     .monitor(monitor)
//!     .build();
//!
//! let _invoices = client.get("/invoices", Some("invoices:all")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Failures are reported as [`Error`]. Timeouts and transport failures are transient and
//! retried by the client; responses with a definite error status are not. When a monitor is
//! attached, a request that still fails with a transient error, or that the server rejects as
//! unavailable, triggers a probe of the backend and one more attempt sequence once it answers.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber:
//!
//! | Event | Level | When |
//! |-------|-------|------|
//! | `reveille.retry` | `WARN` | an attempt failed and is retried |
//! | `reveille.retry.exhausted` | `WARN` | the last attempt failed |
//! | `reveille.cache.hit`, `reveille.cache.miss`, `reveille.cache.coalesced` | `DEBUG` | a cacheable read is served |
//! | `reveille.cache.invalidate` | `DEBUG` | cached payloads are invalidated |
//! | `reveille.transition` | `INFO` | the monitor changes state |
//! | `reveille.unavailable` | `WARN` | a cold-start sequence failed |
//!
//! # Features
//!
//! - `config`: [`ReveilleConfig`], deserializable settings for both components.
//! - `reqwest`: [`ReqwestTransport`].
//! - `test-util`: the [`testing`] module with a scripted transport and probe.

mod cache;
mod client;
#[cfg(feature = "config")]
mod config;
mod error;
mod flight;
mod key;
pub mod monitor;
mod options;
mod payload;
#[cfg(feature = "reqwest")]
mod reqwest_transport;
mod retry;
mod stats;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;
mod transport;

pub use client::{Client, ClientBuilder, RequestOptions};
#[cfg(feature = "config")]
#[cfg_attr(docsrs, doc(cfg(feature = "config")))]
pub use config::ReveilleConfig;
pub use error::{Error, RecoveryKind, Result, TransportError};
pub use key::CacheKey;
pub use options::{
    Backoff, ClientOptions, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_CACHE_TTL, DEFAULT_COLD_START_INTERVAL, DEFAULT_COLD_START_MAX_ATTEMPTS,
    DEFAULT_HEALTHY_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS, DEFAULT_PROBE_TIMEOUT, DEFAULT_RETRY_BASE_DELAY, MonitorOptions,
};
pub use payload::Payload;
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub use reqwest_transport::ReqwestTransport;
pub use stats::ClientStats;
pub use transport::{Request, Response, Transport};
