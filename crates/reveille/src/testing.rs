// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scripted fakes of the network boundary.
//!
//! [`FakeTransport`] replays scripted replies and records every request it receives;
//! [`FakeProbe`] replays scripted reachability outcomes. Both are cheap to clone and every
//! clone shares the same script and counters, so a test can keep a handle while the client
//! or monitor owns another.
//!
//! All delays use Tokio time, so tests running with a paused clock complete instantly.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::monitor::Probe;
use crate::{Error, Request, Response, Transport, TransportError};

/// A transport that replays scripted replies.
///
/// Replies added with [`then`][FakeTransport::then] are used once each, in order. When the
/// script runs dry the [`always`][FakeTransport::always] reply is used; without one the
/// transport fails with a [`TransportError`].
///
/// # Examples
///
/// ```
/// use reveille::testing::{FakeReply, FakeTransport};
/// use serde_json::json;
///
/// let transport = FakeTransport::new()
///     .then(FakeReply::fail("connection refused"))
///     .always(FakeReply::json(json!({ "ok": true })));
///
/// assert_eq!(transport.calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    inner: Arc<TransportState>,
}

#[derive(Debug, Default)]
struct TransportState {
    script: Mutex<VecDeque<FakeReply>>,
    fallback: Mutex<Option<FakeReply>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply used for exactly one request.
    #[must_use]
    pub fn then(self, reply: FakeReply) -> Self {
        self.push(reply);
        self
    }

    /// Sets the reply used once the script is exhausted.
    #[must_use]
    pub fn always(self, reply: FakeReply) -> Self {
        self.set_fallback(reply);
        self
    }

    /// Appends a reply to the script of a transport that is already in use.
    pub fn push(&self, reply: FakeReply) {
        self.inner.script.lock().push_back(reply);
    }

    /// Replaces the fallback reply of a transport that is already in use.
    pub fn set_fallback(&self, reply: FakeReply) {
        *self.inner.fallback.lock() = Some(reply);
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Returns a copy of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().clone()
    }

    fn next_reply(&self, request: Request) -> Option<FakeReply> {
        self.inner.requests.lock().push(request);

        self.inner
            .script
            .lock()
            .pop_front()
            .or_else(|| self.inner.fallback.lock().clone())
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, TransportError>> + Send {
        let reply = self.next_reply(request);

        async move {
            match reply {
                Some(reply) => reply.play().await,
                None => Err(TransportError::message("no scripted reply")),
            }
        }
    }
}

/// A scripted reply of a [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct FakeReply {
    kind: ReplyKind,
    delay: Duration,
}

#[derive(Debug, Clone)]
enum ReplyKind {
    Respond(Response),
    Fail(Cow<'static, str>),
    Hang,
}

impl FakeReply {
    /// A `200 OK` response with a JSON body.
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::json_status(StatusCode::OK, &value)
    }

    /// A response with the given status and JSON body.
    #[must_use]
    pub fn json_status(status: StatusCode, value: &Value) -> Self {
        Self::raw(status, value.to_string())
    }

    /// A response with the given status and an empty body.
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self::raw(status, Bytes::new())
    }

    /// A response with the given status and raw body.
    #[must_use]
    pub fn raw(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::from_kind(ReplyKind::Respond(Response::new(status, body)))
    }

    /// A failure without a response, as if the connection was refused.
    #[must_use]
    pub fn fail(message: impl Into<Cow<'static, str>>) -> Self {
        Self::from_kind(ReplyKind::Fail(message.into()))
    }

    /// A reply that never arrives.
    #[must_use]
    pub fn hang() -> Self {
        Self::from_kind(ReplyKind::Hang)
    }

    /// Delays the reply by `delay`.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn from_kind(kind: ReplyKind) -> Self {
        Self {
            kind,
            delay: Duration::ZERO,
        }
    }

    async fn play(self) -> Result<Response, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.kind {
            ReplyKind::Respond(response) => Ok(response),
            ReplyKind::Fail(message) => Err(TransportError::message(message)),
            ReplyKind::Hang => std::future::pending().await,
        }
    }
}

/// A reachability probe that replays scripted outcomes.
///
/// Outcomes added with [`then_up`][FakeProbe::then_up], [`then_down`][FakeProbe::then_down]
/// and [`then_hang`][FakeProbe::then_hang] are used once each, in order. Once the script
/// runs dry, the probe reports the state set by [`set_up`][FakeProbe::set_up] (down by
/// default).
///
/// # Examples
///
/// ```
/// use reveille::testing::FakeProbe;
///
/// // Two failed checks while the backend boots, healthy afterwards.
/// let probe = FakeProbe::up().then_down().then_down();
/// assert_eq!(probe.calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    inner: Arc<ProbeState>,
}

#[derive(Debug, Default)]
struct ProbeState {
    script: Mutex<VecDeque<ProbeOutcome>>,
    up: Mutex<bool>,
    checks: Mutex<Vec<Instant>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeOutcome {
    Up,
    Down,
    Hang,
}

impl FakeProbe {
    /// A probe whose backend is reachable once the script runs dry.
    #[must_use]
    pub fn up() -> Self {
        let probe = Self::default();
        probe.set_up(true);
        probe
    }

    /// A probe whose backend is unreachable once the script runs dry.
    #[must_use]
    pub fn down() -> Self {
        Self::default()
    }

    /// Appends one successful check.
    #[must_use]
    pub fn then_up(self) -> Self {
        self.inner.script.lock().push_back(ProbeOutcome::Up);
        self
    }

    /// Appends one failed check.
    #[must_use]
    pub fn then_down(self) -> Self {
        self.inner.script.lock().push_back(ProbeOutcome::Down);
        self
    }

    /// Appends one check that never completes.
    #[must_use]
    pub fn then_hang(self) -> Self {
        self.inner.script.lock().push_back(ProbeOutcome::Hang);
        self
    }

    /// Sets whether checks succeed once the script runs dry.
    pub fn set_up(&self, up: bool) {
        *self.inner.up.lock() = up;
    }

    /// Returns the number of checks performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.checks.lock().len()
    }

    /// Returns the instants at which checks were started.
    #[must_use]
    pub fn check_times(&self) -> Vec<Instant> {
        self.inner.checks.lock().clone()
    }

    fn next_outcome(&self) -> ProbeOutcome {
        self.inner.checks.lock().push(Instant::now());

        self.inner.script.lock().pop_front().unwrap_or_else(|| {
            if *self.inner.up.lock() {
                ProbeOutcome::Up
            } else {
                ProbeOutcome::Down
            }
        })
    }
}

impl Probe for FakeProbe {
    fn check(&self) -> impl Future<Output = crate::Result<()>> + Send {
        let outcome = self.next_outcome();

        async move {
            match outcome {
                ProbeOutcome::Up => Ok(()),
                ProbeOutcome::Down => Err(Error::TransportFailure(TransportError::message("backend unreachable"))),
                ProbeOutcome::Hang => std::future::pending().await,
            }
        }
    }
}
