// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The attempt sequence shared by every request: per-attempt timeout, classification of
//! the outcome, and backoff between retryable failures.

use std::cmp::min;
use std::time::Duration;

use tracing::Level;

use crate::stats::Counters;
use crate::{Backoff, ClientOptions, Error, Payload, Request, Response, Result, Transport};

/// Runs `request` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only retryable errors (see [`Error::is_retryable`]) are repeated. When the attempts run
/// out, the error of the last attempt is returned.
pub(crate) async fn execute<T: Transport>(transport: &T, request: &Request, options: &ClientOptions, counters: &Counters) -> Result<Payload> {
    let mut attempt = Attempt::first(options.get_max_attempts());
    let mut delays = Delays::new(options);

    loop {
        counters.attempt();

        let error = match send_once(transport, request.clone(), options.get_attempt_timeout()).await {
            Ok(payload) => return Ok(payload),
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(error);
        }

        let Some(next) = attempt.increment() else {
            tracing::event!(
                name: "reveille.retry.exhausted",
                Level::WARN,
                request.method = %request.method(),
                request.target = request.target(),
                attempts = attempt.number(),
                error = %error,
            );
            return Err(error);
        };

        let delay = delays.next_delay();
        counters.retry();

        tracing::event!(
            name: "reveille.retry",
            Level::WARN,
            request.method = %request.method(),
            request.target = request.target(),
            attempt.index = attempt.index(),
            attempt.is_last = next.is_last(),
            retry.delay = delay.as_secs_f32(),
            error = %error,
        );

        tokio::time::sleep(delay).await;
        attempt = next;
    }
}

/// Issues one attempt under `timeout`. Elapsing the timeout drops the transport future.
pub(crate) async fn send_once<T: Transport>(transport: &T, request: Request, timeout: Duration) -> Result<Payload> {
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Err(_elapsed) => Err(Error::Timeout(timeout)),
        Ok(Err(error)) => Err(Error::TransportFailure(error)),
        Ok(Ok(response)) => into_payload(&response),
    }
}

fn into_payload(response: &Response) -> Result<Payload> {
    if let Some(error) = Error::from_status(response.status()) {
        return Err(error);
    }

    Payload::from_body(response.body())
}

/// A single attempt of the sequence, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attempt {
    index: u32,
    max_attempts: u32,
}

impl Attempt {
    pub fn first(max_attempts: u32) -> Self {
        Self {
            index: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    /// The 1-based attempt number.
    pub fn number(self) -> u32 {
        self.index.saturating_add(1)
    }

    pub fn is_last(self) -> bool {
        self.number() >= self.max_attempts
    }

    pub fn increment(self) -> Option<Self> {
        if self.is_last() {
            return None;
        }

        Some(Self {
            index: self.index + 1,
            max_attempts: self.max_attempts,
        })
    }
}

/// Delays between consecutive attempts.
#[derive(Debug)]
pub(crate) struct Delays {
    backoff: Backoff,
    base: Duration,
    max: Option<Duration>,
    retry: u32,
}

impl Delays {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            backoff: options.get_backoff(),
            base: options.get_retry_base_delay(),
            max: options.get_max_retry_delay(),
            retry: 0,
        }
    }

    /// Returns the delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.retry;
        self.retry = self.retry.saturating_add(1);

        let delay = match self.backoff {
            Backoff::Constant => self.base,
            Backoff::Linear => self.base.saturating_mul(self.retry),
            Backoff::Exponential => self.base.saturating_mul(2_u32.saturating_pow(exponent)),
        };

        self.max.map_or(delay, |max| min(delay, max))
    }
}
