// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::Level;

use crate::cache::ResponseCache;
use crate::flight::InFlight;
use crate::monitor::AvailabilityMonitor;
use crate::stats::Counters;
use crate::{ClientOptions, ClientStats, Error, Payload, RecoveryKind, Request, Result, Transport, TransportError, retry};

/// A request client that caches reads, coalesces concurrent identical reads, and retries
/// transient failures.
///
/// Every request runs through the same attempt sequence: each attempt is bounded by the
/// [attempt timeout][ClientOptions::attempt_timeout], timeouts and transport failures are
/// retried with growing delays, and responses with a definite error status fail right away.
///
/// Reads issued with a cache key additionally go through the cache:
///
/// 1. a live cached payload is returned without touching the network;
/// 2. otherwise, if a request for the same key is already in flight, the caller waits for
///    its outcome instead of issuing another one;
/// 3. otherwise a new request is issued and, on success, its payload is cached.
///
/// The client is a cheap handle; clones share the same cache, in-flight table and counters.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reveille::{Client, ClientOptions, RequestOptions};
/// # use reveille::{Request, Response, Transport, TransportError};
/// # use http::StatusCode;
/// # struct Backend;
/// # impl Transport for Backend {
/// #     async fn send(&self, _request: Request) -> Result<Response, TransportError> {
/// #         Ok(Response::new(StatusCode::OK, r#"[{"name":"Acme"}]"#))
/// #     }
/// # }
///
/// # async fn example() -> reveille::Result<()> {
/// let client = Client::new(Backend, ClientOptions::default().cache_ttl(Duration::from_secs(600)));
///
/// let customers = client.request("/customers", &RequestOptions::default(), Some("customers:all")).await?;
/// assert_eq!(customers.value()[0]["name"], "Acme");
///
/// // after creating a customer, the cached list is dropped
/// let create = RequestOptions::post(r#"{"name":"Globex"}"#).invalidates("customers");
/// client.request("/customers", &create, None).await?;
/// # Ok(())
/// # }
/// ```
pub struct Client<T> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T> {
    transport: T,
    options: ClientOptions,
    tables: Mutex<Tables>,
    counters: Counters,
    monitor: Option<AvailabilityMonitor>,
    gate_on_availability: bool,
}

/// Cache and in-flight table share one lock, so a lookup in both followed by registering a
/// new call is atomic.
#[derive(Debug, Default)]
struct Tables {
    cache: ResponseCache,
    in_flight: InFlight,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Client<T> {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("monitor", &self.inner.monitor)
            .field("gate_on_availability", &self.inner.gate_on_availability)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client without an availability monitor.
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self::builder(transport).options(options).build()
    }

    /// Starts building a client, e.g. to attach an [`AvailabilityMonitor`].
    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder {
            transport,
            options: ClientOptions::default(),
            monitor: None,
            gate_on_availability: false,
        }
    }

    /// Executes a request against `target`.
    ///
    /// With a `cache_key` and a read method (`GET` or `HEAD`) the request is served from the
    /// cache when possible and coalesced with identical requests in flight. Without a key, or
    /// for any other method, the request always reaches the network.
    ///
    /// Every caller attached to the same in-flight request receives the same payload or the
    /// same error. A cacheable request runs on its own task, so it completes and fills the
    /// cache even when every caller stops waiting for it.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt once retries are exhausted, or the first
    /// non-retryable error. See [`Error`] for the classification.
    ///
    /// # Panics
    ///
    /// Panics if a cacheable request is issued outside of a Tokio runtime.
    pub async fn request(&self, target: &str, options: &RequestOptions, cache_key: Option<&str>) -> Result<Payload> {
        let request = options.to_request(target);

        match cache_key {
            Some(key) if request.is_read() => {
                let ttl = options.ttl.unwrap_or_else(|| self.inner.options.get_cache_ttl());
                self.cached(key, request, ttl).await
            }
            _ => self.direct(&request, &options.invalidates).await,
        }
    }

    /// Shorthand for a `GET` of `target` with default request options.
    ///
    /// # Errors
    ///
    /// See [`request`][Self::request].
    pub async fn get(&self, target: &str, cache_key: Option<&str>) -> Result<Payload> {
        self.request(target, &RequestOptions::default(), cache_key).await
    }

    /// Removes every cached payload whose key contains `pattern`, or every payload for `None`,
    /// and returns the number of payloads removed.
    ///
    /// Requests for matching keys that are in flight still complete for their callers, but
    /// their payloads are not cached.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let removed = {
            let mut tables = self.inner.tables.lock();
            tables.in_flight.mark_stale(pattern);
            tables.cache.invalidate(pattern)
        };

        tracing::event!(
            name: "reveille.cache.invalidate",
            Level::DEBUG,
            cache.pattern = pattern.unwrap_or("*"),
            cache.removed = removed,
        );

        removed
    }

    /// Drops expired payloads and returns how many were dropped.
    ///
    /// Expired payloads are otherwise only dropped when a read finds them.
    pub fn purge_expired(&self) -> usize {
        self.inner.tables.lock().cache.purge_expired(Instant::now())
    }

    /// Returns a snapshot of the request counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        let mut stats = self.inner.counters.snapshot();
        let tables = self.inner.tables.lock();
        stats.cached_entries = tables.cache.len();
        stats.in_flight = tables.in_flight.len();
        stats
    }

    /// Returns the options of the client.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the attached availability monitor, if any.
    #[must_use]
    pub fn monitor(&self) -> Option<&AvailabilityMonitor> {
        self.inner.monitor.as_ref()
    }

    async fn cached(&self, key: &str, request: Request, ttl: Duration) -> Result<Payload> {
        let call = {
            let mut tables = self.inner.tables.lock();

            if let Some(payload) = tables.cache.get(key, Instant::now()) {
                self.inner.counters.cache_hit();
                tracing::event!(name: "reveille.cache.hit", Level::DEBUG, cache.key = key);
                return Ok(payload);
            }

            if let Some(call) = tables.in_flight.get(key) {
                self.inner.counters.coalesced();
                tracing::event!(name: "reveille.cache.coalesced", Level::DEBUG, cache.key = key);
                call
            } else {
                self.inner.counters.cache_miss();
                tracing::event!(name: "reveille.cache.miss", Level::DEBUG, cache.key = key);

                let id = tables.in_flight.next_id();
                let inner = Arc::clone(&self.inner);
                let owned_key = key.to_owned();

                // the call settles on its own task, even if every caller is dropped
                let task = tokio::spawn(async move {
                    let result = AssertUnwindSafe(inner.execute(&request))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_panic| Err(Error::TransportFailure(TransportError::message("request task panicked"))));

                    inner.settle(&owned_key, id, &result, ttl);
                    result
                });

                let call = task
                    .map(|joined| joined.unwrap_or_else(|error| Err(Error::TransportFailure(TransportError::new(error)))))
                    .boxed()
                    .shared();

                tables.in_flight.register(key.to_owned(), id, call.clone());
                call
            }
        };

        call.await
    }

    async fn direct(&self, request: &Request, invalidates: &[String]) -> Result<Payload> {
        let payload = self.inner.execute(request).await?;

        if !request.is_read() {
            for pattern in invalidates {
                self.invalidate(Some(pattern));
            }
        }

        Ok(payload)
    }
}

impl<T: Transport> ClientInner<T> {
    /// Runs the attempt sequence, consulting the monitor when the backend looks down.
    async fn execute(&self, request: &Request) -> Result<Payload> {
        if let Some(monitor) = &self.monitor
            && self.gate_on_availability
            && monitor.current_state().is_unavailable()
        {
            return Err(Error::ServiceUnavailable);
        }

        let error = match retry::execute(&self.transport, request, &self.options, &self.counters).await {
            Ok(payload) => return Ok(payload),
            Err(error) => error,
        };

        let Some(monitor) = &self.monitor else {
            return Err(error);
        };

        if error.recovery() == RecoveryKind::Never {
            return Err(error);
        }

        tracing::event!(
            name: "reveille.monitor.consult",
            Level::DEBUG,
            request.method = %request.method(),
            request.target = request.target(),
            error = %error,
        );

        if monitor.probe().await.is_available() {
            return retry::execute(&self.transport, request, &self.options, &self.counters).await;
        }

        Err(error)
    }

    /// Releases the in-flight entry of a cacheable call and caches a successful payload,
    /// unless the key was invalidated while the call was running.
    fn settle(&self, key: &str, id: u64, result: &Result<Payload>, ttl: Duration) {
        let mut tables = self.tables.lock();
        let stale = tables.in_flight.complete(key, id).is_none_or(|pending| pending.is_stale());

        if let Ok(payload) = result
            && !stale
        {
            tables.cache.insert(key.to_owned(), payload.clone(), ttl, Instant::now());
        }
    }
}

/// Builds a [`Client`].
#[derive(Debug)]
pub struct ClientBuilder<T> {
    transport: T,
    options: ClientOptions,
    monitor: Option<AvailabilityMonitor>,
    gate_on_availability: bool,
}

impl<T: Transport> ClientBuilder<T> {
    /// Sets the client options.
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches an availability monitor.
    ///
    /// When a request fails with a retryable error after all attempts, or the server reports
    /// that it is unavailable, the client asks the monitor to probe the backend. If the probe
    /// finds the backend available, the attempt sequence runs once more.
    #[must_use]
    pub fn monitor(mut self, monitor: AvailabilityMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Fails requests with [`Error::ServiceUnavailable`] without touching the network while
    /// the attached monitor reports the backend as unavailable.
    ///
    /// Only a manual [`probe`][AvailabilityMonitor::probe] brings an unavailable monitor
    /// back, so callers that enable this need a way to trigger one.
    #[must_use]
    pub fn gate_on_availability(mut self, enabled: bool) -> Self {
        self.gate_on_availability = enabled;
        self
    }

    /// Builds the client.
    #[must_use]
    pub fn build(self) -> Client<T> {
        Client {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                options: self.options,
                tables: Mutex::new(Tables::default()),
                counters: Counters::default(),
                monitor: self.monitor,
                gate_on_availability: self.gate_on_availability,
            }),
        }
    }
}

/// Per-request settings: method, headers, body, and cache behavior.
///
/// The default is a `GET` without headers or body that uses the client's cache TTL.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
    ttl: Option<Duration>,
    invalidates: Vec<String>,
}

impl RequestOptions {
    /// A `POST` carrying `body`.
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self::default().method(Method::POST).body(body)
    }

    /// A `PUT` carrying `body`.
    pub fn put(body: impl Into<Bytes>) -> Self {
        Self::default().method(Method::PUT).body(body)
    }

    /// A `DELETE`.
    #[must_use]
    pub fn delete() -> Self {
        Self::default().method(Method::DELETE)
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the cache TTL for this request.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Invalidates cached payloads whose key contains `pattern` once this request succeeds.
    ///
    /// Applies to non-read requests only. May be called several times.
    #[must_use]
    pub fn invalidates(mut self, pattern: impl Into<String>) -> Self {
        self.invalidates.push(pattern.into());
        self
    }

    /// Returns the method.
    #[must_use]
    pub fn get_method(&self) -> &Method {
        &self.method
    }

    /// Returns the TTL override, if any.
    #[must_use]
    pub fn get_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the invalidation patterns.
    #[must_use]
    pub fn get_invalidates(&self) -> &[String] {
        &self.invalidates
    }

    fn to_request(&self, target: &str) -> Request {
        let request = Request::new(self.method.clone(), target).headers(self.headers.clone());

        match &self.body {
            Some(body) => request.body(body.clone()),
            None => request,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures_util::future::join_all;
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{MonitorOptions, Response};
    use crate::monitor::AvailabilityState;
    use crate::testing::{FakeProbe, FakeReply, FakeTransport};

    fn client(transport: &FakeTransport) -> Client<FakeTransport> {
        Client::new(transport.clone(), ClientOptions::default().cache_ttl(Duration::from_secs(600)))
    }

    #[tokio::test(start_paused = true)]
    async fn customers_served_from_cache() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([{ "name": "Acme" }])));
        let client = client(&transport);

        let first = client.get("/customers", Some("customers:all")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = client.get("/customers", Some("customers:all")).await.unwrap();

        assert!(Payload::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 1);
        assert_eq!(client.stats().cache_hits, 1);
        assert_eq!(client.stats().cache_misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_fetched_again() {
        let transport = FakeTransport::new().always(FakeReply::json(json!(1)));
        let client = client(&transport);

        client.get("/stock", Some("stock")).await.unwrap();
        tokio::time::advance(Duration::from_secs(599)).await;
        client.get("/stock", Some("stock")).await.unwrap();
        assert_eq!(transport.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        client.get("/stock", Some("stock")).await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_override() {
        let transport = FakeTransport::new().always(FakeReply::json(json!(1)));
        let client = client(&transport);
        let options = RequestOptions::default().ttl(Duration::from_secs(10));

        client.request("/rates", &options, Some("rates")).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        client.request("/rates", &options, Some("rates")).await.unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_call() {
        let transport = FakeTransport::new().always(FakeReply::json(json!({ "total": 3 })).after(Duration::from_secs(1)));
        let client = client(&transport);

        let results = join_all((0..10).map(|_| client.get("/invoices", Some("invoices:all")))).await;

        assert_eq!(transport.calls(), 1);
        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|result| Payload::ptr_eq(result.as_ref().unwrap(), first)));

        let stats = client.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.coalesced, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_failure() {
        let transport = FakeTransport::new()
            .then(FakeReply::status(StatusCode::UNAUTHORIZED).after(Duration::from_secs(1)))
            .always(FakeReply::json(json!([])));
        let client = client(&transport);

        let results = join_all((0..3).map(|_| client.get("/invoices", Some("invoices:all")))).await;

        assert_eq!(transport.calls(), 1);
        assert!(results.iter().all(|result| matches!(result, Err(Error::Unauthorized(_)))));

        // failures are not cached and the in-flight entry is gone
        client.get("/invoices", Some("invoices:all")).await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn uncached_calls_always_reach_network() {
        let transport = FakeTransport::new().always(FakeReply::json(json!(null)));
        let client = client(&transport);

        client.get("/customers", None).await.unwrap();
        client.get("/customers", None).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(client.stats(), ClientStats { attempts: 2, ..ClientStats::default() });
    }

    #[tokio::test(start_paused = true)]
    async fn writes_are_never_cached() {
        let transport = FakeTransport::new().always(FakeReply::json(json!({ "id": 1 })));
        let client = client(&transport);
        let create = RequestOptions::post("{}");

        client.request("/customers", &create, Some("customers:create")).await.unwrap();
        client.request("/customers", &create, Some("customers:create")).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(*transport.requests()[0].method(), Method::POST);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_by_pattern() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])));
        let client = client(&transport);

        client.get("/invoices", Some("GET /invoices?page=1")).await.unwrap();
        client.get("/invoices", Some("GET /invoices?page=2")).await.unwrap();
        client.get("/customers", Some("GET /customers")).await.unwrap();

        assert_eq!(client.invalidate(Some("invoices")), 2);
        tokio::time::advance(Duration::from_millis(1)).await;

        client.get("/invoices", Some("GET /invoices?page=1")).await.unwrap();
        client.get("/customers", Some("GET /customers")).await.unwrap();

        assert_eq!(transport.calls(), 4);
        assert_eq!(client.invalidate(None), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_invalidates_listed_patterns() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])));
        let client = client(&transport);
        client.get("/customers", Some("customers:all")).await.unwrap();

        let create = RequestOptions::post(r#"{"name":"Globex"}"#).invalidates("customers");
        client.request("/customers", &create, None).await.unwrap();
        client.get("/customers", Some("customers:all")).await.unwrap();

        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mutation_keeps_cache() {
        let transport = FakeTransport::new()
            .then(FakeReply::json(json!([])))
            .then(FakeReply::status(StatusCode::BAD_REQUEST));
        let client = client(&transport);
        client.get("/customers", Some("customers:all")).await.unwrap();

        let create = RequestOptions::post("{}").invalidates("customers");
        let error = client.request("/customers", &create, None).await.unwrap_err();

        assert!(matches!(error, Error::UnexpectedStatus(StatusCode::BAD_REQUEST)));
        client.get("/customers", Some("customers:all")).await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_during_flight_skips_caching() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])).after(Duration::from_secs(2)));
        let client = client(&transport);

        let read = tokio::spawn({
            let client = client.clone();
            async move { client.get("/customers", Some("customers:all")).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        client.invalidate(Some("customers"));

        read.await.unwrap().unwrap();
        client.get("/customers", Some("customers:all")).await.unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_entries() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])));
        let client = client(&transport);
        client.get("/a", Some("a")).await.unwrap();
        client.request("/b", &RequestOptions::default().ttl(Duration::from_secs(1)), Some("b")).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(client.stats().cached_entries, 2);
        assert_eq!(client.purge_expired(), 1);
        assert_eq!(client.stats().cached_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn headers_and_body_reach_transport() {
        let transport = FakeTransport::new().always(FakeReply::status(StatusCode::NO_CONTENT));
        let client = client(&transport);
        let options = RequestOptions::put("{}").header(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let payload = client.request("/customers/7", &options, None).await.unwrap();

        assert!(payload.value().is_null());
        let sent = &transport.requests()[0];
        assert_eq!(sent.header_map()[http::header::AUTHORIZATION], "Bearer t");
        assert_eq!(sent.body_bytes().map(Bytes::as_ref), Some(b"{}".as_slice()));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_rescues_exhausted_retries() {
        let transport = FakeTransport::new()
            .then(FakeReply::fail("connection refused"))
            .then(FakeReply::fail("connection refused"))
            .then(FakeReply::fail("connection refused"))
            .always(FakeReply::json(json!(["acme"])));
        let probe = FakeProbe::up().then_down();
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorOptions::default());
        let client = Client::builder(transport.clone()).monitor(monitor.clone()).build();

        let payload = client.get("/customers", Some("customers:all")).await.unwrap();

        assert_eq!(payload.value(), &json!(["acme"]));
        assert_eq!(transport.calls(), 4);
        assert_eq!(probe.calls(), 2);
        assert!(monitor.current_state().is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_confirms_outage() {
        let transport = FakeTransport::new().always(FakeReply::status(StatusCode::SERVICE_UNAVAILABLE));
        let monitor = AvailabilityMonitor::new(FakeProbe::down(), MonitorOptions::default());
        let client = Client::builder(transport.clone()).monitor(monitor.clone()).build();

        let error = client.get("/customers", None).await.unwrap_err();

        assert!(matches!(error, Error::ServiceUnavailable));
        assert_eq!(error.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(transport.calls(), 1);
        assert_eq!(monitor.current_state(), AvailabilityState::Unavailable { failed_attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_not_consulted_for_permanent_errors() {
        let transport = FakeTransport::new().always(FakeReply::status(StatusCode::NOT_FOUND));
        let probe = FakeProbe::up();
        let client = Client::builder(transport)
            .monitor(AvailabilityMonitor::new(probe.clone(), MonitorOptions::default()))
            .build();

        assert!(matches!(client.get("/customers/9", None).await, Err(Error::NotFound)));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_fails_fast_while_unavailable() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])));
        let probe = FakeProbe::down();
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorOptions::default());
        let client = Client::builder(transport.clone())
            .monitor(monitor.clone())
            .gate_on_availability(true)
            .build();
        assert!(monitor.probe().await.is_unavailable());

        let error = client.get("/customers", Some("customers:all")).await.unwrap_err();
        assert!(matches!(error, Error::ServiceUnavailable));
        assert_eq!(transport.calls(), 0);

        probe.set_up(true);
        assert!(monitor.probe().await.is_available());
        client.get("/customers", Some("customers:all")).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn request_options_do_not_leak_into_each_other() {
        let base = RequestOptions::post("{}");
        let with_ttl = base.clone().ttl(Duration::from_secs(1)).invalidates("customers");

        assert_eq!(base.get_ttl(), None);
        assert!(base.get_invalidates().is_empty());
        assert_eq!(with_ttl.get_invalidates(), ["customers".to_string()]);
        assert_eq!(*with_ttl.get_method(), Method::POST);
    }

    #[derive(Debug, Default)]
    struct CrashesOnce {
        calls: AtomicU32,
    }

    impl Transport for CrashesOnce {
        async fn send(&self, _request: Request) -> std::result::Result<Response, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            assert!(call > 0, "transport bug on first call");
            Ok(Response::new(StatusCode::OK, "[]"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_transport_releases_key() {
        let transport = Arc::new(CrashesOnce::default());
        let client = Client::new(Arc::clone(&transport), ClientOptions::default());

        let error = client.get("/customers", Some("customers:all")).await.unwrap_err();
        assert!(matches!(error, Error::TransportFailure(_)));
        assert_eq!(client.stats().in_flight, 0);

        client.get("/customers", Some("customers:all")).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_read_settles_and_fills_cache() {
        let transport = FakeTransport::new().always(FakeReply::json(json!([])).after(Duration::from_secs(5)));
        let client = client(&transport);

        tokio::time::timeout(Duration::from_secs(1), client.get("/customers", Some("customers:all")))
            .await
            .unwrap_err();
        assert_eq!(client.stats().in_flight, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let stats = client.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.cached_entries, 1);

        client.get("/customers", Some("customers:all")).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }
}
