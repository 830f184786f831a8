// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The network boundary wrapped by the [`Client`][crate::Client].

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

use crate::TransportError;

/// Sends a single request to the backend and returns its response.
///
/// Implementations perform exactly one network exchange per call and must not retry,
/// cache or time out on their own - the [`Client`][crate::Client] layers those concerns
/// on top. Dropping the returned future must abort the exchange; this is how per-attempt
/// timeouts cancel calls.
///
/// A response with a non-success status is still a response and must be returned as
/// `Ok`. Only failures that produced no response at all (connection refused, reset,
/// unreadable body) are reported as [`TransportError`].
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use http::StatusCode;
/// use reveille::{Request, Response, Transport, TransportError};
///
/// struct Static;
///
/// impl Transport for Static {
///     async fn send(&self, _request: Request) -> Result<Response, TransportError> {
///         Ok(Response::new(StatusCode::OK, Bytes::from_static(b"[]")))
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Performs one network exchange.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request)
    }
}

/// An outbound request.
///
/// The target is a resource path relative to the backend, e.g. `/customers?page=2`;
/// transports resolve it against their base address.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Adds a header, replacing any previous value with the same name.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces all headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the resource path.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request headers.
    #[must_use]
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request body, if any.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns `true` for methods whose responses may be cached and shared.
    #[must_use]
    pub fn is_read(&self) -> bool {
        is_read(&self.method)
    }
}

pub(crate) fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// A response received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Creates a response without headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
