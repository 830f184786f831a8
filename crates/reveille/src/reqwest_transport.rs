// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Request, Response, Transport, TransportError};

/// A [`Transport`] that sends requests with [`reqwest`].
///
/// Request targets are resolved against the base URL by plain concatenation, so a base of
/// `https://api.example.com/v1` and a target of `/customers` reach
/// `https://api.example.com/v1/customers`.
///
/// The transport sets no timeout of its own; the client bounds every attempt.
///
/// # Examples
///
/// ```
/// use reveille::{Client, ClientOptions, ReqwestTransport};
///
/// let client = Client::new(ReqwestTransport::new("https://api.example.com/v1"), ClientOptions::default());
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport with a default [`reqwest::Client`].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a transport that sends through an existing [`reqwest::Client`], e.g. one
    /// configured with default headers or a proxy.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self { client, base_url }
    }

    /// Returns the base URL without trailing slashes.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, target: &str) -> String {
        if target.starts_with('/') {
            format!("{}{target}", self.base_url)
        } else {
            format!("{}/{target}", self.base_url)
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, TransportError>> + Send {
        let mut builder = self
            .client
            .request(request.method().clone(), self.url(request.target()))
            .headers(request.header_map().clone());

        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.clone());
        }

        async move {
            let response = builder.send().await.map_err(TransportError::new)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(TransportError::new)?;

            Ok(Response::new(status, body).with_headers(headers))
        }
    }
}
