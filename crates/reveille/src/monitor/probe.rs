// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::{Error, Request, Result, Transport};

/// A single reachability check of the backend.
///
/// A check succeeds when the backend answered. The monitor bounds every check with its
/// probe timeout, so implementations need no timeout of their own.
///
/// Implemented for closures returning a future, and by [`HttpProbe`].
///
/// # Examples
///
/// ```
/// use reveille::monitor::AvailabilityMonitor;
/// use reveille::MonitorOptions;
///
/// let monitor = AvailabilityMonitor::new(|| async { Ok::<_, reveille::Error>(()) }, MonitorOptions::default());
/// ```
pub trait Probe: Send + Sync + 'static {
    /// Checks whether the backend answers.
    fn check(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<F, Fut> Probe for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn check(&self) -> impl Future<Output = Result<()>> + Send {
        self()
    }
}

/// Checks reachability with a `GET` of a health path through a [`Transport`].
///
/// Any `2xx` response counts as reachable; any other status or a transport failure does not.
///
/// # Examples
///
/// ```
/// use reveille::monitor::HttpProbe;
/// # use reveille::{Request, Response, Transport, TransportError};
/// # struct Backend;
/// # impl Transport for Backend {
/// #     async fn send(&self, _request: Request) -> Result<Response, TransportError> {
/// #         unimplemented!()
/// #     }
/// # }
///
/// let probe = HttpProbe::new(Backend, "/health");
/// assert_eq!(probe.path(), "/health");
/// ```
#[derive(Debug, Clone)]
pub struct HttpProbe<T> {
    transport: T,
    path: String,
}

impl<T: Transport> HttpProbe<T> {
    /// Creates a probe that requests `path` through `transport`.
    pub fn new(transport: T, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }

    /// Returns the health path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: Transport> Probe for HttpProbe<T> {
    fn check(&self) -> impl Future<Output = Result<()>> + Send {
        let response = self.transport.send(Request::get(self.path.clone()));

        async move {
            let response = response.await?;

            match Error::from_status(response.status()) {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }
}

/// Object-safe form of [`Probe`] so the monitor can hold any probe without a type parameter.
pub(crate) trait DynProbe: Send + Sync {
    fn check_boxed(&self) -> BoxFuture<'_, Result<()>>;
}

impl<P: Probe> DynProbe for P {
    fn check_boxed(&self) -> BoxFuture<'_, Result<()>> {
        self.check().boxed()
    }
}
