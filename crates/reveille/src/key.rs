// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use http::Method;

/// Builds the canonical cache key of a request.
///
/// A key encodes the method, the resource and the query parameters, so two requests share a
/// cache entry only when all three match. Parameters are rendered sorted by name, which
/// makes the key independent of the order in which they were added.
///
/// Invalidation matches keys by substring, so the resource name doubles as the pattern that
/// covers a whole resource family.
///
/// # Examples
///
/// ```
/// use reveille::CacheKey;
///
/// let key = CacheKey::get("/invoices")
///     .param("status", "open")
///     .param("page", "2")
///     .to_string();
///
/// assert_eq!(key, "GET /invoices?page=2&status=open");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    resource: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    /// Creates a key for the given method and resource.
    #[must_use]
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// Creates a key for a `GET` of the given resource.
    #[must_use]
    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(Method::GET, resource)
    }

    /// Adds a query parameter. A later value for the same name replaces the earlier one.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.resource)?;

        for (index, (name, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }

        Ok(())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}
