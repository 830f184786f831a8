// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;

/// A decoded response body.
///
/// Payloads are shared, not copied: every caller served from the same cache entry or the
/// same in-flight request receives a clone of the same [`Arc`], which
/// [`Payload::ptr_eq`] can observe.
///
/// # Examples
///
/// ```
/// use reveille::Payload;
/// use serde_json::json;
///
/// let payload = Payload::from(json!({ "id": 7, "name": "Acme" }));
/// let id: u32 = payload.value()["id"].as_u64().unwrap().try_into().unwrap();
/// assert_eq!(id, 7);
///
/// #[derive(serde::Deserialize)]
/// struct Customer {
///     name: String,
/// }
///
/// let customer: Customer = payload.decode().unwrap();
/// assert_eq!(customer.name, "Acme");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(Arc<Value>);

impl Payload {
    /// Parses a raw response body. An empty body decodes as [`Value::Null`].
    pub(crate) fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::from(Value::Null));
        }

        Ok(Self::from(serde_json::from_slice::<Value>(body)?))
    }

    /// Returns the decoded JSON value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeFailure`][crate::Error::DecodeFailure] if the payload does not
    /// match the shape of `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(self.value())?)
    }

    /// Returns `true` if both payloads share the same allocation.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(Arc::new(value))
    }
}
