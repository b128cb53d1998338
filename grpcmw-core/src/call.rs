//! Per-call values handed to interceptors.
//!
//! The framework builds one [`UnaryCall`] or [`StreamCall`] per RPC and moves
//! it through the chain. Interceptors own the call while they run, so they may
//! rewrite metadata, replace the request or wrap the stream before handing it
//! to the next element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::stream::MessageStream;

/// Request and response payloads. The core never looks inside them.
pub type Message = serde_json::Value;

/// Which side of the connection a router serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    /// Outgoing calls, intercepted before they reach the transport
    Client,
    /// Incoming calls, intercepted before they reach the service
    Server,
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallDirection::Client => f.write_str("client"),
            CallDirection::Server => f.write_str("server"),
        }
    }
}

/// Identity of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Fully-qualified method path, e.g. `/pkg.Service/Method`
    pub method: String,
    /// Side of the connection the call is being intercepted on
    pub direction: CallDirection,
    /// Unique id, used to correlate log lines of one call
    pub id: Uuid,
}

impl CallInfo {
    /// Create call info with a fresh id.
    pub fn new(method: impl Into<String>, direction: CallDirection) -> Self {
        Self {
            method: method.into(),
            direction,
            id: Uuid::new_v4(),
        }
    }
}

/// Call metadata (headers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    #[allow(missing_docs)]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single request/response call.
#[derive(Debug, Clone)]
pub struct UnaryCall {
    /// Call identity
    pub info: CallInfo,
    /// Call metadata
    pub metadata: Metadata,
    /// Request payload
    pub request: Message,
}

impl UnaryCall {
    /// Create a server-side call with empty metadata.
    pub fn new(method: impl Into<String>, request: Message) -> Self {
        Self {
            info: CallInfo::new(method, CallDirection::Server),
            metadata: Metadata::new(),
            request,
        }
    }

    /// Set the direction the call is intercepted on.
    pub fn with_direction(mut self, direction: CallDirection) -> Self {
        self.info.direction = direction;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Fully-qualified method path.
    pub fn method(&self) -> &str {
        &self.info.method
    }
}

/// A streaming call, carrying the bidirectional stream handle.
pub struct StreamCall {
    /// Call identity
    pub info: CallInfo,
    /// Call metadata
    pub metadata: Metadata,
    /// Stream handle; interceptors may replace it with a wrapper
    pub stream: Box<dyn MessageStream>,
}

impl StreamCall {
    /// Create a server-side streaming call with empty metadata.
    pub fn new(method: impl Into<String>, stream: impl MessageStream + 'static) -> Self {
        Self {
            info: CallInfo::new(method, CallDirection::Server),
            metadata: Metadata::new(),
            stream: Box::new(stream),
        }
    }

    /// Set the direction the call is intercepted on.
    pub fn with_direction(mut self, direction: CallDirection) -> Self {
        self.info.direction = direction;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Fully-qualified method path.
    pub fn method(&self) -> &str {
        &self.info.method
    }

    /// Replace the stream handle with a wrapper built from the current one.
    pub fn map_stream<F>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Box<dyn MessageStream>) -> Box<dyn MessageStream>,
    {
        self.stream = wrap(self.stream);
        self
    }
}

impl fmt::Debug for StreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCall")
            .field("info", &self.info)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
