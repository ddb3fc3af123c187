//! Per-request objects handed to middleware, route handlers, and error handlers.
//!
//! Both are created fresh for every request and owned by the thread running
//! that request's dispatch.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use switchyard_core::{Context, Version};

/// An incoming request plus the dispatch metadata attached to it.
pub struct Request {
    inner: http::Request<Bytes>,
    /// API namespace the router resolves against. Zero means unversioned.
    pub api_version: Version,
    /// Context attached by the transport or a middleware, if any.
    pub context: Option<Arc<dyn Context>>,
}

impl Request {
    /// Wraps a transport request. The version starts unversioned and no
    /// context is attached.
    #[must_use]
    pub fn new(inner: http::Request<Bytes>) -> Self {
        Self {
            inner,
            api_version: Version::default(),
            context: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.api_version = version;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Arc<dyn Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }
}

impl Deref for Request {
    type Target = http::Request<Bytes>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", self.inner.method())
            .field("uri", self.inner.uri())
            .field("api_version", &self.api_version)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Response under construction. Handlers set the status and headers and
/// append to the body.
#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends raw bytes to the body.
    pub fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Serializes `value` as JSON, sets `Content-Type: application/json`,
    /// and appends the encoded bytes to the body.
    ///
    /// # Errors
    ///
    /// Returns the serialization error; the response is left untouched.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        let encoded = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.write(&encoded);
        Ok(())
    }

    /// Converts into a transport response.
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut res = http::Response::new(self.body.freeze());
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
