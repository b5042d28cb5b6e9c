//! The host side of a request: the raw incoming message and the outgoing byte sink.

use crate::{
    error::HeaderError,
    http::{Body, HttpHeaders},
};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Version};
use std::net::SocketAddr;
use strata_core::BoxError;

/// A request as received by the host, before routing.
#[derive(Debug)]
pub struct RawRequest {
    /// Request method.
    pub method: Method,
    /// Path and query.
    pub url: String,
    /// Protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HttpHeaders,
    /// Peer address.
    pub remote_addr: Option<SocketAddr>,
    /// Whether the connection is encrypted.
    pub secure: bool,
    /// Unparsed body.
    pub body: Body,
}

impl RawRequest {
    /// An HTTP/1.1 request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            version: Version::HTTP_11,
            headers: HttpHeaders::new(),
            remote_addr: None,
            secure: false,
            body: Body::Empty,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Result<Self, HeaderError> {
        self.headers.append(name, value)?;
        Ok(self)
    }

    /// Set the protocol version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the peer address.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Mark the connection as encrypted.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the unparsed body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }
}

/// The outgoing side of one exchange.
///
/// Implemented by the host server; the kernel writes the head at most once
/// and always calls [`end`](Self::end).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the status line and headers were flushed.
    fn headers_sent(&self) -> bool;

    /// Whether the exchange was completed.
    fn ended(&self) -> bool;

    /// Flush the status line and headers.
    async fn write_head(
        &mut self,
        status: u16,
        reason: Option<&'static str>,
        headers: &HttpHeaders,
    ) -> Result<(), BoxError>;

    /// Write one body chunk.
    async fn write(&mut self, chunk: Bytes) -> Result<(), BoxError>;

    /// Queue the trailer section.
    async fn add_trailers(&mut self, trailers: Vec<(String, String)>) -> Result<(), BoxError>;

    /// Complete the exchange.
    async fn end(&mut self) -> Result<(), BoxError>;
}
