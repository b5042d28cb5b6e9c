//! Testing utilities for kernel code.
//!
//! This module provides helpers for driving requests without a server:
//!
//! - [`MemoryTransport`]: Records everything the kernel writes
//! - [`RecordingListener`]: Records event names
//! - [`CountingListener`]: Counts invocations
//! - [`FailingListener`]: Always fails with a fixed message
//! - [`FailingStream`]: A body stream that errors after its chunks
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = MemoryTransport::new();
//! kernel.handle(RawRequest::get("/"), transport.boxed()).await?;
//! assert_eq!(transport.status(), Some(200));
//! ```

use crate::{
    http::{Body, HttpHeaders},
    transport::Transport,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use strata_core::{BoxError, Event, EventName, Listener, MetaListener, Payload};
use thiserror::Error;

// ============================================================================
// Memory Transport
// ============================================================================

#[derive(Default)]
struct Recorded {
    status: Option<u16>,
    reason: Option<&'static str>,
    headers: HttpHeaders,
    head_writes: usize,
    body: Vec<u8>,
    chunks: usize,
    trailers: Vec<(String, String)>,
    ended: bool,
    end_calls: usize,
    fail_writes: bool,
}

/// A [`Transport`] that keeps everything in memory.
///
/// Clones share state, so keep one clone and hand a boxed one to the kernel.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<Recorded>>,
}

impl MemoryTransport {
    /// A fresh transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose head was already flushed, as after a host-level write.
    pub fn with_headers_sent(status: u16) -> Self {
        let transport = Self::new();
        {
            let mut state = transport.state.lock();
            state.status = Some(status);
            state.head_writes = 1;
        }
        transport
    }

    /// Make every body write fail.
    pub fn fail_writes(self) -> Self {
        self.state.lock().fail_writes = true;
        self
    }

    /// A boxed clone for [`Kernel::handle`](crate::Kernel::handle).
    pub fn boxed(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }

    /// The status written with the head.
    pub fn status(&self) -> Option<u16> {
        self.state.lock().status
    }

    /// The reason phrase written with the head.
    pub fn reason(&self) -> Option<&'static str> {
        self.state.lock().reason
    }

    /// The headers written with the head.
    pub fn headers(&self) -> HttpHeaders {
        self.state.lock().headers.clone()
    }

    /// First value of one written header.
    pub fn header(&self, name: &str) -> Option<String> {
        self.state.lock().headers.get(name).map(str::to_owned)
    }

    /// How many times the head was written.
    pub fn head_writes(&self) -> usize {
        self.state.lock().head_writes
    }

    /// The body bytes written so far.
    pub fn body(&self) -> Vec<u8> {
        self.state.lock().body.clone()
    }

    /// The body as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().body).into_owned()
    }

    /// Number of body writes.
    pub fn chunks(&self) -> usize {
        self.state.lock().chunks
    }

    /// The trailer section.
    pub fn trailers(&self) -> Vec<(String, String)> {
        self.state.lock().trailers.clone()
    }

    /// Whether the exchange was completed.
    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// How many times `end` was called.
    pub fn end_calls(&self) -> usize {
        self.state.lock().end_calls
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryTransport")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("body_len", &state.body.len())
            .field("ended", &state.ended)
            .finish()
    }
}

/// Failure injected by [`MemoryTransport::fail_writes`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transport write failed")]
pub struct WriteFailed;

#[async_trait]
impl Transport for MemoryTransport {
    fn headers_sent(&self) -> bool {
        self.state.lock().head_writes > 0
    }

    fn ended(&self) -> bool {
        self.state.lock().ended
    }

    async fn write_head(
        &mut self,
        status: u16,
        reason: Option<&'static str>,
        headers: &HttpHeaders,
    ) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        state.status = Some(status);
        state.reason = reason;
        state.headers = headers.clone();
        state.head_writes += 1;
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(Box::new(WriteFailed));
        }
        state.body.extend_from_slice(&chunk);
        state.chunks += 1;
        Ok(())
    }

    async fn add_trailers(&mut self, trailers: Vec<(String, String)>) -> Result<(), BoxError> {
        self.state.lock().trailers.extend(trailers);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        state.ended = true;
        state.end_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Recording Listener
// ============================================================================

/// A listener that records the name of every event it sees.
#[derive(Clone, Default)]
pub struct RecordingListener {
    names: Arc<Mutex<Vec<EventName>>>,
}

impl RecordingListener {
    /// Create a new recording listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded names, in dispatch order.
    pub fn names(&self) -> Vec<String> {
        self.names
            .lock()
            .iter()
            .map(|name| name.as_str().to_owned())
            .collect()
    }

    /// Number of recorded events.
    pub fn count(&self) -> usize {
        self.names.lock().len()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.names.lock().clear();
    }
}

impl<P: Payload> Listener<P> for RecordingListener {
    async fn on_event(&self, event: &Event<P>) -> Result<(), BoxError> {
        self.names.lock().push(event.name().clone());
        Ok(())
    }
}

impl<P: Payload> MetaListener<P> for RecordingListener {
    fn on_meta(&self, event: &Event<P>) -> Result<(), BoxError> {
        self.names.lock().push(event.name().clone());
        Ok(())
    }
}

// ============================================================================
// Counting Listener
// ============================================================================

/// A listener that counts invocations.
#[derive(Clone, Default)]
pub struct CountingListener {
    count: Arc<AtomicUsize>,
}

impl CountingListener {
    /// Create a new counting listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<P: Payload> Listener<P> for CountingListener {
    async fn on_event(&self, _event: &Event<P>) -> Result<(), BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Failing Listener
// ============================================================================

/// Error raised by [`FailingListener`] and [`FailingStream`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InjectedFailure(pub String);

/// A listener that always fails.
#[derive(Debug, Clone)]
pub struct FailingListener {
    message: String,
}

impl FailingListener {
    /// Fail with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<P: Payload> Listener<P> for FailingListener {
    async fn on_event(&self, _event: &Event<P>) -> Result<(), BoxError> {
        Err(Box::new(InjectedFailure(self.message.clone())))
    }
}

// ============================================================================
// Failing Stream
// ============================================================================

/// Builds a streaming [`Body`] that yields some chunks and then fails.
#[derive(Debug, Clone, Default)]
pub struct FailingStream {
    chunks: Vec<Bytes>,
    message: String,
}

impl FailingStream {
    /// A stream failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            message: message.into(),
        }
    }

    /// Yield `chunk` before failing.
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    /// The body.
    pub fn into_body(self) -> Body {
        let failure: Result<Bytes, InjectedFailure> = Err(InjectedFailure(self.message));
        let items = self.chunks.into_iter().map(Ok).chain(std::iter::once(failure));
        Body::from_stream(stream::iter(items))
    }
}

/// A streaming [`Body`] yielding `chunks`.
pub fn chunked_body<I, C>(chunks: I) -> Body
where
    I: IntoIterator<Item = C>,
    I::IntoIter: Send + 'static,
    C: Into<Bytes> + 'static,
{
    let items = chunks
        .into_iter()
        .map(|chunk| Ok::<Bytes, InjectedFailure>(chunk.into()));
    Body::from_stream(stream::iter(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_memory_transport_shares_state() {
        let transport = MemoryTransport::new();
        let mut boxed = transport.boxed();
        boxed.write_head(200, Some("OK"), &HttpHeaders::new()).await.unwrap();
        boxed.write(Bytes::from_static(b"hi")).await.unwrap();
        boxed.end().await.unwrap();

        assert_eq!(transport.status(), Some(200));
        assert_eq!(transport.body_text(), "hi");
        assert!(transport.is_ended());
        assert!(boxed.headers_sent());
    }

    #[tokio::test]
    async fn test_failing_stream_yields_then_fails() {
        let Body::Stream(mut stream) = FailingStream::new("broken").chunk("a").into_body() else {
            panic!("expected a stream body");
        };
        assert_eq!(&stream.next().await.unwrap().unwrap()[..], b"a");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
