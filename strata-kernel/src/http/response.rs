//! Response wrapper mutated by listeners and handlers.

use super::{
    body::{Body, BodyKind},
    headers::HttpHeaders,
    trailers::HttpTrailers,
};
use crate::error::{HeaderError, StatusError};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::{fmt, sync::Arc};
use strata_core::AbortController;

struct State {
    status: u16,
    status_set: bool,
    headers: HttpHeaders,
    cookies: Vec<String>,
    trailers: HttpTrailers,
    body: Body,
}

/// The outgoing response of one lifecycle.
///
/// A cheap handle over shared state. Each accessor takes a short lock, so
/// the handle can be used from any listener without holding it across an
/// await.
#[derive(Clone)]
pub struct HttpResponse {
    state: Arc<Mutex<State>>,
    abort: AbortController,
}

impl HttpResponse {
    /// A `200` response with no body. [`send`](Self::send) aborts `abort`.
    pub fn new(abort: AbortController) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status: 200,
                status_set: false,
                headers: HttpHeaders::new(),
                cookies: Vec::new(),
                trailers: HttpTrailers::new(),
                body: Body::Empty,
            })),
            abort,
        }
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.state.lock().status
    }

    /// Whether a status was set explicitly.
    pub fn is_status_set(&self) -> bool {
        self.state.lock().status_set
    }

    /// Set the status code.
    ///
    /// `204` and `304` clear the body; `204` also drops the `Trailer` header.
    pub fn set_status(&self, status: u16) -> Result<(), StatusError> {
        if !(100..=999).contains(&status) {
            return Err(StatusError(status));
        }
        let mut state = self.state.lock();
        if matches!(status, 204 | 304) {
            state.body = Body::Empty;
        }
        if status == 204 {
            state.headers.remove("trailer");
        }
        state.status = status;
        state.status_set = true;
        Ok(())
    }

    /// Snapshot of the headers.
    pub fn headers(&self) -> HttpHeaders {
        self.state.lock().headers.clone()
    }

    /// Run `f` against the live header map.
    pub fn with_headers<R>(&self, f: impl FnOnce(&mut HttpHeaders) -> R) -> R {
        f(&mut self.state.lock().headers)
    }

    /// First value of one header.
    pub fn header(&self, name: &str) -> Option<String> {
        self.state.lock().headers.get(name).map(str::to_owned)
    }

    /// Whether a header is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.state.lock().headers.has(name)
    }

    /// Set a header, replacing previous values.
    pub fn set_header(&self, name: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        self.state.lock().headers.set(name, value).map(|_| ())
    }

    /// Add a header value.
    pub fn append_header(&self, name: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        self.state.lock().headers.append(name, value).map(|_| ())
    }

    /// Remove a header.
    pub fn remove_header(&self, name: &str) -> bool {
        self.state.lock().headers.remove(name)
    }

    /// Queue a `Set-Cookie` line.
    pub fn add_cookie(&self, cookie: impl Into<String>) -> Result<(), HeaderError> {
        let cookie = cookie.into();
        if cookie.contains(['\r', '\n']) {
            return Err(HeaderError::InvalidValue("set-cookie".into()));
        }
        self.state.lock().cookies.push(cookie);
        Ok(())
    }

    /// Queued `Set-Cookie` lines.
    pub fn cookies(&self) -> Vec<String> {
        self.state.lock().cookies.clone()
    }

    /// Declare a trailer.
    pub fn add_trailer(&self, name: &str) -> Result<(), HeaderError> {
        self.state.lock().trailers.add(name).map(|_| ())
    }

    /// Withdraw a trailer declaration.
    pub fn remove_trailer(&self, name: &str) -> bool {
        self.state.lock().trailers.remove(name)
    }

    /// Snapshot of the trailer declarations.
    pub fn trailers(&self) -> HttpTrailers {
        self.state.lock().trailers.clone()
    }

    /// Replace the body without completing the response.
    pub fn set_body(&self, body: impl Into<Body>) {
        self.state.lock().body = body.into();
    }

    /// Take the body, leaving [`Body::Empty`].
    pub fn take_body(&self) -> Body {
        std::mem::take(&mut self.state.lock().body)
    }

    /// The body variant.
    pub fn body_kind(&self) -> BodyKind {
        self.state.lock().body.kind()
    }

    /// Copy of a text body.
    pub fn body_text(&self) -> Option<String> {
        self.state.lock().body.as_text().map(str::to_owned)
    }

    /// Copy of a JSON body.
    pub fn body_json(&self) -> Option<Value> {
        self.state.lock().body.as_json().cloned()
    }

    /// In-memory bytes of a text or bytes body.
    pub fn body_bytes(&self) -> Option<Bytes> {
        self.state.lock().body.to_bytes()
    }

    /// Byte length of an in-memory body.
    pub fn body_len(&self) -> Option<usize> {
        self.state.lock().body.byte_len()
    }

    /// Complete the response: set the body and stop the in-flight phase.
    ///
    /// Remaining request and controller listeners are skipped; the response,
    /// error, write and finish phases still run. An empty body also drops
    /// `Content-Type`, `Content-Length` and `Transfer-Encoding`.
    pub fn send(&self, body: impl Into<Body>) {
        {
            let mut state = self.state.lock();
            state.body = body.into();
            if state.body.is_empty() {
                state.headers.remove("content-type");
                state.headers.remove("content-length");
                state.headers.remove("transfer-encoding");
            }
        }
        self.abort.abort();
    }

    /// Redirect to `url` and [`send`](Self::send) an empty body.
    ///
    /// The status becomes `302` unless one was set explicitly.
    pub fn redirect(&self, url: &str) -> Result<(), HeaderError> {
        self.set_header("location", encode_uri(url))?;
        if !self.is_status_set() {
            let mut state = self.state.lock();
            state.status = 302;
            state.status_set = true;
        }
        self.send(Body::Empty);
        Ok(())
    }

    /// The `Content-Type` header, or the type implied by the body.
    pub fn content_type(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .headers
            .get("content-type")
            .map(str::to_owned)
            .or_else(|| state.body.content_type().map(str::to_owned))
    }

    /// Set or clear the `Content-Type` header.
    pub fn set_content_type(&self, content_type: Option<&str>) -> Result<(), HeaderError> {
        let mut state = self.state.lock();
        match content_type {
            Some(value) => state.headers.set("content-type", value).map(|_| ()),
            None => {
                state.headers.remove("content-type");
                Ok(())
            }
        }
    }

    /// The `Content-Length` header, if it is a valid number.
    pub fn content_length(&self) -> Option<u64> {
        self.state
            .lock()
            .headers
            .get("content-length")?
            .trim()
            .parse()
            .ok()
    }

    /// Set or clear the `Content-Length` header.
    pub fn set_content_length(&self, length: Option<u64>) {
        let mut state = self.state.lock();
        match length {
            Some(length) => {
                // Digits are always a valid header value.
                let _ = state.headers.set("content-length", length.to_string());
            }
            None => {
                state.headers.remove("content-length");
            }
        }
    }

    /// Drop cookies, headers, trailer declarations and the body.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.cookies.clear();
        state.headers.clear();
        state.trailers.clear();
        state.body = Body::Empty;
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HttpResponse")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("body", &state.body)
            .finish_non_exhaustive()
    }
}

/// Percent-encode everything outside the URI reserved and unreserved sets.
fn encode_uri(url: &str) -> String {
    const KEEP: &[u8] = b";,/?:@&=+$-_.!~*'()#";
    let mut out = String::with_capacity(url.len());
    for byte in url.bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
