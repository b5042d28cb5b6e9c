//! Response and request body content.

use crate::error::ErrorBody;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use strata_core::BoxError;

/// `Content-Type` for markup text.
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
/// `Content-Type` for plain text.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
/// `Content-Type` for structured bodies.
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";
/// `Content-Type` for binary and streamed bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A chunked body source.
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Content of a message body.
///
/// Text, bytes and streams are written as-is; [`Body::Json`] must be
/// serialized first.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// A structured value awaiting serialization.
    Json(Value),
    /// Chunks produced on demand.
    Stream(BodyStream),
}

/// The variant of a [`Body`], without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// [`Body::Empty`].
    Empty,
    /// [`Body::Text`] starting with `<`, ignoring leading whitespace.
    Html,
    /// Any other [`Body::Text`].
    Text,
    /// [`Body::Bytes`].
    Bytes,
    /// [`Body::Json`].
    Json,
    /// [`Body::Stream`].
    Stream,
}

impl Body {
    /// Serialize any value into a structured body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Body::Json)
    }

    /// Wrap a stream of chunks.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Body::Stream(stream.map(|chunk| chunk.map_err(Into::into)).boxed())
    }

    /// The body variant.
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Empty => BodyKind::Empty,
            Body::Text(text) if text.trim_start().starts_with('<') => BodyKind::Html,
            Body::Text(_) => BodyKind::Text,
            Body::Bytes(_) => BodyKind::Bytes,
            Body::Json(_) => BodyKind::Json,
            Body::Stream(_) => BodyKind::Stream,
        }
    }

    /// Whether there is no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Whether the body can be written without serialization.
    pub fn is_writable(&self) -> bool {
        matches!(self, Body::Text(_) | Body::Bytes(_) | Body::Stream(_))
    }

    /// The `Content-Type` implied by the content.
    pub fn content_type(&self) -> Option<&'static str> {
        match self.kind() {
            BodyKind::Empty => None,
            BodyKind::Html => Some(TEXT_HTML),
            BodyKind::Text => Some(TEXT_PLAIN),
            BodyKind::Bytes | BodyKind::Stream => Some(OCTET_STREAM),
            BodyKind::Json => Some(APPLICATION_JSON),
        }
    }

    /// Byte length of in-memory content. `None` for JSON and streams.
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Text(text) => Some(text.len()),
            Body::Bytes(bytes) => Some(bytes.len()),
            Body::Json(_) | Body::Stream(_) => None,
        }
    }

    /// The structured value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if this is a text body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// In-memory bytes of a text or bytes body.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Body::Text(text) => Some(Bytes::copy_from_slice(text.as_bytes())),
            Body::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// A copy of an in-memory body. `None` for streams, which can be read once.
    pub fn try_clone(&self) -> Option<Body> {
        match self {
            Body::Empty => Some(Body::Empty),
            Body::Text(text) => Some(Body::Text(text.clone())),
            Body::Bytes(bytes) => Some(Body::Bytes(bytes.clone())),
            Body::Json(value) => Some(Body::Json(value.clone())),
            Body::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<ErrorBody> for Body {
    fn from(content: ErrorBody) -> Self {
        match content {
            ErrorBody::Text(text) => Body::Text(text),
            ErrorBody::Json(value) => Body::Json(value),
        }
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(body: Option<T>) -> Self {
        body.map_or(Body::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_type_inference() {
        assert_eq!(Body::from("  <p>hi</p>").content_type(), Some(TEXT_HTML));
        assert_eq!(Body::from("hi").content_type(), Some(TEXT_PLAIN));
        assert_eq!(Body::from(vec![1u8, 2]).content_type(), Some(OCTET_STREAM));
        assert_eq!(Body::from(json!({"a": 1})).content_type(), Some(APPLICATION_JSON));
        assert_eq!(Body::Empty.content_type(), None);
    }

    #[test]
    fn test_only_primitive_bodies_are_writable() {
        assert!(Body::from("x").is_writable());
        assert!(!Body::from(json!([1])).is_writable());
        let stream = Body::from_stream(futures::stream::iter([Ok::<_, BoxError>(Bytes::from("a"))]));
        assert!(stream.is_writable());
        assert!(stream.try_clone().is_none());
    }
}
