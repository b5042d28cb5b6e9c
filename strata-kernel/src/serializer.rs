//! Default response body serialization.

use crate::error::SerializeError;
use bytes::Bytes;
use serde_json::Value;

/// Turns a structured body into wire bytes.
///
/// Used only when no `kernel.serialize` listener is registered.
pub trait Serializer: Send + Sync + 'static {
    /// Serialize `value`.
    fn serialize(&self, value: &Value) -> Result<Bytes, SerializeError>;
}

/// Compact JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Bytes, SerializeError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}

impl<F> Serializer for F
where
    F: Fn(&Value) -> Result<Bytes, SerializeError> + Send + Sync + 'static,
{
    fn serialize(&self, value: &Value) -> Result<Bytes, SerializeError> {
        (self)(value)
    }
}
