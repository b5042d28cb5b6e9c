//! Trailer declarations and the value block filled by `kernel.trailers` listeners.

use super::headers::is_token;
use crate::error::HeaderError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Names that must never be sent as trailers.
pub const FORBIDDEN_TRAILERS: [&str; 12] = [
    "transfer-encoding",
    "content-length",
    "host",
    "cache-control",
    "max-forwards",
    "te",
    "authorization",
    "set-cookie",
    "content-encoding",
    "content-type",
    "content-range",
    "trailer",
];

/// Trailer names declared by a response, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpTrailers {
    names: Vec<String>,
}

impl HttpTrailers {
    /// No declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a trailer. Declaring a name twice is a no-op.
    pub fn add(&mut self, name: &str) -> Result<&mut Self, HeaderError> {
        let lower = name.to_ascii_lowercase();
        if !is_token(name) || FORBIDDEN_TRAILERS.contains(&lower.as_str()) {
            return Err(HeaderError::InvalidTrailer(name.to_owned()));
        }
        if !self.has(name) {
            self.names.push(name.to_owned());
        }
        Ok(self)
    }

    /// Whether `name` was declared.
    pub fn has(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Withdraw a declaration.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| !n.eq_ignore_ascii_case(name));
        before != self.names.len()
    }

    /// Declared names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Withdraw every declaration.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Values for a fixed set of declared trailers.
///
/// Created by the write phase from the response's declarations; only those
/// names can be set. Clones share the same block.
#[derive(Debug, Clone)]
pub struct TrailerBlock {
    slots: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl TrailerBlock {
    /// A block with one empty slot per declared name.
    pub fn new(declared: &HttpTrailers) -> Self {
        Self {
            slots: Arc::new(Mutex::new(
                declared.names().iter().map(|n| (n.clone(), None)).collect(),
            )),
        }
    }

    /// Set the value of a declared trailer.
    pub fn set(&self, name: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        let value = value.into();
        if value.contains(['\r', '\n']) {
            return Err(HeaderError::InvalidValue(name.to_owned()));
        }
        let mut slots = self.slots.lock();
        let slot = slots
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| HeaderError::UndeclaredTrailer(name.to_owned()))?;
        slot.1 = Some(value);
        Ok(())
    }

    /// The value set for `name`, if any.
    pub fn get(&self, name: &str) -> Option<String> {
        self.slots
            .lock()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.clone())
    }

    /// Every declared name with its value; unset values are empty strings.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.slots
            .lock()
            .iter()
            .map(|(n, v)| (n.clone(), v.clone().unwrap_or_default()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_names_are_rejected() {
        let mut trailers = HttpTrailers::new();
        assert!(trailers.add("Content-Length").is_err());
        assert!(trailers.add("trailer").is_err());
        assert!(trailers.add("bad name").is_err());
        trailers.add("Server-Timing").unwrap().add("server-timing").unwrap();
        assert_eq!(trailers.len(), 1);
    }

    #[test]
    fn test_block_only_accepts_declared_names() {
        let mut trailers = HttpTrailers::new();
        trailers.add("x-checksum").unwrap();
        let block = TrailerBlock::new(&trailers);

        assert_eq!(
            block.set("x-other", "1").unwrap_err(),
            HeaderError::UndeclaredTrailer("x-other".into())
        );
        assert_eq!(block.to_pairs(), vec![(String::from("x-checksum"), String::new())]);
        block.set("X-Checksum", "abc").unwrap();
        assert_eq!(block.get("x-checksum").as_deref(), Some("abc"));
    }
}
