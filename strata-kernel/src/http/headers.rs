//! Case-insensitive, insertion-ordered header map.

use crate::error::HeaderError;
use std::fmt;

/// Returns `true` if `name` is a non-empty RFC 7230 token.
pub(crate) fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'^' | b'_'
                        | b'`'
                        | b'-'
                        | b'!'
                        | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'.'
                        | b'|'
                        | b':'
                        | b'~'
                )
        })
}

fn check_value(name: &str, value: &str) -> Result<(), HeaderError> {
    if value.contains(['\r', '\n']) {
        return Err(HeaderError::InvalidValue(name.to_owned()));
    }
    Ok(())
}

/// Header fields keyed by lowercase name.
///
/// Names are validated on write and lowercased; iteration follows first
/// insertion order. A name may carry several values (`Set-Cookie`).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    fields: Vec<(String, Vec<String>)>,
}

impl HttpHeaders {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self, HeaderError> {
        self.set_all(name, [value.into()])
    }

    /// Replace every value of `name` with `values`.
    pub fn set_all<I>(&mut self, name: &str, values: I) -> Result<&mut Self, HeaderError>
    where
        I: IntoIterator<Item = String>,
    {
        if !is_token(name) {
            return Err(HeaderError::InvalidName(name.to_owned()));
        }
        let values: Vec<String> = values.into_iter().collect();
        for value in &values {
            check_value(name, value)?;
        }
        match self.position(name) {
            Some(at) => self.fields[at].1 = values,
            None => self.fields.push((name.to_ascii_lowercase(), values)),
        }
        Ok(self)
    }

    /// Add a value to `name`, keeping existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self, HeaderError> {
        if !is_token(name) {
            return Err(HeaderError::InvalidName(name.to_owned()));
        }
        let value = value.into();
        check_value(name, &value)?;
        match self.position(name) {
            Some(at) => self.fields[at].1.push(value),
            None => self.fields.push((name.to_ascii_lowercase(), vec![value])),
        }
        Ok(self)
    }

    /// The first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// The first value of `name`, or of `fallback` when `name` is absent.
    pub fn get_or(&self, name: &str, fallback: &str) -> Option<&str> {
        self.get(name).or_else(|| self.get(fallback))
    }

    /// Every value of `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map_or(&[][..], |at| self.fields[at].1.as_slice())
    }

    /// Whether `name` is present.
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove `name`. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(at) => {
                self.fields.remove(at);
                true
            }
            None => false,
        }
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Lowercase names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|(n, vs)| vs.iter().map(move |v| (n.as_str(), v.as_str())))
    }
}

impl fmt::Debug for HttpHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["content-type"]);
        assert!(headers.remove("CONTENT-TYPE"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_rejects_invalid_names_and_values() {
        let mut headers = HttpHeaders::new();
        assert_eq!(
            headers.set("bad header", "x").unwrap_err(),
            HeaderError::InvalidName("bad header".into())
        );
        assert!(headers.set("", "x").is_err());
        assert!(headers.set("x-split", "a\r\nb").is_err());
    }

    #[test]
    fn test_multi_values_and_fallback() {
        let mut headers = HttpHeaders::new();
        headers.append("set-cookie", "a=1").unwrap();
        headers.append("Set-Cookie", "b=2").unwrap();
        headers.set("host", "example.com").unwrap();
        assert_eq!(headers.get_all("set-cookie"), ["a=1", "b=2"]);
        assert_eq!(headers.get_or(":authority", "host"), Some("example.com"));
        assert_eq!(headers.iter().count(), 3);
    }
}
