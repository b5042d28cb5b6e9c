//! Error types for the HTTP kernel.
//!
//! - [`HttpError`] - Failure carrying an HTTP status, turned into a response by the error phase
//! - [`StatusError`] - Status code outside `100..=999`
//! - [`HeaderError`] - Invalid header or trailer names and values
//! - [`RouteError`] - Route registration failures
//! - [`SerializeError`] - Response bodies that cannot be written
//! - [`BodyTypeError`] - Parsed request body of an unexpected type
//! - [`ConfigError`] - Invalid configuration
//! - [`KernelError`] - What a request future resolves to when finalization fails

use serde_json::Value;
use std::borrow::Cow;
use strata_core::SharedError;
use thiserror::Error;

/// Body attached to an [`HttpError`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// Plain text.
    Text(String),
    /// A structured value, serialized like any other JSON body.
    Json(Value),
}

/// An error that maps to an HTTP response.
///
/// The error phase uses [`status`](Self::status) (when it is a valid code)
/// and [`content`](Self::content), falling back to the status' reason
/// phrase when no content is given.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HttpError {
    status: u16,
    message: Cow<'static, str>,
    content: Option<ErrorBody>,
}

impl HttpError {
    /// An error with a status and a diagnostic message.
    pub fn new(status: u16, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            content: None,
        }
    }

    /// The error synthesized when no route matches.
    pub fn not_found() -> Self {
        Self::new(404, "Route not found.")
    }

    /// Respond with this body instead of the reason phrase.
    pub fn with_content(mut self, content: ErrorBody) -> Self {
        self.content = Some(content);
        self
    }

    /// The requested status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The response body, if one was given.
    pub fn content(&self) -> Option<&ErrorBody> {
        self.content.as_ref()
    }
}

/// A status code outside `100..=999`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("status code {0} is outside 100..=999")]
pub struct StatusError(pub u16);

/// Invalid header or trailer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// The name is empty or not an RFC 7230 token.
    #[error("header name `{0}` is invalid")]
    InvalidName(String),

    /// The value contains a line break.
    #[error("header `{0}` value must not contain CR or LF")]
    InvalidValue(String),

    /// The name is not allowed in a trailer section.
    #[error("trailer name `{0}` is invalid")]
    InvalidTrailer(String),

    /// A trailer value was set for a name that was never declared.
    #[error("trailer `{0}` was not declared")]
    UndeclaredTrailer(String),
}

/// Route registration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The same method and path were already registered.
    #[error("route {method} {path} conflicts with an existing route: {reason}")]
    Conflict {
        /// HTTP method.
        method: String,
        /// Route path.
        path: String,
        /// Router diagnostic.
        reason: String,
    },

    /// The path template could not be parsed.
    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath {
        /// Route path.
        path: String,
        /// Router diagnostic.
        reason: String,
    },
}

/// The response body could not be turned into wire bytes.
#[derive(Error, Debug)]
pub enum SerializeError {
    /// After serialization the body was still not text, bytes or a stream.
    #[error("response body can only be text, bytes or a stream")]
    InvalidBody,

    /// The default JSON serializer failed.
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// The parsed request body has a different type than requested.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("request body is not of type `{expected}`")]
pub struct BodyTypeError {
    /// The requested type name.
    pub expected: &'static str,
}

/// Invalid kernel configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `router.max_param_length` must be positive.
    #[error("router.max_param_length must be greater than zero")]
    ZeroParamLength,

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced to the host by a request future.
#[derive(Error, Debug, Clone)]
pub enum KernelError {
    /// The critical tier failed; no recovery layer remains.
    #[error("fatal kernel failure: {0}")]
    Fatal(#[source] SharedError),
}
