//! Error types for Strata.
//!
//! This module provides the error vocabulary of the dispatch engine using `thiserror`:
//!
//! - [`BoxError`] - Type-erased error returned by listeners and pipeline steps
//! - [`SharedError`] - Cloneable wrapper so one failure can travel through several events
//! - [`EmitError`] - Errors surfaced by [`Emitter::emit`](crate::Emitter::emit)
//! - [`InvalidEventName`] - Rejected custom event names

use crate::event::EventName;
use std::{error::Error, fmt, sync::Arc};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A reference-counted error that can be cloned into several events.
///
/// Wrapping an already shared error does not nest it: [`SharedError::from_box`]
/// recognizes a boxed `SharedError` and returns the original handle.
#[derive(Clone)]
pub struct SharedError(Arc<dyn Error + Send + Sync + 'static>);

impl SharedError {
    /// Wrap any error.
    pub fn new<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_box(Box::new(err))
    }

    /// Wrap a boxed error, unwrapping it first if it already is a `SharedError`.
    pub fn from_box(err: BoxError) -> Self {
        match err.downcast::<SharedError>() {
            Ok(shared) => *shared,
            Err(other) => Self(Arc::from(other)),
        }
    }

    /// Create a shared error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::from_box(message.into())
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempt to downcast the wrapped error, looking through nested `SharedError`s.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        let inner: &(dyn Error + 'static) = &*self.0;
        inner
            .downcast_ref::<T>()
            .or_else(|| inner.downcast_ref::<SharedError>()?.downcast_ref::<T>())
    }

    /// Returns `true` if both handles point at the same underlying error.
    pub fn ptr_eq(a: &SharedError, b: &SharedError) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.0), Arc::as_ptr(&b.0))
    }

    /// Convert back into a [`BoxError`] without losing identity.
    pub fn into_box(self) -> BoxError {
        Box::new(self)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl Error for SharedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl From<BoxError> for SharedError {
    fn from(err: BoxError) -> Self {
        SharedError::from_box(err)
    }
}

/// Errors that can occur while emitting an event.
#[derive(Error, Debug, Clone)]
pub enum EmitError {
    /// The event detail does not match its name. Raised before any listener runs.
    #[error("malformed `{event}` event: {reason}")]
    MalformedEvent {
        /// Name of the rejected event.
        event: EventName,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A listener failed and the event does not capture rejections.
    #[error("listener for `{event}` failed: {source}")]
    Listener {
        /// Name of the event being dispatched.
        event: EventName,
        /// The listener's error.
        #[source]
        source: SharedError,
    },
}

impl EmitError {
    /// Returns the underlying failure.
    ///
    /// For listener failures this is the listener's own error, so callers that
    /// inspect error types (status codes, custom payloads) see what the listener returned.
    pub fn into_shared(self) -> SharedError {
        match self {
            EmitError::Listener { source, .. } => source,
            malformed @ EmitError::MalformedEvent { .. } => SharedError::new(malformed),
        }
    }

    /// Like [`into_shared`](Self::into_shared), boxed.
    pub fn into_box(self) -> BoxError {
        self.into_shared().into_box()
    }
}

/// A custom event name was empty or collided with a reserved name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid event name `{name}`: {reason}")]
pub struct InvalidEventName {
    /// The rejected name.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("teapot")]
    struct Teapot;

    #[test]
    fn test_shared_error_does_not_nest() {
        let shared = SharedError::new(Teapot);
        let again = SharedError::from_box(shared.clone().into_box());
        assert!(SharedError::ptr_eq(&shared, &again));
        assert!(again.downcast_ref::<Teapot>().is_some());
    }

    #[test]
    fn test_emit_error_exposes_listener_error() {
        let err = EmitError::Listener {
            event: EventName::Error,
            source: SharedError::new(Teapot),
        };
        assert_eq!(err.into_shared().to_string(), "teapot");
    }
}
