//! # Listeners
//!
//! A listener is invoked with every event emitted under the name it was
//! registered for. Returning `Err` rejects the emission; what happens next
//! depends on the event's [`EventFlags`](crate::EventFlags).
//!
//! # Usage Patterns
//!
//! 1. **Async closure**: `from_fn(|event| async move { ... })`
//! 2. **Sync closure**: `from_sync_fn(|event| { ... })`, completes without suspending
//! 3. **Struct implementation**: `impl Listener<MyPayload> for MyListener`

use crate::{error::BoxError, event::Event, payload::Payload};
use futures::future::{BoxFuture, ready};
use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

/// Opaque handle identifying one registration.
///
/// Registering the same listener twice yields two handles; removal by handle
/// removes exactly one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Registration options.
///
/// Higher priorities run first; equal priorities keep registration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Ordering key, higher first. Defaults to `0`.
    pub priority: i32,
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    /// Default options: priority `0`, persistent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Remove the listener after it fires once.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Conversion of a listener's return value into the dispatch outcome.
///
/// - `()` → success
/// - `Result<T, E>` → delegates to `T`, or propagates `E` as a [`BoxError`]
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be returned from a listener",
    label = "listeners must return `()` or a `Result`",
    note = "Return `Ok(())` or an error convertible into `BoxError`."
)]
pub trait IntoOutcome {
    /// Convert into the dispatch outcome.
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> {
        match self {
            Ok(t) => t.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}

/// A subscriber to events carrying payload `P`.
///
/// This trait uses native `async fn` for static dispatch. Emitters store
/// listeners as [`DynListener`] trait objects; every `Listener` is one.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Listener<{P}>`",
    label = "missing `Listener` implementation",
    note = "Listeners must implement `on_event` for events carrying `{P}`."
)]
pub trait Listener<P: Payload>: Send + Sync + 'static {
    /// Called for every event this listener is registered for.
    fn on_event(&self, event: &Event<P>) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Object-safe version of [`Listener`].
pub trait DynListener<P: Payload>: Send + Sync + 'static {
    /// Called for every event this listener is registered for (dynamic dispatch version).
    fn on_event_dyn<'a>(&'a self, event: &'a Event<P>) -> BoxFuture<'a, Result<(), BoxError>>;
}

impl<P: Payload, T: Listener<P>> DynListener<P> for T {
    fn on_event_dyn<'a>(&'a self, event: &'a Event<P>) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(self.on_event(event))
    }
}

/// A synchronous subscriber to `newListener` / `removeListener`.
///
/// Meta events are delivered from inside `on` and `off`, which do not
/// suspend, so a meta listener must finish its work before returning.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot receive meta events",
    label = "meta listeners must be synchronous",
    note = "Use `from_sync_fn`, or implement `MetaListener` for a type that completes without awaiting."
)]
pub trait MetaListener<P: Payload>: Send + Sync + 'static {
    /// Called for every meta event this listener is registered for.
    fn on_meta(&self, event: &Event<P>) -> Result<(), BoxError>;
}

/// Listener backed by an async closure receiving an owned event handle.
#[derive(Clone)]
pub struct FnListener<F> {
    f: F,
}

/// Create a listener from an async closure.
///
/// ```rust,ignore
/// emitter.on(Phase::Request, from_fn(|event: Event<MyPayload>| async move {
///     event.stop();
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnListener<F> {
    FnListener { f }
}

impl<P, F, Fut, R> Listener<P> for FnListener<F>
where
    P: Payload,
    F: Fn(Event<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send,
    R: IntoOutcome,
{
    fn on_event(&self, event: &Event<P>) -> impl Future<Output = Result<(), BoxError>> + Send {
        let fut = (self.f)(event.clone());
        async move { fut.await.into_outcome() }
    }
}

/// Listener backed by a synchronous closure.
///
/// Its future is ready on first poll, so in parallel emissions a failure
/// counts as failing at start.
#[derive(Clone)]
pub struct SyncFnListener<F> {
    f: F,
}

/// Create a listener from a synchronous closure.
pub fn from_sync_fn<F>(f: F) -> SyncFnListener<F> {
    SyncFnListener { f }
}

impl<P, F, R> Listener<P> for SyncFnListener<F>
where
    P: Payload,
    F: Fn(&Event<P>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn on_event(&self, event: &Event<P>) -> impl Future<Output = Result<(), BoxError>> + Send {
        ready((self.f)(event).into_outcome())
    }
}

impl<P, F, R> MetaListener<P> for SyncFnListener<F>
where
    P: Payload,
    F: Fn(&Event<P>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn on_meta(&self, event: &Event<P>) -> Result<(), BoxError> {
        (self.f)(event).into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Phase;

    #[derive(Debug, thiserror::Error)]
    #[error("nope")]
    struct Nope;

    #[derive(Debug, PartialEq)]
    struct Tick(u64);

    impl Payload for Tick {}

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ListenerId::next(), ListenerId::next());
    }

    #[test]
    fn test_into_outcome() {
        assert!(().into_outcome().is_ok());
        assert!(Ok::<(), Nope>(()).into_outcome().is_ok());
        assert_eq!(
            Err::<(), Nope>(Nope).into_outcome().unwrap_err().to_string(),
            "nope"
        );
    }

    #[tokio::test]
    async fn test_closures_are_listeners() {
        let event = Event::new(Phase::Request, Tick(7));
        let sync = from_sync_fn(|event: &Event<Tick>| {
            assert_eq!(event.payload(), Some(&Tick(7)));
        });
        sync.on_event(&event).await.unwrap();

        let failing = from_fn(|_event: Event<Tick>| async { Err::<(), _>(Nope) });
        assert!(failing.on_event_dyn(&event).await.is_err());
    }
}
