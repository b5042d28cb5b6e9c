//! # Emitter
//!
//! The dispatch engine. An [`Emitter`] owns a priority-ordered listener
//! registry and an optional non-owning link to the emitter it was derived
//! from (its *origin*). Emitting an event collects listeners along the origin
//! chain, root ancestor first, so listeners registered on a parent always run
//! before the child's own listeners for the same event.
//!
//! # Dispatch Rules
//!
//! - **Serial**: listeners run one at a time; `stopped` is checked before each.
//! - **Parallel**: listeners are started in order without waiting for each
//!   other. A listener that fails while starting prevents further starts, and
//!   listeners already started are always awaited.
//! - **Rejection**: with [`EventFlags::CAPTURE_REJECTION`](crate::EventFlags)
//!   a listener failure is re-emitted as an `error` event on the same emitter
//!   and the emission succeeds; otherwise the failure is returned.
//!
//! Registry locks are released before any listener runs.

use crate::{
    error::{BoxError, EmitError, SharedError},
    event::{Event, EventName, ListenerInfo, MetaEvent},
    listener::{DynListener, Listener, ListenerId, ListenerOptions, MetaListener},
    payload::Payload,
    registry::{Entry, ListenerRegistry},
};
use futures::future::{BoxFuture, join_all, ready};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak},
    task::Poll,
};

/// A node in the event propagation tree.
///
/// Cloning an emitter clones the handle; both clones share one registry.
pub struct Emitter<P: Payload> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: Payload> {
    registry: Mutex<ListenerRegistry<dyn DynListener<P>>>,
    meta: Mutex<ListenerRegistry<dyn MetaListener<P>>>,
    origin: Option<Weak<Inner<P>>>,
}

impl<P: Payload> Inner<P> {
    fn new(origin: Option<Weak<Inner<P>>>) -> Self {
        Self {
            registry: Mutex::new(ListenerRegistry::default()),
            meta: Mutex::new(ListenerRegistry::default()),
            origin,
        }
    }

    fn registry(&self) -> &Mutex<ListenerRegistry<dyn DynListener<P>>> {
        &self.registry
    }

    fn meta(&self) -> &Mutex<ListenerRegistry<dyn MetaListener<P>>> {
        &self.meta
    }

    fn count(&self, name: &EventName) -> usize {
        if name.is_meta() {
            self.meta.lock().count(name)
        } else {
            self.registry.lock().count(name)
        }
    }
}

type Select<P, L> = fn(&Inner<P>) -> &Mutex<ListenerRegistry<L>>;

/// A listener collected for one emission, with the emitter that owns it.
struct Scheduled<P: Payload, L: ?Sized> {
    entry: Entry<L>,
    owner: Arc<Inner<P>>,
    select: Select<P, L>,
}

impl<P: Payload, L: ?Sized> Scheduled<P, L> {
    /// Take a `once` entry out of its registry before it runs.
    ///
    /// Returns `false` if another emission already took it.
    fn claim(&self, name: &EventName) -> bool {
        !self.entry.options.once
            || (self.select)(&*self.owner)
                .lock()
                .remove(name, self.entry.id)
                .is_some()
    }
}

impl<P: Payload> Clone for Emitter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Payload> Default for Emitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> Emitter<P> {
    /// Create a root emitter.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(None)),
        }
    }

    /// Create an emitter whose origin is `self`.
    ///
    /// The child holds only a weak link; once every handle to `self` is
    /// dropped the child behaves like a root.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner::new(Some(Arc::downgrade(&self.inner)))),
        }
    }

    /// The emitter this one was derived from, if it is still alive.
    pub fn origin(&self) -> Option<Emitter<P>> {
        self.inner
            .origin
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Emitter { inner })
    }

    /// Returns `true` if both handles refer to the same emitter.
    pub fn ptr_eq(a: &Emitter<P>, b: &Emitter<P>) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Register a listener with default options.
    pub fn on<L: Listener<P>>(&self, name: impl Into<EventName>, listener: L) -> ListenerId {
        self.on_shared(name, Arc::new(listener), ListenerOptions::default())
    }

    /// Register a listener with explicit options.
    pub fn on_with<L: Listener<P>>(
        &self,
        name: impl Into<EventName>,
        listener: L,
        options: ListenerOptions,
    ) -> ListenerId {
        self.on_shared(name, Arc::new(listener), options)
    }

    /// Register a listener that is removed right before its first invocation.
    pub fn once<L: Listener<P>>(&self, name: impl Into<EventName>, listener: L) -> ListenerId {
        self.on_shared(name, Arc::new(listener), ListenerOptions::new().once())
    }

    /// Register an already shared listener.
    ///
    /// `newListener` is delivered before the listener is inserted, so a
    /// `newListener` listener never observes its own registration.
    ///
    /// Meta event names are not accepted here: their listeners must be
    /// synchronous and are registered with [`on_meta`](Self::on_meta). Such a
    /// registration is logged and ignored, and the returned handle matches nothing.
    pub fn on_shared(
        &self,
        name: impl Into<EventName>,
        listener: Arc<dyn DynListener<P>>,
        options: ListenerOptions,
    ) -> ListenerId {
        let name = name.into();
        let id = ListenerId::next();
        if name.is_meta() {
            tracing::error!(
                event = %name,
                "meta events only reach listeners registered with `on_meta`, registration ignored"
            );
            return id;
        }
        self.announce(MetaEvent::NewListener, &name, id, options);
        self.inner
            .registry
            .lock()
            .insert(name, id, listener, options);
        id
    }

    /// Register a synchronous listener for `newListener` or `removeListener`.
    pub fn on_meta<L: MetaListener<P>>(&self, name: MetaEvent, listener: L) -> ListenerId {
        self.on_meta_with(name, listener, ListenerOptions::default())
    }

    /// Register a synchronous meta event listener with explicit options.
    pub fn on_meta_with<L: MetaListener<P>>(
        &self,
        name: MetaEvent,
        listener: L,
        options: ListenerOptions,
    ) -> ListenerId {
        let name = EventName::from(name);
        let id = ListenerId::next();
        self.announce(MetaEvent::NewListener, &name, id, options);
        self.inner
            .meta
            .lock()
            .insert(name, id, Arc::new(listener), options);
        id
    }

    /// Remove one registration. Returns `false` if `id` is not registered for `name`.
    pub fn off(&self, name: impl Into<EventName>, id: ListenerId) -> bool {
        let name = name.into();
        let removed = if name.is_meta() {
            self.inner.meta.lock().remove(&name, id).map(|e| e.options)
        } else {
            self.inner.registry.lock().remove(&name, id).map(|e| e.options)
        };
        match removed {
            Some(options) => {
                self.announce(MetaEvent::RemoveListener, &name, id, options);
                true
            }
            None => false,
        }
    }

    /// Whether this exact listener is registered for `name` on this emitter.
    pub fn has_listener(
        &self,
        name: impl Into<EventName>,
        listener: &Arc<dyn DynListener<P>>,
    ) -> bool {
        self.inner.registry.lock().contains(&name.into(), listener)
    }

    /// Number of listeners an emission of `name` from this emitter would reach,
    /// counting every level of the origin chain.
    pub fn listener_count(&self, name: impl Into<EventName>) -> usize {
        let name = name.into();
        self.chain().iter().map(|node| node.count(&name)).sum()
    }

    /// Number of listeners registered for `name` on this emitter alone.
    pub fn own_listener_count(&self, name: impl Into<EventName>) -> usize {
        self.inner.count(&name.into())
    }

    /// Dispatch `event` to every listener registered for its name.
    ///
    /// A malformed event fails with [`EmitError::MalformedEvent`] before any
    /// listener runs.
    pub fn emit(&self, event: Event<P>) -> BoxFuture<'_, Result<(), EmitError>> {
        if let Some(reason) = event.malformation() {
            return Box::pin(ready(Err(EmitError::MalformedEvent {
                event: event.name().clone(),
                reason,
            })));
        }

        event.bind_target(self);
        let listeners = self.collect(event.name(), Inner::registry);

        Box::pin(async move {
            tracing::trace!(
                event = %event.name(),
                listeners = listeners.len(),
                serial = event.is_serial(),
                "emit"
            );

            let outcome = if event.is_serial() {
                dispatch_serial(&event, &listeners).await
            } else {
                dispatch_parallel(&event, &listeners).await
            };

            match outcome {
                Ok(()) => Ok(()),
                Err(err) => self.reject(&event, SharedError::from_box(err)).await,
            }
        })
    }

    async fn reject(&self, event: &Event<P>, error: SharedError) -> Result<(), EmitError> {
        if !event.captures_rejection() {
            return Err(EmitError::Listener {
                event: event.name().clone(),
                source: error,
            });
        }

        if self.listener_count(EventName::Error) == 0 {
            tracing::warn!(event = %event.name(), %error, "captured rejection has no `error` listener");
            return Ok(());
        }

        self.emit(Event::from_rejection(error)).await
    }

    /// Deliver a meta event to the synchronous meta listeners, serially.
    fn announce(
        &self,
        meta: MetaEvent,
        event: &EventName,
        id: ListenerId,
        options: ListenerOptions,
    ) {
        let name = EventName::from(meta);
        let listeners = self.collect(&name, Inner::meta);
        if listeners.is_empty() {
            return;
        }

        let info = ListenerInfo {
            event: event.clone(),
            id,
            options,
        };
        let announcement = match meta {
            MetaEvent::NewListener => Event::new_listener(info),
            MetaEvent::RemoveListener => Event::remove_listener(info),
        };
        announcement.bind_target(self);

        for scheduled in &listeners {
            if announcement.is_stopped() {
                break;
            }
            if !scheduled.claim(&name) {
                continue;
            }
            if let Err(err) = scheduled.entry.listener.on_meta(&announcement) {
                tracing::warn!(event = %name, error = %err, "meta event listener failed");
                break;
            }
        }
    }

    /// Self first, then each live ancestor.
    fn chain(&self) -> Vec<Arc<Inner<P>>> {
        let mut chain = vec![Arc::clone(&self.inner)];
        let mut cursor = self.inner.origin.as_ref().and_then(Weak::upgrade);
        while let Some(node) = cursor {
            cursor = node.origin.as_ref().and_then(Weak::upgrade);
            chain.push(node);
        }
        chain
    }

    /// Root ancestor's listeners first, down to this emitter's own.
    fn collect<L: ?Sized>(&self, name: &EventName, select: Select<P, L>) -> Vec<Scheduled<P, L>> {
        let mut scheduled = Vec::new();
        for owner in self.chain().into_iter().rev() {
            let entries = select(&*owner).lock().snapshot(name);
            scheduled.extend(entries.into_iter().map(|entry| Scheduled {
                entry,
                owner: Arc::clone(&owner),
                select,
            }));
        }
        scheduled
    }
}

async fn dispatch_serial<P: Payload>(
    event: &Event<P>,
    listeners: &[Scheduled<P, dyn DynListener<P>>],
) -> Result<(), BoxError> {
    for scheduled in listeners {
        if event.is_stopped() {
            tracing::trace!(event = %event.name(), "stopped");
            break;
        }
        if !scheduled.claim(event.name()) {
            continue;
        }
        scheduled.entry.listener.on_event_dyn(event).await?;
    }
    Ok(())
}

async fn dispatch_parallel<P: Payload>(
    event: &Event<P>,
    listeners: &[Scheduled<P, dyn DynListener<P>>],
) -> Result<(), BoxError> {
    let mut pending = Vec::new();
    let mut start_error = None;

    for scheduled in listeners {
        if event.is_stopped() {
            tracing::trace!(event = %event.name(), "stopped");
            break;
        }
        if !scheduled.claim(event.name()) {
            continue;
        }
        let mut fut = scheduled.entry.listener.on_event_dyn(event);
        match futures::poll!(&mut fut) {
            Poll::Ready(Ok(())) => {}
            Poll::Ready(Err(err)) => {
                start_error = Some(err);
                break;
            }
            Poll::Pending => pending.push(fut),
        }
    }

    let settled = join_all(pending).await;
    if let Some(err) = start_error {
        return Err(err);
    }
    settled.into_iter().collect()
}

impl<P: Payload> fmt::Debug for Emitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("has_origin", &self.inner.origin.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::Phase,
        listener::{from_fn, from_sync_fn},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Listener<()> {
        let log = Arc::clone(log);
        from_sync_fn(move |_: &Event<()>| log.lock().push(tag))
    }

    #[tokio::test]
    async fn test_serial_stop_skips_rest() {
        let emitter = Emitter::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on(Phase::Request, push(&log, "a"));
        emitter.on(Phase::Request, from_sync_fn(|event: &Event<()>| event.stop()));
        emitter.on(Phase::Request, push(&log, "c"));

        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_origin_listeners_run_first() {
        let root = Emitter::<()>::new();
        let child = root.child();
        let log = Arc::new(Mutex::new(Vec::new()));
        child.on_with(Phase::Response, push(&log, "child"), ListenerOptions::new().priority(100));
        root.on(Phase::Response, push(&log, "root"));

        child.emit(Event::new(Phase::Response, ())).await.unwrap();
        assert_eq!(*log.lock(), vec!["root", "child"]);
        assert_eq!(child.listener_count(Phase::Response), 2);
        assert_eq!(child.own_listener_count(Phase::Response), 1);
    }

    #[tokio::test]
    async fn test_dropped_origin_is_ignored() {
        let root = Emitter::<()>::new();
        let child = root.child();
        root.on(Phase::Request, from_sync_fn(|_: &Event<()>| ()));
        drop(root);

        assert!(child.origin().is_none());
        assert_eq!(child.listener_count(Phase::Request), 0);
    }

    #[tokio::test]
    async fn test_uncaptured_failure_propagates() {
        let emitter = Emitter::<()>::new();
        emitter.on(
            Phase::Request,
            from_fn(|_: Event<()>| async { Err::<(), BoxError>("boom".into()) }),
        );

        let err = emitter
            .emit(Event::new(Phase::Request, ()))
            .await
            .unwrap_err();
        assert!(matches!(err, EmitError::Listener { .. }));
        assert_eq!(err.into_shared().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_captured_failure_becomes_error_event() {
        let emitter = Emitter::<()>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        emitter.on(
            EventName::Error,
            from_sync_fn(move |event: &Event<()>| {
                assert_eq!(event.rejection().map(ToString::to_string).as_deref(), Some("boom"));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        emitter.on(
            Phase::Request,
            from_sync_fn(|_: &Event<()>| Err::<(), BoxError>("boom".into())),
        );

        let event = Event::builder(Phase::Request, ()).capture_rejection().build();
        emitter.emit(event).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_once_fires_once() {
        let emitter = Emitter::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.once(Phase::Finish, push(&log, "once"));

        emitter.emit(Event::new(Phase::Finish, ())).await.unwrap();
        emitter.emit(Event::new(Phase::Finish, ())).await.unwrap();
        assert_eq!(*log.lock(), vec!["once"]);
    }

    #[tokio::test]
    async fn test_once_survives_stopped_emission() {
        let emitter = Emitter::<()>::new();
        let first = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let gate = Arc::clone(&first);
        emitter.on(
            Phase::Request,
            from_sync_fn(move |event: &Event<()>| {
                if gate.swap(false, Ordering::SeqCst) {
                    event.stop();
                }
            }),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        emitter.once(
            Phase::Request,
            from_sync_fn(move |_: &Event<()>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.own_listener_count(Phase::Request), 2);

        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.own_listener_count(Phase::Request), 1);
    }

    #[tokio::test]
    async fn test_once_in_parallel_emission_after_stop() {
        let emitter = Emitter::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.on(Phase::Request, from_sync_fn(|event: &Event<()>| event.stop()));
        emitter.once(Phase::Request, push(&log, "once"));

        let parallel = || Event::builder(Phase::Request, ()).parallel().build();
        emitter.emit(parallel()).await.unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(emitter.own_listener_count(Phase::Request), 2);
    }

    #[test]
    fn test_meta_listeners_run_to_completion() {
        let root = Emitter::<()>::new();
        let child = root.child();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        root.on_meta(
            MetaEvent::NewListener,
            from_sync_fn(move |event: &Event<()>| {
                let info = event.listener_info().unwrap();
                log.lock().push(info.event.to_string());
            }),
        );

        child.on(Phase::Finish, from_sync_fn(|_: &Event<()>| ()));
        assert_eq!(*seen.lock(), vec!["kernel.finish"]);
        assert_eq!(child.listener_count(MetaEvent::NewListener), 1);
    }

    #[test]
    fn test_async_meta_listener_is_not_registered() {
        let emitter = Emitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = emitter.on(
            EventName::NewListener,
            from_fn(move |_: Event<()>| {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::task::yield_now().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        assert_eq!(emitter.own_listener_count(EventName::NewListener), 0);
        assert!(!emitter.off(EventName::NewListener, id));
        emitter.on(Phase::Request, from_sync_fn(|_: &Event<()>| ()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_once_meta_listener() {
        let emitter = Emitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = emitter.on_meta_with(
            MetaEvent::RemoveListener,
            from_sync_fn(move |_: &Event<()>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            ListenerOptions::new().once(),
        );

        let a = emitter.on(Phase::Request, from_sync_fn(|_: &Event<()>| ()));
        let b = emitter.on(Phase::Request, from_sync_fn(|_: &Event<()>| ()));
        assert!(emitter.off(Phase::Request, a));
        assert!(emitter.off(Phase::Request, b));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!emitter.off(MetaEvent::RemoveListener, id));
    }

    #[tokio::test]
    async fn test_off_removes_by_id() {
        let emitter = Emitter::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = emitter.on(Phase::Request, push(&log, "gone"));

        assert!(emitter.off(Phase::Request, id));
        assert!(!emitter.off(Phase::Request, id));
        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_target_is_emitting_emitter() {
        let emitter = Emitter::<()>::new();
        let expected = emitter.clone();
        emitter.on(
            Phase::Request,
            from_sync_fn(move |event: &Event<()>| {
                assert!(Emitter::ptr_eq(event.target().unwrap(), &expected));
            }),
        );
        emitter.emit(Event::new(Phase::Request, ())).await.unwrap();
    }
}
