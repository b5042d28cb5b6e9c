//! # Events
//!
//! An [`Event`] is the value handed to every listener of one emission. It
//! carries a closed [`EventName`], dispatch [`EventFlags`], a stop flag that
//! listeners may set, and a [`Detail`]: the payload for lifecycle and custom
//! events, or a structured record for the emitter's own meta events.
//!
//! Events are created fresh per emission and are cheap to clone; clones share
//! the stop flag, so a listener holding a clone can still stop propagation.

use crate::{
    emitter::Emitter,
    error::{InvalidEventName, SharedError},
    listener::{ListenerId, ListenerOptions},
    payload::Payload,
    signal::AbortSignal,
};
use std::{
    borrow::Cow,
    fmt,
    str::FromStr,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

/// One stage of the fixed request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// `kernel.request`: first phase, before routing is validated.
    Request,
    /// `kernel.parse`: request body parsing, only when a listener exists.
    Parse,
    /// `kernel.controller`: right before the route handler runs.
    Controller,
    /// `kernel.response`: after the handler, before the response is prepared.
    Response,
    /// `kernel.serialize`: turns a structured body into wire bytes.
    Serialize,
    /// `kernel.trailers`: fills declared trailer values.
    Trailers,
    /// `kernel.error`: handler and listener failures.
    Error,
    /// `kernel.warning`: failures while writing the response.
    Warning,
    /// `kernel.critical`: failures of the warning and finish tiers.
    Critical,
    /// `kernel.finish`: after the transport has completed.
    Finish,
}

impl Phase {
    /// Every lifecycle phase, in declaration order.
    pub const ALL: [Phase; 10] = [
        Phase::Request,
        Phase::Parse,
        Phase::Controller,
        Phase::Response,
        Phase::Serialize,
        Phase::Trailers,
        Phase::Error,
        Phase::Warning,
        Phase::Critical,
        Phase::Finish,
    ];

    /// The wire name of the phase event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Request => "kernel.request",
            Phase::Parse => "kernel.parse",
            Phase::Controller => "kernel.controller",
            Phase::Response => "kernel.response",
            Phase::Serialize => "kernel.serialize",
            Phase::Trailers => "kernel.trailers",
            Phase::Error => "kernel.error",
            Phase::Warning => "kernel.warning",
            Phase::Critical => "kernel.critical",
            Phase::Finish => "kernel.finish",
        }
    }

    /// Whether completing the response stops this phase's event.
    ///
    /// Trailers, finish, warning and critical must always run.
    pub const fn is_stoppable(self) -> bool {
        !matches!(
            self,
            Phase::Trailers | Phase::Finish | Phase::Warning | Phase::Critical
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The name an event is dispatched under.
///
/// Lifecycle names and the emitter's meta events are closed variants;
/// [`EventName::Custom`] is the escape hatch for user-defined events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// A lifecycle phase event (`kernel.*`).
    Kernel(Phase),
    /// `newListener`: a listener is about to be registered.
    NewListener,
    /// `removeListener`: a listener was removed.
    RemoveListener,
    /// `error`: a captured listener rejection.
    Error,
    /// A user-defined event.
    Custom(Cow<'static, str>),
}

impl EventName {
    /// Create a custom event name.
    ///
    /// Empty names and names reserved for the lifecycle or the meta events
    /// are rejected.
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Result<Self, InvalidEventName> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.starts_with("kernel.") {
            Some("the `kernel.` namespace is reserved for lifecycle events")
        } else if matches!(name.as_ref(), "error" | "newListener" | "removeListener") {
            Some("name is reserved for emitter meta events")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidEventName {
                name: name.into_owned(),
                reason,
            }),
            None => Ok(EventName::Custom(name)),
        }
    }

    /// The wire name.
    pub fn as_str(&self) -> &str {
        match self {
            EventName::Kernel(phase) => phase.as_str(),
            EventName::NewListener => "newListener",
            EventName::RemoveListener => "removeListener",
            EventName::Error => "error",
            EventName::Custom(name) => name,
        }
    }

    /// Whether this is `newListener` or `removeListener`.
    pub fn is_meta(&self) -> bool {
        matches!(self, EventName::NewListener | EventName::RemoveListener)
    }

    /// Returns the lifecycle phase, if this is a `kernel.*` name.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            EventName::Kernel(phase) => Some(*phase),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Phase> for EventName {
    fn from(phase: Phase) -> Self {
        EventName::Kernel(phase)
    }
}

impl From<MetaEvent> for EventName {
    fn from(meta: MetaEvent) -> Self {
        match meta {
            MetaEvent::NewListener => EventName::NewListener,
            MetaEvent::RemoveListener => EventName::RemoveListener,
        }
    }
}

impl From<&EventName> for EventName {
    fn from(name: &EventName) -> Self {
        name.clone()
    }
}

impl FromStr for EventName {
    type Err = InvalidEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(phase) = Phase::ALL.into_iter().find(|p| p.as_str() == s) {
            return Ok(EventName::Kernel(phase));
        }
        match s {
            "newListener" => Ok(EventName::NewListener),
            "removeListener" => Ok(EventName::RemoveListener),
            "error" => Ok(EventName::Error),
            other => EventName::custom(other.to_owned()),
        }
    }
}

/// The registration events an emitter announces.
///
/// They are delivered synchronously from `on` and `off`, so they have their
/// own registration path: see [`Emitter::on_meta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaEvent {
    /// `newListener`
    NewListener,
    /// `removeListener`
    RemoveListener,
}

bitflags::bitflags! {
    /// Dispatch discipline of one emission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u8 {
        /// Invoke listeners one at a time, in order. Without it listeners are started concurrently.
        const SERIAL = 0b001;
        /// Convert listener failures into an `error` event instead of failing the emission.
        const CAPTURE_REJECTION = 0b010;
        /// Ignore stop requests and abort signals; every listener runs.
        const UNSTOPPABLE = 0b100;
    }
}

/// Registration record delivered with `newListener` and `removeListener`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    /// The event the listener is (or was) registered for.
    pub event: EventName,
    /// The registration handle.
    pub id: ListenerId,
    /// The options it was registered with.
    pub options: ListenerOptions,
}

/// What an event carries besides its name and flags.
#[derive(Debug, Clone)]
pub enum Detail<P> {
    /// Data of a lifecycle or custom event.
    Payload(P),
    /// Registration record of a `newListener` / `removeListener` event.
    Listener(ListenerInfo),
    /// The failure carried by an `error` event.
    Rejection(SharedError),
}

/// An event travelling through one emission.
pub struct Event<P: Payload> {
    inner: Arc<EventInner<P>>,
}

struct EventInner<P: Payload> {
    name: EventName,
    flags: EventFlags,
    stopped: AtomicBool,
    signal: Option<AbortSignal>,
    target: OnceLock<Emitter<P>>,
    detail: Detail<P>,
}

impl<P: Payload> Clone for Event<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Payload> Event<P> {
    /// Create a serial event carrying `payload`.
    pub fn new(name: impl Into<EventName>, payload: P) -> Self {
        EventBuilder::new(name, Detail::Payload(payload)).build()
    }

    /// Start building an event carrying `payload`.
    pub fn builder(name: impl Into<EventName>, payload: P) -> EventBuilder<P> {
        EventBuilder::new(name, Detail::Payload(payload))
    }

    pub(crate) fn new_listener(info: ListenerInfo) -> Self {
        EventBuilder::new(EventName::NewListener, Detail::Listener(info)).build()
    }

    pub(crate) fn remove_listener(info: ListenerInfo) -> Self {
        EventBuilder::new(EventName::RemoveListener, Detail::Listener(info)).build()
    }

    pub(crate) fn from_rejection(error: SharedError) -> Self {
        EventBuilder::new(EventName::Error, Detail::Rejection(error)).build()
    }

    /// The event name.
    pub fn name(&self) -> &EventName {
        &self.inner.name
    }

    /// The dispatch flags.
    pub fn flags(&self) -> EventFlags {
        self.inner.flags
    }

    /// Whether listeners run one at a time.
    pub fn is_serial(&self) -> bool {
        self.inner.flags.contains(EventFlags::SERIAL)
    }

    /// Whether listener failures are converted into an `error` event.
    pub fn captures_rejection(&self) -> bool {
        self.inner.flags.contains(EventFlags::CAPTURE_REJECTION)
    }

    /// Whether propagation was stopped, by [`stop`](Self::stop) or by the bound abort signal.
    ///
    /// Always `false` for events flagged [`EventFlags::UNSTOPPABLE`].
    pub fn is_stopped(&self) -> bool {
        if self.inner.flags.contains(EventFlags::UNSTOPPABLE) {
            return false;
        }
        self.inner.stopped.load(Ordering::Acquire)
            || self
                .inner
                .signal
                .as_ref()
                .is_some_and(AbortSignal::is_aborted)
    }

    /// Stop propagation to listeners that have not been invoked (serial) or started (parallel) yet.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
    }

    /// The abort signal this event is bound to, if any.
    pub fn signal(&self) -> Option<&AbortSignal> {
        self.inner.signal.as_ref()
    }

    /// The emitter that dispatched this event. `None` before the first emission.
    pub fn target(&self) -> Option<&Emitter<P>> {
        self.inner.target.get()
    }

    /// The event detail.
    pub fn detail(&self) -> &Detail<P> {
        &self.inner.detail
    }

    /// The payload of a lifecycle or custom event.
    pub fn payload(&self) -> Option<&P> {
        match &self.inner.detail {
            Detail::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    /// The registration record of a meta event.
    pub fn listener_info(&self) -> Option<&ListenerInfo> {
        match &self.inner.detail {
            Detail::Listener(info) => Some(info),
            _ => None,
        }
    }

    /// The failure carried by an `error` event.
    pub fn rejection(&self) -> Option<&SharedError> {
        match &self.inner.detail {
            Detail::Rejection(error) => Some(error),
            _ => None,
        }
    }

    pub(crate) fn bind_target(&self, target: &Emitter<P>) {
        // First emitter wins; re-emitting an event keeps its original target.
        let _ = self.inner.target.set(target.clone());
    }

    /// Checks that the detail matches the name.
    pub(crate) fn malformation(&self) -> Option<&'static str> {
        match (&self.inner.name, &self.inner.detail) {
            (EventName::NewListener | EventName::RemoveListener, Detail::Listener(_)) => None,
            (EventName::NewListener | EventName::RemoveListener, _) => {
                Some("listener meta events must carry a listener record")
            }
            (EventName::Error, Detail::Rejection(_)) => None,
            (EventName::Error, _) => Some("`error` events must carry the captured failure"),
            (_, Detail::Payload(_)) => None,
            (_, _) => Some("lifecycle and custom events must carry a payload"),
        }
    }
}

impl<P: Payload> fmt::Debug for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("flags", &self.inner.flags)
            .field("stopped", &self.inner.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Event`].
///
/// Events are serial unless [`parallel`](Self::parallel) is called.
pub struct EventBuilder<P> {
    name: EventName,
    flags: EventFlags,
    signal: Option<AbortSignal>,
    detail: Detail<P>,
}

impl<P: Payload> EventBuilder<P> {
    /// Start building an event with an explicit detail.
    pub fn new(name: impl Into<EventName>, detail: Detail<P>) -> Self {
        Self {
            name: name.into(),
            flags: EventFlags::SERIAL,
            signal: None,
            detail,
        }
    }

    /// Dispatch listeners one at a time.
    pub fn serial(mut self) -> Self {
        self.flags.insert(EventFlags::SERIAL);
        self
    }

    /// Start all listeners without waiting for each other.
    pub fn parallel(mut self) -> Self {
        self.flags.remove(EventFlags::SERIAL);
        self
    }

    /// Convert listener failures into an `error` event.
    pub fn capture_rejection(mut self) -> Self {
        self.flags.insert(EventFlags::CAPTURE_REJECTION);
        self
    }

    /// Ignore stop requests and abort signals.
    pub fn unstoppable(mut self) -> Self {
        self.flags.insert(EventFlags::UNSTOPPABLE);
        self
    }

    /// Replace all flags.
    pub fn flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Derive the stopped state from an abort signal.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Build the event.
    pub fn build(self) -> Event<P> {
        Event {
            inner: Arc::new(EventInner {
                name: self.name,
                flags: self.flags,
                stopped: AtomicBool::new(false),
                signal: self.signal,
                target: OnceLock::new(),
                detail: self.detail,
            }),
        }
    }
}
