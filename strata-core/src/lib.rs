//! # strata-core
//!
//! The event dispatch engine behind the Strata HTTP request kernel.
//!
//! This crate knows nothing about HTTP. It provides the pieces the kernel
//! sequences a request with, and that plugins can target directly:
//!
//! ## Emitter ([`Emitter`])
//!
//! A listener registry with priority ordering, serial and parallel dispatch,
//! stop semantics and rejection capture. Emitters form a tree through a
//! non-owning *origin* link: an emission reaches the root ancestor's
//! listeners first and the emitting node's own listeners last.
//!
//! ## Events ([`Event`], [`EventName`])
//!
//! Events are created per emission. Names are a closed enum of lifecycle
//! phases and meta events, with [`EventName::Custom`] for everything else.
//!
//! ## Pipeline ([`Pipeline`])
//!
//! A restartable step runner that stops on request, on an aborted
//! [`AbortSignal`], or at the first failing step.
//!
//! ## Features ([`Features`])
//!
//! A per-request key-value side channel for data exchanged between phases.
//!
//! # Error Types
//!
//! - [`BoxError`] - What listeners and steps return
//! - [`SharedError`] - Cloneable error handle carried by events
//! - [`EmitError`] - Emission failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod emitter;
mod error;
mod event;
mod features;
mod listener;
mod payload;
mod pipeline;
mod registry;
mod signal;

// Re-exports
pub use emitter::Emitter;
pub use error::{BoxError, EmitError, InvalidEventName, SharedError};
pub use event::{
    Detail, Event, EventBuilder, EventFlags, EventName, ListenerInfo, MetaEvent, Phase,
};
pub use features::{FeatureKey, Features};
pub use listener::{
    DynListener, FnListener, IntoOutcome, Listener, ListenerId, ListenerOptions, MetaListener,
    SyncFnListener, from_fn, from_sync_fn,
};
pub use payload::Payload;
pub use pipeline::{DynStep, FnStep, Pipeline, PipelineOutcome, StopHandle, Step, step_fn};
pub use signal::{AbortController, AbortSignal};
