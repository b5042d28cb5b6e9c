//! # strata-kernel
//!
//! The HTTP request lifecycle built on `strata-core`.
//!
//! A [`Kernel`] owns a root emitter and a route table. Every request runs
//! through the same fixed phases, each announced as a `kernel.*` event on
//! the matched route's emitter (or the root emitter when nothing matched):
//!
//! ```text
//! request → parse? → controller → handler → response
//!   → [error] → serialize? → write → trailers? → [warning] → finish → [critical]
//! ```
//!
//! Listeners observe and mutate the [`HttpRequest`] and [`HttpResponse`]
//! carried by the [`KernelPayload`]. Calling [`HttpResponse::send`]
//! completes the response early: the in-flight event stops and the rest of
//! the request stage is skipped.
//!
//! ## Collaborators
//!
//! - [`Router`]: path lookup, [`MatchitRouter`] by default
//! - [`Transport`]: the host's outgoing byte sink
//! - [`Serializer`]: JSON bodies to bytes, [`JsonSerializer`] by default
//!
//! # Error Types
//!
//! - [`HttpError`] - Handler failure carrying a status
//! - [`KernelError`] - Unrecoverable failure returned to the host
//! - [`HeaderError`], [`StatusError`], [`RouteError`] - Call-site validation

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod events;
mod handler;
pub mod http;
mod kernel;
pub mod listeners;
mod phases;
mod router;
mod serializer;
pub mod testing;
mod transport;

// Re-exports
pub use crate::http::{
    Body, BodyKind, HttpHeaders, HttpRequest, HttpResponse, HttpTrailers, TrailerBlock,
};
pub use ::http::{Method, Version};
pub use config::KernelConfig;
pub use context::Route;
pub use error::{
    BodyTypeError, ConfigError, ErrorBody, HeaderError, HttpError, KernelError, RouteError,
    SerializeError, StatusError,
};
pub use events::{KernelEmitter, KernelEvent, KernelPayload, lifecycle_event};
pub use handler::{DynHandler, Handler, HandlerContext};
pub use kernel::{Kernel, KernelBuilder, RouteTable};
pub use router::{MatchitRouter, RouteMatch, Router, RouterOptions};
pub use serializer::{JsonSerializer, Serializer};
pub use transport::{RawRequest, Transport};
