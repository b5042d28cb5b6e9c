//! # strata - Event-Driven HTTP Request Kernel
//!
//! `strata` drives every HTTP request through a fixed sequence of phases and
//! announces each one as an event. Listeners registered globally or per
//! route observe and shape the request and response; failures escalate
//! through the error, warning and critical tiers, and the response is
//! always finalized.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! let kernel = Arc::new(Kernel::new());
//! kernel.on(Phase::Request, from_sync_fn(|event: &KernelEvent| {
//!     event.payload().map(|p| p.response().set_header("x-powered-by", "strata"));
//! }));
//! kernel.route(Method::GET, "/hello/{name}", |ctx: HandlerContext| async move {
//!     let name = ctx.request().param("name").unwrap_or("world").to_owned();
//!     ctx.response().send(format!("hello {name}"));
//! })?;
//!
//! let serve = kernel.callback();
//! serve(raw_request, transport).await?;
//! ```
//!
//! The dispatch engine ([`Emitter`], [`Pipeline`], [`Features`]) has no HTTP
//! knowledge and can be used on its own.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use strata_core::{
    // Signals
    AbortController,
    AbortSignal,
    // Errors
    BoxError,
    // Events
    Detail,
    DynListener,
    DynStep,
    EmitError,
    // Emitter
    Emitter,
    Event,
    EventBuilder,
    EventFlags,
    EventName,
    // Features
    FeatureKey,
    Features,
    FnListener,
    FnStep,
    IntoOutcome,
    InvalidEventName,
    // Listener
    Listener,
    ListenerId,
    ListenerInfo,
    ListenerOptions,
    MetaEvent,
    MetaListener,
    Payload,
    Phase,
    // Pipeline
    Pipeline,
    PipelineOutcome,
    SharedError,
    Step,
    StopHandle,
    SyncFnListener,
    from_fn,
    from_sync_fn,
    step_fn,
};

pub use strata_kernel::{
    Body, BodyKind, BodyTypeError, ConfigError, DynHandler, ErrorBody, Handler, HandlerContext,
    HeaderError, HttpError, HttpHeaders, HttpRequest, HttpResponse, HttpTrailers, JsonSerializer,
    Kernel, KernelBuilder, KernelConfig, KernelEmitter, KernelError, KernelEvent, KernelPayload,
    MatchitRouter, Method, RawRequest, Route, RouteError, RouteMatch, RouteTable, Router, RouterOptions,
    SerializeError, Serializer, StatusError, TrailerBlock, Transport, Version, lifecycle_event,
};

/// HTTP message model.
pub mod http {
    pub use strata_kernel::http::{
        APPLICATION_JSON, Body, BodyKind, BodyStream, FORBIDDEN_TRAILERS, HttpHeaders, HttpRequest,
        HttpResponse, HttpTrailers, OCTET_STREAM, REQUEST_BODY, RESPONSE_BODY, TEXT_HTML,
        TEXT_PLAIN, TrailerBlock,
    };
}

/// Standard listener implementations.
pub mod listeners {
    #![allow(clippy::wildcard_imports)]
    pub use strata_kernel::listeners::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use strata_kernel::testing::*;
}

/// Prelude module - common imports for Strata.
///
/// # Usage
///
/// ```rust,ignore
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Body, BoxError, Emitter, Event, EventName, Features, Handler, HandlerContext, HttpError,
        HttpRequest, HttpResponse, Kernel, KernelConfig, KernelEvent, KernelPayload, Listener,
        ListenerOptions, Method, Phase, Pipeline, RawRequest, Step, Transport, from_fn, from_sync_fn,
    };
}
