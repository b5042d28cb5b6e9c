//! # Route Handlers
//!
//! The terminal point of a request: the work registered with
//! [`Kernel::route`](crate::Kernel::route). A handler runs after every
//! `kernel.controller` listener, unless one of them completed the response.
//!
//! # Usage Patterns
//!
//! 1. **Direct closure**: `|ctx: HandlerContext| async move { ctx.response().send("hi"); }`
//! 2. **Struct implementation**: `impl Handler for MyHandler`
//!
//! Handlers may return `()` or any `Result<(), E>` with `E: Into<BoxError>`.
//! A failure is routed to the error phase; an [`HttpError`](crate::HttpError)
//! chooses the response status.

use crate::{
    events::KernelEmitter,
    http::{HttpRequest, HttpResponse},
};
use futures::future::BoxFuture;
use std::future::Future;
use strata_core::{BoxError, Features, IntoOutcome};

/// What a handler receives.
#[derive(Clone, Debug)]
pub struct HandlerContext {
    target: KernelEmitter,
    request: HttpRequest,
    response: HttpResponse,
    features: Features,
}

impl HandlerContext {
    pub(crate) fn new(
        target: KernelEmitter,
        request: HttpRequest,
        response: HttpResponse,
        features: Features,
    ) -> Self {
        Self {
            target,
            request,
            response,
            features,
        }
    }

    /// The route's emitter.
    pub fn target(&self) -> &KernelEmitter {
        &self.target
    }

    /// The request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The response.
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// The request's feature bag.
    pub fn features(&self) -> &Features {
        &self.features
    }
}

/// The endpoint of a route.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle requests",
    label = "missing `Handler` implementation",
    note = "Handlers are closures `Fn(HandlerContext) -> impl Future` or types implementing `Handler`."
)]
pub trait Handler: Send + Sync + 'static {
    /// Usually `()` or `Result<(), E>`.
    type Output: IntoOutcome + Send;

    /// Handle one request.
    fn call(&self, ctx: HandlerContext) -> impl Future<Output = Self::Output> + Send;
}

/// Object-safe version of [`Handler`].
pub trait DynHandler: Send + Sync + 'static {
    /// Handle one request (dynamic dispatch version).
    fn call_dyn(&self, ctx: HandlerContext) -> BoxFuture<'_, Result<(), BoxError>>;
}

impl<T: Handler> DynHandler for T {
    fn call_dyn(&self, ctx: HandlerContext) -> BoxFuture<'_, Result<(), BoxError>> {
        Box::pin(async move { self.call(ctx).await.into_outcome() })
    }
}

impl<F, Fut> Handler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future + Send,
    Fut::Output: IntoOutcome + Send,
{
    type Output = Fut::Output;

    fn call(&self, ctx: HandlerContext) -> impl Future<Output = Self::Output> + Send {
        (self)(ctx)
    }
}
