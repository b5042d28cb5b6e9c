//! # Kernel
//!
//! Owns the root emitter and the route table and drives each request
//! through the lifecycle phases.
//!
//! # Usage Patterns
//!
//! 1. **Global listeners**: `kernel.on(Phase::Request, listener)` runs for every request
//! 2. **Routes**: `kernel.route(Method::GET, "/users/{id}", handler)?` returns the
//!    route's emitter, whose listeners run after the global ones
//! 3. **Hosting**: `kernel.handle(raw, transport)` or the closure from [`Kernel::callback`]

use crate::{
    config::KernelConfig,
    context::{Context, Route},
    error::{ConfigError, KernelError, RouteError},
    events::{KernelEmitter, KernelPayload},
    handler::Handler,
    http::{HttpRequest, HttpResponse},
    phases,
    router::{MatchitRouter, Router},
    serializer::{JsonSerializer, Serializer},
    transport::{RawRequest, Transport},
};
use futures::{future::BoxFuture, lock::Mutex};
use http::Method;
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use strata_core::{AbortController, EventName, Features, Listener, ListenerId, ListenerOptions};
use tracing::Instrument;

/// The route table, as the kernel stores it.
pub type RouteTable = Box<dyn Router<Arc<Route>>>;

/// HTTP request kernel.
pub struct Kernel {
    root: KernelEmitter,
    router: RwLock<RouteTable>,
    serializer: Arc<dyn Serializer>,
    config: KernelConfig,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// A kernel with default configuration.
    pub fn new() -> Self {
        let config = KernelConfig::default();
        let router: RouteTable = Box::new(MatchitRouter::new(config.router.clone()));
        Self {
            root: KernelEmitter::new(),
            router: RwLock::new(router),
            serializer: Arc::new(JsonSerializer),
            config,
        }
    }

    /// A kernel with the given configuration.
    pub fn with_config(config: KernelConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    /// Start building a kernel.
    pub fn builder() -> KernelBuilder {
        KernelBuilder::default()
    }

    /// The active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The root emitter. Its listeners see every request.
    pub fn emitter(&self) -> &KernelEmitter {
        &self.root
    }

    /// Register a global listener.
    pub fn on<L: Listener<KernelPayload>>(&self, name: impl Into<EventName>, listener: L) -> ListenerId {
        self.root.on(name, listener)
    }

    /// Register a global listener with a priority or the `once` flag.
    pub fn on_with<L: Listener<KernelPayload>>(
        &self,
        name: impl Into<EventName>,
        listener: L,
        options: ListenerOptions,
    ) -> ListenerId {
        self.root.on_with(name, listener, options)
    }

    /// Remove a global listener.
    pub fn off(&self, name: impl Into<EventName>, id: ListenerId) -> bool {
        self.root.off(name, id)
    }

    /// Register `handler` for `method` and `path`.
    ///
    /// Returns the route's emitter: listeners added to it only see
    /// requests for this route, after the global listeners.
    pub fn route<H: Handler>(
        &self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<KernelEmitter, RouteError> {
        let target = self.root.child();
        let route = Arc::new(Route::new(target.clone(), Box::new(handler)));
        self.router.write().insert(&method, path, route)?;
        tracing::debug!(%method, path, "route registered");
        Ok(target)
    }

    /// Run one request to completion.
    ///
    /// The transport is always ended. The result is an error only when the
    /// critical tier itself failed.
    pub async fn handle(
        &self,
        raw: RawRequest,
        transport: Box<dyn Transport>,
    ) -> Result<(), KernelError> {
        let span = tracing::info_span!("request", method = %raw.method, path = %raw.url);
        self.dispatch(raw, transport).instrument(span).await
    }

    async fn dispatch(&self, raw: RawRequest, transport: Box<dyn Transport>) -> Result<(), KernelError> {
        let found = self.router.read().find(&raw.method, &raw.url);
        let (route, params) = match found {
            Some(found) => (Some(found.handler), found.params),
            None => (None, Vec::new()),
        };
        let target = route
            .as_ref()
            .map_or_else(|| self.root.clone(), |route| route.target().clone());

        let features = Features::new();
        let abort = AbortController::new();
        let ctx = Context {
            target,
            request: HttpRequest::new(raw, params, features.clone()),
            response: HttpResponse::new(abort.clone()),
            features,
            abort,
            route,
            transport: Mutex::new(transport),
            serializer: Arc::clone(&self.serializer),
            log_phases: self.config.log_phases,
        };
        phases::run(&ctx).await
    }

    /// A cloneable request callback for a host server.
    pub fn callback(
        self: &Arc<Self>,
    ) -> impl Fn(RawRequest, Box<dyn Transport>) -> BoxFuture<'static, Result<(), KernelError>>
    + Clone
    + Send
    + Sync
    + 'static {
        let kernel = Arc::clone(self);
        move |raw, transport| {
            let kernel = Arc::clone(&kernel);
            Box::pin(async move { kernel.handle(raw, transport).await })
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Kernel`].
#[derive(Default)]
pub struct KernelBuilder {
    config: KernelConfig,
    serializer: Option<Arc<dyn Serializer>>,
    router: Option<RouteTable>,
}

impl KernelBuilder {
    /// Use `config`.
    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Serialize JSON bodies with `serializer` when no `kernel.serialize`
    /// listener is registered.
    pub fn serializer<S: Serializer>(mut self, serializer: S) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Replace the default router. Its options are then its own;
    /// `config.router` is ignored.
    pub fn router<R: Router<Arc<Route>>>(mut self, router: R) -> Self {
        self.router = Some(Box::new(router));
        self
    }

    /// Validate the configuration and build the kernel.
    pub fn build(self) -> Result<Kernel, ConfigError> {
        self.config.validate()?;
        let router = self.router.unwrap_or_else(|| -> RouteTable {
            Box::new(MatchitRouter::new(self.config.router.clone()))
        });
        let serializer = self
            .serializer
            .unwrap_or_else(|| -> Arc<dyn Serializer> { Arc::new(JsonSerializer) });
        Ok(Kernel {
            root: KernelEmitter::new(),
            router: RwLock::new(router),
            serializer,
            config: self.config,
        })
    }
}

impl fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterOptions;

    #[test]
    fn test_route_conflict_is_reported() {
        let kernel = Kernel::new();
        kernel
            .route(Method::GET, "/a", |_: crate::HandlerContext| async {})
            .unwrap();
        assert!(matches!(
            kernel.route(Method::GET, "/a", |_: crate::HandlerContext| async {}),
            Err(RouteError::Conflict { .. })
        ));
    }

    #[test]
    fn test_route_emitter_is_child_of_root() {
        let kernel = Kernel::new();
        let route = kernel
            .route(Method::GET, "/a", |_: crate::HandlerContext| async {})
            .unwrap();
        let origin = route.origin().unwrap();
        assert!(KernelEmitter::ptr_eq(&origin, kernel.emitter()));
    }

    #[test]
    fn test_builder_validates_config() {
        let config = KernelConfig::new().router(RouterOptions::new().max_param_length(0));
        assert!(Kernel::with_config(config).is_err());
    }
}
