//! Per-request state threaded through the lifecycle phases.

use crate::{
    events::{KernelEmitter, KernelPayload},
    handler::{DynHandler, HandlerContext},
    http::{HttpRequest, HttpResponse},
    serializer::Serializer,
    transport::Transport,
};
use futures::lock::Mutex;
use std::{fmt, sync::Arc};
use strata_core::{AbortController, Features};

/// A registered route: its handler and the emitter its listeners live on.
///
/// Route emitters are children of the kernel's root emitter, so global
/// listeners run before route-local ones.
pub struct Route {
    target: KernelEmitter,
    handler: Box<dyn DynHandler>,
}

impl Route {
    pub(crate) fn new(target: KernelEmitter, handler: Box<dyn DynHandler>) -> Self {
        Self { target, handler }
    }

    /// The route's emitter.
    pub fn target(&self) -> &KernelEmitter {
        &self.target
    }

    pub(crate) fn handler(&self) -> &dyn DynHandler {
        &*self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Everything one request owns.
pub(crate) struct Context {
    /// The route's emitter, or the root emitter when nothing matched.
    pub target: KernelEmitter,
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub features: Features,
    pub abort: AbortController,
    pub route: Option<Arc<Route>>,
    pub transport: Mutex<Box<dyn Transport>>,
    pub serializer: Arc<dyn Serializer>,
    pub log_phases: bool,
}

impl Context {
    pub fn payload(&self) -> KernelPayload {
        KernelPayload::new(
            self.request.clone(),
            self.response.clone(),
            self.features.clone(),
        )
    }

    pub fn handler_context(&self) -> HandlerContext {
        HandlerContext::new(
            self.target.clone(),
            self.request.clone(),
            self.response.clone(),
            self.features.clone(),
        )
    }
}
