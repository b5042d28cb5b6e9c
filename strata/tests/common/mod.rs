#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use strata::{
    Event, Kernel, KernelError, KernelEvent, KernelPayload, Listener, Payload, Phase, RawRequest,
    from_sync_fn, testing::MemoryTransport,
};

// ============================================================================
// Order Log
// ============================================================================

/// Shared log of tags, for asserting dispatch order.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, tag: impl Into<String>) {
        self.0.lock().unwrap().push(tag.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, tag: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|t| *t == tag).count()
    }
}

/// A listener appending `tag` to `log`.
pub fn tag<P: Payload>(log: &Log, tag: &'static str) -> impl Listener<P> {
    let log = log.clone();
    from_sync_fn(move |_: &Event<P>| log.push(tag))
}

// ============================================================================
// Kernel Helpers
// ============================================================================

/// The payload of a lifecycle event.
pub fn payload(event: &KernelEvent) -> &KernelPayload {
    event.payload().expect("lifecycle events carry a payload")
}

/// Log the name of every lifecycle phase emitted on the root.
///
/// PARSE and SERIALIZE are left out: listening to them changes what the
/// kernel does.
pub fn trace_phases(kernel: &Kernel) -> Log {
    let log = Log::default();
    for phase in Phase::ALL
        .into_iter()
        .filter(|phase| !matches!(phase, Phase::Parse | Phase::Serialize))
    {
        let log = log.clone();
        kernel.on(
            phase,
            from_sync_fn(move |event: &KernelEvent| log.push(event.name().as_str())),
        );
    }
    log
}

/// Run one request and hand back the transport.
pub async fn serve(
    kernel: &Kernel,
    request: RawRequest,
) -> (MemoryTransport, Result<(), KernelError>) {
    let transport = MemoryTransport::new();
    let result = kernel.handle(request, transport.boxed()).await;
    (transport, result)
}
