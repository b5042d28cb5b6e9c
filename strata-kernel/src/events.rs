//! Lifecycle payload and event constructors.
//!
//! Every `kernel.*` event carries a [`KernelPayload`]: handles to the
//! request, the response and the feature bag, plus the failure for the
//! error tiers and the trailer block for `kernel.trailers`.

use crate::http::{Body, HttpRequest, HttpResponse, REQUEST_BODY, RESPONSE_BODY, TrailerBlock};
use parking_lot::Mutex;
use std::any::Any;
use strata_core::{AbortSignal, Emitter, Event, Features, Payload, Phase, SharedError};

/// Event carrying a [`KernelPayload`].
pub type KernelEvent = Event<KernelPayload>;

/// Emitter dispatching [`KernelEvent`]s.
pub type KernelEmitter = Emitter<KernelPayload>;

/// Holder for a body in the feature bag.
struct BodyCell(Mutex<Option<Body>>);

/// What lifecycle listeners receive.
#[derive(Clone, Debug)]
pub struct KernelPayload {
    request: HttpRequest,
    response: HttpResponse,
    features: Features,
    error: Option<SharedError>,
    trailers: Option<TrailerBlock>,
}

impl Payload for KernelPayload {}

impl KernelPayload {
    /// A payload without failure or trailers.
    pub fn new(request: HttpRequest, response: HttpResponse, features: Features) -> Self {
        Self {
            request,
            response,
            features,
            error: None,
            trailers: None,
        }
    }

    /// Attach the failure reported by the error, warning or critical tier.
    pub fn with_error(mut self, error: SharedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach the trailer block for `kernel.trailers`.
    pub fn with_trailers(mut self, trailers: TrailerBlock) -> Self {
        self.trailers = Some(trailers);
        self
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

    /// The failure being reported, for `kernel.error`, `kernel.warning` and `kernel.critical`.
    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    /// The values to fill, for `kernel.trailers`.
    pub fn trailers(&self) -> Option<&TrailerBlock> {
        self.trailers.as_ref()
    }

    /// The parsed request body stored by a `kernel.parse` listener.
    pub fn parsed_body<T: Any + Clone>(&self) -> Option<T> {
        self.features.get(REQUEST_BODY)
    }

    /// Store the parsed request body (`kernel.parse`).
    pub fn set_parsed_body<T: Any + Send + Sync>(&self, body: T) {
        self.features.set(REQUEST_BODY, body);
    }

    /// Store the wire body produced by a `kernel.serialize` listener.
    ///
    /// It must be text, bytes or a stream by the time the response is written.
    pub fn set_serialized_body(&self, body: impl Into<Body>) {
        self.features
            .set(RESPONSE_BODY, BodyCell(Mutex::new(Some(body.into()))));
    }

    /// Whether a serialized body was stored.
    pub fn has_serialized_body(&self) -> bool {
        self.features.has(RESPONSE_BODY)
    }

    pub(crate) fn take_serialized_body(&self) -> Option<Body> {
        self.features
            .take::<BodyCell>(RESPONSE_BODY)
            .and_then(|cell| cell.0.into_inner())
    }
}

/// Build the event for one lifecycle phase.
///
/// Stoppable phases follow `signal`; the others ignore every stop request.
pub fn lifecycle_event(phase: Phase, payload: KernelPayload, signal: AbortSignal) -> KernelEvent {
    let builder = Event::builder(phase, payload).serial();
    if phase.is_stoppable() {
        builder.signal(signal).build()
    } else {
        builder.unstoppable().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawRequest;
    use strata_core::AbortController;

    fn payload() -> (KernelPayload, AbortController) {
        let features = Features::new();
        let abort = AbortController::new();
        let request = HttpRequest::new(RawRequest::get("/"), Vec::new(), features.clone());
        let response = HttpResponse::new(abort.clone());
        (KernelPayload::new(request, response, features), abort)
    }

    #[test]
    fn test_unstoppable_phases_ignore_send() {
        let (payload, abort) = payload();
        let finish = lifecycle_event(Phase::Finish, payload.clone(), abort.signal());
        let request = lifecycle_event(Phase::Request, payload.clone(), abort.signal());
        payload.response().send("done");

        assert!(!finish.is_stopped());
        assert!(request.is_stopped());
    }

    #[test]
    fn test_body_slots_do_not_collide() {
        let (payload, _) = payload();
        payload.set_parsed_body(String::from("in"));
        payload.set_serialized_body("out");

        assert_eq!(payload.parsed_body::<String>().as_deref(), Some("in"));
        assert_eq!(payload.take_serialized_body().and_then(|b| b.as_text().map(str::to_owned)).as_deref(), Some("out"));
        assert!(!payload.has_serialized_body());
    }
}
