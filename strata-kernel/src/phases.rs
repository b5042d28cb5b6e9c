//! # Lifecycle Phases
//!
//! The fixed sequence one request goes through:
//!
//! ```text
//! REQUEST → PARSE? → CONTROLLER → handler → RESPONSE
//!     └─ on failure: ERROR
//! PREPARE (304, SERIALIZE?) → WRITE (head, body, TRAILERS?) → end
//!     └─ on write failure: WARNING
//! FINISH
//!     └─ WARNING, ERROR or FINISH failure: CRITICAL
//! ```
//!
//! The request stage runs under the request's abort signal, so
//! [`HttpResponse::send`](crate::HttpResponse::send) skips whatever is
//! left of it. Every later stage reads the signal afresh.

use crate::{
    context::Context,
    error::{HttpError, KernelError, SerializeError},
    events::{KernelPayload, lifecycle_event},
    http::{APPLICATION_JSON, Body, BodyKind, HttpHeaders, TrailerBlock},
};
use futures::StreamExt;
use http::{Method, StatusCode};
use strata_core::{BoxError, EmitError, Phase, Pipeline, PipelineOutcome, SharedError, Step};

/// Run every phase for one request.
///
/// Resolves to [`KernelError::Fatal`] only when a `kernel.critical`
/// listener fails; the response is written and `kernel.finish` emitted
/// either way.
pub(crate) async fn run(ctx: &Context) -> Result<(), KernelError> {
    let stages = Pipeline::new().step(RequestStage).step(ResponseStage);

    let mut escalated = None;
    if let PipelineOutcome::Failed(err) = stages.run(ctx).await {
        if let Err(err) = handle_error(ctx, SharedError::from_box(err)).await {
            escalated = Some(err);
        }
    }

    let mut fatal = None;
    if let Err(err) = write_response(ctx).await {
        if let Err(err) = warning(ctx, err).await {
            keep_first(&mut fatal, critical(ctx, err).await);
        }
    }
    if let Some(err) = escalated {
        keep_first(&mut fatal, critical(ctx, err).await);
    }

    if let Err(err) = emit(ctx, Phase::Finish, ctx.payload()).await {
        keep_first(&mut fatal, critical(ctx, err.into_shared()).await);
    }

    fatal.map_or(Ok(()), Err)
}

fn keep_first(slot: &mut Option<KernelError>, result: Result<(), KernelError>) {
    if let Err(err) = result {
        slot.get_or_insert(err);
    }
}

/// Emit one lifecycle event on the request's target emitter.
async fn emit(ctx: &Context, phase: Phase, payload: KernelPayload) -> Result<(), EmitError> {
    if ctx.log_phases {
        tracing::debug!(phase = %phase, "phase");
    }
    ctx.target
        .emit(lifecycle_event(phase, payload, ctx.abort.signal()))
        .await
}

// ============================================================================
// Request and response stages
// ============================================================================

/// REQUEST, PARSE, CONTROLLER and the handler, stopped by `send()`.
struct RequestStage;

impl Step<Context> for RequestStage {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        Pipeline::new()
            .with_signal(ctx.abort.signal())
            .step(EmitPhase(Phase::Request))
            .step(RequireRoute)
            .step(ParseBody)
            .step(EmitPhase(Phase::Controller))
            .step(InvokeHandler)
            .run(ctx)
            .await
            .into_result()
    }
}

/// RESPONSE, under whatever signal is current once the request stage is over.
struct ResponseStage;

impl Step<Context> for ResponseStage {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        Pipeline::new()
            .with_signal(ctx.abort.signal())
            .step(EmitPhase(Phase::Response))
            .run(ctx)
            .await
            .into_result()
    }
}

struct EmitPhase(Phase);

impl Step<Context> for EmitPhase {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        emit(ctx, self.0, ctx.payload())
            .await
            .map_err(EmitError::into_box)
    }
}

/// Fails with a 404 when no route matched.
struct RequireRoute;

impl Step<Context> for RequireRoute {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        match ctx.route {
            Some(_) => Ok(()),
            None => Err(HttpError::not_found().into()),
        }
    }
}

/// PARSE runs only when someone listens for it.
struct ParseBody;

impl Step<Context> for ParseBody {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        if ctx.target.listener_count(Phase::Parse) == 0 {
            return Ok(());
        }
        EmitPhase(Phase::Parse).execute(ctx).await
    }
}

struct InvokeHandler;

impl Step<Context> for InvokeHandler {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let Some(route) = &ctx.route else {
            return Err(HttpError::not_found().into());
        };
        route.handler().call_dyn(ctx.handler_context()).await
    }
}

// ============================================================================
// Error tiers
// ============================================================================

/// Turn a failure into a response, then emit ERROR.
///
/// A failing `kernel.error` listener replaces the response again and its
/// error is returned.
async fn handle_error(ctx: &Context, error: SharedError) -> Result<(), SharedError> {
    tracing::debug!(error = %error, "request failed");
    normalize(ctx, &error);
    match emit(ctx, Phase::Error, ctx.payload().with_error(error)).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let err = err.into_shared();
            normalize(ctx, &err);
            Err(err)
        }
    }
}

/// Status from an [`HttpError`] when it is valid, `500` otherwise; body
/// from its content or the reason phrase.
fn normalize(ctx: &Context, error: &SharedError) {
    let http = error.downcast_ref::<HttpError>();
    let status = http
        .map(HttpError::status)
        .filter(|status| (100..=999).contains(status))
        .unwrap_or(500);
    let body = match http.and_then(HttpError::content) {
        Some(content) => Body::from(content.clone()),
        None => Body::from(reason_phrase(status)),
    };

    if let Err(err) = ctx.response.set_status(status) {
        tracing::warn!(error = %err, "error status rejected");
    }
    ctx.response.set_body(body);
}

async fn warning(ctx: &Context, error: SharedError) -> Result<(), SharedError> {
    tracing::warn!(error = %error, "response write failed");
    emit(ctx, Phase::Warning, ctx.payload().with_error(error))
        .await
        .map_err(EmitError::into_shared)
}

async fn critical(ctx: &Context, error: SharedError) -> Result<(), KernelError> {
    tracing::error!(error = %error, "critical request failure");
    emit(ctx, Phase::Critical, ctx.payload().with_error(error))
        .await
        .map_err(|err| {
            let err = err.into_shared();
            tracing::error!(error = %err, "critical listener failed");
            KernelError::Fatal(err)
        })
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
}

// ============================================================================
// Write
// ============================================================================

/// PREPARE and WRITE, then end the transport whatever happened.
async fn write_response(ctx: &Context) -> Result<(), SharedError> {
    let written = Pipeline::new()
        .step(Prepare)
        .step(Serialize)
        .step(WriteHead)
        .step(WriteBody)
        .step(WriteTrailers)
        .run(ctx)
        .await
        .into_result();

    let mut transport = ctx.transport.lock().await;
    let ended = if transport.ended() {
        Ok(())
    } else {
        transport.end().await
    };
    drop(transport);

    written.and(ended).map_err(SharedError::from_box)
}

/// `204` and `304` carry neither a body nor trailers, so they are never chunked.
struct Prepare;

impl Step<Context> for Prepare {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let response = &ctx.response;
        if matches!(response.status(), 204 | 304) {
            response.set_body(Body::Empty);
            response.remove_header("trailer");
            for name in response.trailers().names() {
                response.remove_trailer(name);
            }
        }
        Ok(())
    }
}

/// SERIALIZE: a JSON body becomes wire bytes.
///
/// The configured serializer is used unless `kernel.serialize` has
/// listeners, in which case one of them must store the result.
struct Serialize;

impl Step<Context> for Serialize {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let response = &ctx.response;
        let Some(value) = response.body_json() else {
            return Ok(());
        };
        if !response.has_header("content-type") {
            response.set_content_type(Some(APPLICATION_JSON))?;
        }

        let wire = if ctx.target.listener_count(Phase::Serialize) == 0 {
            Body::Bytes(ctx.serializer.serialize(&value)?)
        } else {
            let payload = ctx.payload();
            emit(ctx, Phase::Serialize, payload.clone())
                .await
                .map_err(EmitError::into_box)?;
            payload
                .take_serialized_body()
                .ok_or(SerializeError::InvalidBody)?
        };

        if !wire.is_writable() {
            return Err(SerializeError::InvalidBody.into());
        }
        response.set_body(wire);
        Ok(())
    }
}

/// Compute framing headers and flush the head, once.
struct WriteHead;

impl Step<Context> for WriteHead {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let mut transport = ctx.transport.lock().await;
        if transport.headers_sent() {
            return Ok(());
        }

        let response = &ctx.response;
        let status = response.status();
        let cookies = response.cookies();
        let trailers = response.trailers();
        let kind = response.body_kind();
        let content_type = response.content_type();
        let length = response.body_len();

        response.with_headers(|headers| {
            frame(headers, &cookies, trailers.names(), kind, content_type, length)
        })?;

        let headers = response.headers();
        transport
            .write_head(status, reason_phrase(status), &headers)
            .await
    }
}

fn frame(
    headers: &mut HttpHeaders,
    cookies: &[String],
    trailers: &[String],
    kind: BodyKind,
    content_type: Option<String>,
    length: Option<usize>,
) -> Result<(), BoxError> {
    if !cookies.is_empty() {
        headers.set_all("set-cookie", cookies.iter().cloned())?;
    }
    if kind != BodyKind::Empty {
        if let Some(content_type) = content_type {
            if !headers.has("content-type") {
                headers.set("content-type", content_type)?;
            }
        }
        if kind == BodyKind::Stream {
            if !headers.has("transfer-encoding") {
                headers.set("transfer-encoding", "chunked")?;
            }
        } else if let Some(length) = length {
            headers.set("content-length", length.to_string())?;
        }
    }
    if !trailers.is_empty() {
        if !headers.has("transfer-encoding") {
            headers.set("transfer-encoding", "chunked")?;
        }
        headers.set("trailer", trailers.join(", "))?;
    }
    if headers.has("transfer-encoding") {
        headers.remove("content-length");
    }
    Ok(())
}

/// The body, unless the request is `HEAD` or the status forbids one.
struct WriteBody;

impl Step<Context> for WriteBody {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let response = &ctx.response;
        let status = response.status();
        if ctx.request.method() == Method::HEAD || status == 204 || status == 304 {
            return Ok(());
        }

        let mut transport = ctx.transport.lock().await;
        if transport.ended() {
            return Ok(());
        }
        match response.body_kind() {
            BodyKind::Empty => Ok(()),
            BodyKind::Stream => {
                let Body::Stream(mut stream) = response.take_body() else {
                    return Ok(());
                };
                while let Some(chunk) = stream.next().await {
                    transport.write(chunk?).await?;
                }
                Ok(())
            }
            _ => match response.body_bytes() {
                Some(bytes) => transport.write(bytes).await,
                None => Err(SerializeError::InvalidBody.into()),
            },
        }
    }
}

/// TRAILERS: declared names are filled by listeners, then queued.
struct WriteTrailers;

impl Step<Context> for WriteTrailers {
    async fn execute(&self, ctx: &Context) -> Result<(), BoxError> {
        let declared = ctx.response.trailers();
        if declared.is_empty() {
            return Ok(());
        }
        let ended = ctx.transport.lock().await.ended();
        if ended {
            return Ok(());
        }

        let block = TrailerBlock::new(&declared);
        emit(ctx, Phase::Trailers, ctx.payload().with_trailers(block.clone()))
            .await
            .map_err(EmitError::into_box)?;
        ctx.transport
            .lock()
            .await
            .add_trailers(block.to_pairs())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_stream_with_trailers() {
        let mut headers = HttpHeaders::new();
        headers.set("content-length", "10").unwrap();
        frame(
            &mut headers,
            &["a=1".to_owned()],
            &["x-checksum".to_owned()],
            BodyKind::Stream,
            Some("application/octet-stream".to_owned()),
            None,
        )
        .unwrap();

        assert_eq!(headers.get("transfer-encoding"), Some("chunked"));
        assert_eq!(headers.get("trailer"), Some("x-checksum"));
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
        assert!(!headers.has("content-length"));
    }

    #[test]
    fn test_frame_keeps_explicit_content_type() {
        let mut headers = HttpHeaders::new();
        headers.set("content-type", "text/csv").unwrap();
        frame(&mut headers, &[], &[], BodyKind::Text, Some("text/csv".to_owned()), Some(5)).unwrap();

        assert_eq!(headers.get("content-type"), Some("text/csv"));
        assert_eq!(headers.get("content-length"), Some("5"));
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(404), Some("Not Found"));
        assert_eq!(reason_phrase(299), None);
    }
}
