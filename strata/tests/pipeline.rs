use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use strata::{AbortController, BoxError, Pipeline, PipelineOutcome, Step, step_fn};

mod common;
use common::Log;

struct Ctx {
    log: Log,
    abort: AbortController,
}

struct Record(&'static str);

impl Step<Ctx> for Record {
    async fn execute(&self, ctx: &Ctx) -> Result<(), BoxError> {
        ctx.log.push(self.0);
        Ok(())
    }
}

struct Abort;

impl Step<Ctx> for Abort {
    async fn execute(&self, ctx: &Ctx) -> Result<(), BoxError> {
        ctx.abort.abort();
        Ok(())
    }
}

struct Fail;

impl Step<Ctx> for Fail {
    async fn execute(&self, _ctx: &Ctx) -> Result<(), BoxError> {
        Err("step failed".into())
    }
}

fn ctx() -> Ctx {
    Ctx {
        log: Log::default(),
        abort: AbortController::new(),
    }
}

#[tokio::test]
async fn test_abort_signal_skips_remaining_steps() {
    let ctx = ctx();
    let pipeline = Pipeline::new()
        .with_signal(ctx.abort.signal())
        .step(Record("a"))
        .step(Abort)
        .step(Record("b"));

    assert!(matches!(pipeline.run(&ctx).await, PipelineOutcome::Stopped));
    assert_eq!(ctx.log.entries(), vec!["a"]);

    // A pipeline built afterwards sees the fresh signal.
    let next = Pipeline::new()
        .with_signal(ctx.abort.signal())
        .step(Record("c"));
    assert!(matches!(next.run(&ctx).await, PipelineOutcome::Completed));
    assert_eq!(ctx.log.entries(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_terminal_runs_once_with_first_error() {
    let ctx = ctx();
    let pipeline = Pipeline::new()
        .step(Record("a"))
        .step(Fail)
        .step(Record("b"));

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let message = pipeline
        .run_then(&ctx, move |err| {
            seen.fetch_add(1, Ordering::SeqCst);
            err.map(|e| e.to_string())
        })
        .await;

    assert_eq!(message.as_deref(), Some("step failed"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.log.entries(), vec!["a"]);
}

#[tokio::test]
async fn test_stop_handle_and_restart() {
    let ctx = ctx();
    let mut pipeline = Pipeline::new().step(Record("a"));
    let handle = pipeline.stop_handle();
    pipeline.push_step(step_fn(move |_: &Ctx| {
        handle.stop();
        async {}
    }));
    pipeline.push_step(Record("b"));

    assert!(matches!(pipeline.run(&ctx).await, PipelineOutcome::Stopped));
    assert!(pipeline.is_stopped());

    // Running again clears the flag.
    pipeline.run(&ctx).await;
    assert_eq!(ctx.log.entries(), vec!["a", "a"]);
}

#[tokio::test]
async fn test_nested_pipelines() {
    let ctx = ctx();
    let inner = Pipeline::new().step(Record("inner-1")).step(Record("inner-2"));
    let outer = Pipeline::new()
        .step(Record("outer"))
        .step(inner)
        .step(Record("done"));

    outer.run(&ctx).await.into_result().unwrap();
    assert_eq!(
        ctx.log.entries(),
        vec!["outer", "inner-1", "inner-2", "done"]
    );
}
