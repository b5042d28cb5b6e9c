//! # Pipeline
//!
//! A sequential step runner with a stop flag and an optional abort signal.
//!
//! Before each step the pipeline checks whether it was stopped (explicitly,
//! through a [`StopHandle`], or because its signal was aborted); the first
//! failing step short-circuits the rest. Running resets the stop flag, so one
//! pipeline can be restarted for a new stage.
//!
//! Pipelines are steps themselves and nest freely.

use crate::{error::BoxError, listener::IntoOutcome, signal::AbortSignal};
use futures::future::BoxFuture;
use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// One unit of work in a [`Pipeline`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a pipeline step for `{C}`",
    label = "missing `Step<{C}>` implementation",
    note = "Steps must implement `execute` for the context type `{C}`."
)]
pub trait Step<C: Send + Sync + 'static>: Send + Sync + 'static {
    /// Run the step against the shared context.
    fn execute(&self, ctx: &C) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Object-safe version of [`Step`].
pub trait DynStep<C: Send + Sync + 'static>: Send + Sync + 'static {
    /// Run the step (dynamic dispatch version).
    fn execute_dyn<'a>(&'a self, ctx: &'a C) -> BoxFuture<'a, Result<(), BoxError>>;
}

impl<C: Send + Sync + 'static, T: Step<C>> DynStep<C> for T {
    fn execute_dyn<'a>(&'a self, ctx: &'a C) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(self.execute(ctx))
    }
}

/// Step backed by a closure. The returned future must not borrow the context.
#[derive(Clone)]
pub struct FnStep<F> {
    f: F,
}

/// Create a step from a closure.
pub fn step_fn<F>(f: F) -> FnStep<F> {
    FnStep { f }
}

impl<C, F, Fut, R> Step<C> for FnStep<F>
where
    C: Send + Sync + 'static,
    F: Fn(&C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send,
    R: IntoOutcome,
{
    fn execute(&self, ctx: &C) -> impl Future<Output = Result<(), BoxError>> + Send {
        let fut = (self.f)(ctx);
        async move { fut.await.into_outcome() }
    }
}

/// How a pipeline run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every step ran.
    Completed,
    /// The pipeline was stopped before a remaining step.
    Stopped,
    /// A step failed; later steps were skipped.
    Failed(BoxError),
}

impl PipelineOutcome {
    /// Stopped and completed runs are both successes.
    pub fn into_result(self) -> Result<(), BoxError> {
        match self {
            PipelineOutcome::Completed | PipelineOutcome::Stopped => Ok(()),
            PipelineOutcome::Failed(err) => Err(err),
        }
    }

    /// Returns `true` for [`PipelineOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed(_))
    }
}

/// Handle that stops a pipeline from inside one of its steps.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Skip every step that has not started yet.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Ordered steps run against one context.
pub struct Pipeline<C: Send + Sync + 'static> {
    steps: Vec<Box<dyn DynStep<C>>>,
    stopped: Arc<AtomicBool>,
    signal: Option<AbortSignal>,
}

impl<C: Send + Sync + 'static> Default for Pipeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + Sync + 'static> Pipeline<C> {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            stopped: Arc::new(AtomicBool::new(false)),
            signal: None,
        }
    }

    /// Also stop once `signal` is aborted.
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Append a step.
    pub fn step<S: Step<C>>(mut self, step: S) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a step in place.
    pub fn push_step<S: Step<C>>(&mut self, step: S) {
        self.steps.push(Box::new(step));
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A handle that stops this pipeline.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stopped))
    }

    /// Skip every step that has not started yet.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether the next step would be skipped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
            || self.signal.as_ref().is_some_and(AbortSignal::is_aborted)
    }

    /// Run every step in order.
    pub async fn run(&self, ctx: &C) -> PipelineOutcome {
        self.stopped.store(false, Ordering::Release);
        for step in &self.steps {
            if self.is_stopped() {
                return PipelineOutcome::Stopped;
            }
            if let Err(err) = step.execute_dyn(ctx).await {
                return PipelineOutcome::Failed(err);
            }
        }
        PipelineOutcome::Completed
    }

    /// Run, then hand the failure (if any) to `terminal`, exactly once.
    pub async fn run_then<R>(&self, ctx: &C, terminal: impl FnOnce(Option<BoxError>) -> R) -> R {
        match self.run(ctx).await {
            PipelineOutcome::Failed(err) => terminal(Some(err)),
            PipelineOutcome::Completed | PipelineOutcome::Stopped => terminal(None),
        }
    }
}

impl<C: Send + Sync + 'static> Step<C> for Pipeline<C> {
    async fn execute(&self, ctx: &C) -> Result<(), BoxError> {
        self.run(ctx).await.into_result()
    }
}

impl<C: Send + Sync + 'static> fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::AbortController;
    use parking_lot::Mutex;

    type Log = Mutex<Vec<&'static str>>;

    fn record(tag: &'static str) -> impl Step<Log> {
        step_fn(move |log: &Log| {
            log.lock().push(tag);
            async { Ok::<(), BoxError>(()) }
        })
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let pipeline = Pipeline::new().step(record("a")).step(record("b"));
        let log = Log::default();
        assert!(matches!(pipeline.run(&log).await, PipelineOutcome::Completed));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_first_error_short_circuits() {
        let pipeline = Pipeline::new()
            .step(step_fn(|_: &Log| async { Err::<(), BoxError>("bad".into()) }))
            .step(record("never"));
        let log = Log::default();
        let seen = pipeline
            .run_then(&log, |err| err.map(|e| e.to_string()))
            .await;
        assert_eq!(seen.as_deref(), Some("bad"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stop_from_step_and_restart() {
        let mut pipeline = Pipeline::new();
        let handle = pipeline.stop_handle();
        pipeline.push_step(record("a"));
        pipeline.push_step(step_fn(move |_: &Log| {
            handle.stop();
            async { Ok::<(), BoxError>(()) }
        }));
        pipeline.push_step(record("c"));

        let log = Log::default();
        assert!(matches!(pipeline.run(&log).await, PipelineOutcome::Stopped));
        assert!(matches!(pipeline.run(&log).await, PipelineOutcome::Stopped));
        assert_eq!(*log.lock(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_aborted_signal_skips_steps() {
        let controller = AbortController::new();
        let pipeline = Pipeline::new()
            .with_signal(controller.signal())
            .step(record("a"));
        controller.abort();

        let log = Log::default();
        assert!(matches!(pipeline.run(&log).await, PipelineOutcome::Stopped));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_nested_pipeline_is_a_step() {
        let inner = Pipeline::new().step(record("inner"));
        let outer = Pipeline::new().step(inner).step(record("outer"));
        let log = Log::default();
        outer.run(&log).await.into_result().unwrap();
        assert_eq!(*log.lock(), vec!["inner", "outer"]);
    }
}
