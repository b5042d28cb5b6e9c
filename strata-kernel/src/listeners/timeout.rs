//! Time-limited listeners.

use std::time::Duration;
use strata_core::{BoxError, Event, Listener, Payload};
use thiserror::Error;
use tokio::time::timeout;

/// Returned when a wrapped listener runs out of time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("listener timed out after {0:?}")]
pub struct ListenerTimeout(pub Duration);

/// Wraps a listener and fails it once `duration` has elapsed.
///
/// Timing out only drops the inner future; side effects it already made stay.
pub struct TimeoutListener<L> {
    inner: L,
    duration: Duration,
}

impl<L> TimeoutListener<L> {
    /// Bound `inner` to `duration`.
    pub fn new(inner: L, duration: Duration) -> Self {
        Self { inner, duration }
    }
}

impl<P: Payload, L: Listener<P>> Listener<P> for TimeoutListener<L> {
    async fn on_event(&self, event: &Event<P>) -> Result<(), BoxError> {
        match timeout(self.duration, self.inner.on_event(event)).await {
            Ok(result) => result,
            Err(_) => Err(Box::new(ListenerTimeout(self.duration))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Emitter, EventName, from_fn};

    #[tokio::test]
    async fn test_slow_listener_times_out() {
        let emitter: Emitter<()> = Emitter::new();
        let slow = from_fn(|_: Event<()>| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let name = EventName::custom("slow").unwrap();
        emitter.on(&name, TimeoutListener::new(slow, Duration::from_millis(10)));

        let err = emitter
            .emit(Event::new(&name, ()))
            .await
            .unwrap_err();
        assert!(err.into_shared().downcast_ref::<ListenerTimeout>().is_some());
    }
}
