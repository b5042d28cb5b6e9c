//! Logging listener for event observation.

use strata_core::{BoxError, Event, Listener, Payload};
use tracing::Level;

/// A listener that logs each event it receives and lets dispatch continue.
#[derive(Debug, Clone, Copy)]
pub struct LoggingListener {
    level: Level,
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingListener {
    /// Log at `level`.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// The level events are logged at.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl<P: Payload> Listener<P> for LoggingListener {
    async fn on_event(&self, event: &Event<P>) -> Result<(), BoxError> {
        let name = event.name();
        let flags = event.flags();
        let stopped = event.is_stopped();
        match self.level {
            Level::TRACE => tracing::trace!(event = %name, ?flags, stopped, "event"),
            Level::DEBUG => tracing::debug!(event = %name, ?flags, stopped, "event"),
            Level::INFO => tracing::info!(event = %name, ?flags, stopped, "event"),
            Level::WARN => tracing::warn!(event = %name, ?flags, stopped, "event"),
            _ => tracing::error!(event = %name, ?flags, stopped, "event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Emitter, EventName};

    #[tokio::test]
    async fn test_logging_listener_passes_through() {
        let emitter: Emitter<()> = Emitter::new();
        let tick = EventName::custom("tick").unwrap();
        emitter.on(&tick, LoggingListener::new(Level::DEBUG));
        emitter.emit(Event::new(&tick, ())).await.unwrap();
    }
}
