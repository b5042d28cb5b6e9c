//! Standard listeners.
//!
//! - [`LoggingListener`]: log every event it observes
//! - [`TimeoutListener`]: bound another listener's run time (`timeout` feature)

mod logging;
#[cfg(feature = "timeout")]
mod timeout;

pub use logging::LoggingListener;
#[cfg(feature = "timeout")]
pub use timeout::{ListenerTimeout, TimeoutListener};
