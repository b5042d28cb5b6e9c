//! Payload trait for event data.

/// A marker trait for the data carried by lifecycle and custom events.
///
/// Payloads must be `Send + Sync + 'static`: one event is shared by every
/// listener of an emission, including listeners started concurrently.
///
/// # Example
///
/// ```rust,ignore
/// struct Tick { n: u64 }
///
/// impl Payload for Tick {}
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Payload",
    label = "must be `Send + Sync + 'static`",
    note = "Event payloads in Strata must be thread-safe and static."
)]
pub trait Payload: Send + Sync + 'static {}

impl Payload for () {}
