use crate::{Event, EventEnvelope};

/// A projection builds a derived read model from committed events.
///
/// Implementations must be idempotent: the same envelope may be delivered more
/// than once (retries, rebuilds) and must leave the read model unchanged the
/// second time. Use the envelope's `sequence_number` to detect replays.
pub trait Projection: Send + Sync {
    type Ev: Event;

    fn apply(&self, envelope: &EventEnvelope<Self::Ev>);
}
