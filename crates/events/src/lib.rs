//! `gymhub-events`: committed-change notifications.
//!
//! Aggregates emit typed events; once a write commits, the service wraps each
//! event in an [`EventEnvelope`] and hands it to projections (derived indexes).

pub mod envelope;
pub mod event;
pub mod projection;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use projection::Projection;
