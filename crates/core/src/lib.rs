//! `gymhub-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, aggregate/entity traits and the
//! calendar arithmetic used for membership validity windows.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod period;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AnnouncementId, BookingId, GymId, LogId, MembershipId, MessageId, PlanId, RequestId,
    ReviewId, UserId,
};
pub use period::MembershipDuration;
