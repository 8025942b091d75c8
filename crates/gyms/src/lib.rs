//! `gymhub-gyms`: the Gym aggregate.
//!
//! The gym document is the single source of truth for who trains at and who
//! belongs to a gym. Reverse lookups (a user's gyms) are derived from the
//! events emitted here.

pub mod gym;

pub use gym::{
    CreateGym, Gym, GymCommand, GymEvent, MembershipPlan, UpdateGym, GYM_STREAM,
};
