//! `gymhub-auth`: pure authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: the policy sees only an [`Actor`], an
//! [`Action`] and a read-only view of the gym roster ([`GymScope`]).

pub mod actor;
pub mod chat;
pub mod claims;
pub mod jwt;
pub mod policy;
pub mod role;
pub mod user;

pub use actor::{Actor, GymScope};
pub use chat::{Participant, check_adjacency, check_conversation};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use policy::{ACCESS_DENIED, Action, ActionScope, Decision, authorize};
pub use role::Role;
pub use user::{Profile, ProfileUpdate, User, normalize_email};
