//! `gymhub-ledger`: join/apply/workout/diet requests and membership records.

pub mod membership;
pub mod request;

pub use membership::{Membership, MembershipChanges};
pub use request::{
    RosterEffect, Request, RequestCommand, RequestEvent, RequestKey, RequestKind, RequestStatus,
    SubmitRequest, REQUEST_STREAM,
};
