//! Role-based authorization policy.
//!
//! One pure decision function, [`authorize`], implemented as a single
//! exhaustive match over (role, action scope). Every pair that is not
//! explicitly allowed is denied; the function never panics and never defaults
//! to allow.

use serde::Serialize;

use gymhub_core::{DomainError, DomainResult, UserId};

use crate::{Actor, GymScope, Role};

/// Reason returned for every policy denial.
pub const ACCESS_DENIED: &str = "Access denied";

/// Everything an actor can attempt against the system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewGym,
    CreateGym,
    UpdateGym,
    DeleteGym,
    AssignTrainer,
    RemoveTrainer,
    AddMember,
    RemoveMember,
    ManageGymPlans,
    UploadGymPhoto,
    PostAnnouncement,
    /// Accept/deny an `apply_trainer` request.
    ReviewTrainerApplication,
    ViewMemberships,
    ManageMemberships,
    /// Accept/deny a `join_gym`, `request_workout` or `request_diet` request.
    ReviewRequest,
    ViewRequests,
    CreatePlan,
    CreateRequest,
    LogProgress,
    ViewProgress,
    SendMessage,
    ReadMessages,
    WriteReview,
    BookSession,
    ViewAnnouncements,
    ViewBookings,
    CancelBooking,
    RebuildIndex,
}

impl Action {
    pub const ALL: [Action; 28] = [
        Action::ViewGym,
        Action::CreateGym,
        Action::UpdateGym,
        Action::DeleteGym,
        Action::AssignTrainer,
        Action::RemoveTrainer,
        Action::AddMember,
        Action::RemoveMember,
        Action::ManageGymPlans,
        Action::UploadGymPhoto,
        Action::PostAnnouncement,
        Action::ReviewTrainerApplication,
        Action::ViewMemberships,
        Action::ManageMemberships,
        Action::ReviewRequest,
        Action::ViewRequests,
        Action::CreatePlan,
        Action::CreateRequest,
        Action::LogProgress,
        Action::ViewProgress,
        Action::SendMessage,
        Action::ReadMessages,
        Action::WriteReview,
        Action::BookSession,
        Action::ViewAnnouncements,
        Action::ViewBookings,
        Action::CancelBooking,
        Action::RebuildIndex,
    ];

    pub fn scope(self) -> ActionScope {
        match self {
            Action::ViewGym => ActionScope::Open,
            Action::CreateGym => ActionScope::GymCreation,
            Action::UpdateGym
            | Action::DeleteGym
            | Action::AssignTrainer
            | Action::RemoveTrainer
            | Action::AddMember
            | Action::RemoveMember
            | Action::ManageGymPlans
            | Action::UploadGymPhoto
            | Action::PostAnnouncement
            | Action::ReviewTrainerApplication => ActionScope::GymAdmin,
            Action::ViewMemberships
            | Action::ManageMemberships
            | Action::ReviewRequest
            | Action::ViewRequests
            | Action::CreatePlan => ActionScope::Staff,
            Action::CreateRequest => ActionScope::SelfRequest,
            Action::LogProgress => ActionScope::SelfRecord,
            Action::ViewProgress => ActionScope::RecordAccess,
            Action::SendMessage | Action::ReadMessages => ActionScope::Chat,
            Action::WriteReview | Action::BookSession => ActionScope::GymMember,
            Action::ViewAnnouncements | Action::ViewBookings => ActionScope::Roster,
            Action::CancelBooking => ActionScope::Participant,
            Action::RebuildIndex => ActionScope::Maintenance,
        }
    }
}

/// Groups actions that share one access rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ActionScope {
    /// Any authenticated role.
    Open,
    /// Only gym owners create gyms.
    GymCreation,
    /// Gym-mutating: the owning gym owner.
    GymAdmin,
    /// Member-facing: the owning gym owner or a trainer of the gym.
    Staff,
    /// Members and trainers filing requests for themselves.
    SelfRequest,
    /// Members writing their own food/body data.
    SelfRecord,
    /// A member's own data, or staff of the member's gym.
    RecordAccess,
    /// Chat inside the actor's own gym (pair rule checked separately).
    Chat,
    /// Members of the gym only.
    GymMember,
    /// Anyone on the gym roster.
    Roster,
    /// The actor is a party to the record, or owns the gym.
    Participant,
    /// Super-role only.
    Maintenance,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny(reason.into())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> DomainResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(DomainError::Forbidden(reason)),
        }
    }
}

/// Decide whether `actor` may perform `action`.
///
/// - `gym`: roster of the gym the action is scoped to, if any. Callers resolve
///   "not found" before calling; a missing gym here simply denies gym-scoped
///   actions.
/// - `target`: the user the action is about (request/record owner, booking
///   party), if any.
///
/// No IO, no panics.
pub fn authorize(
    actor: &Actor,
    action: Action,
    gym: Option<&dyn GymScope>,
    target: Option<UserId>,
) -> Decision {
    let allowed = match (actor.role, action.scope()) {
        (Role::Owner, _) => true,

        (_, ActionScope::Open) => true,

        (Role::GymOwner, ActionScope::GymCreation) => true,
        (Role::Trainer | Role::Member, ActionScope::GymCreation) => false,

        (
            Role::GymOwner,
            ActionScope::GymAdmin
            | ActionScope::Staff
            | ActionScope::Chat
            | ActionScope::Roster
            | ActionScope::Participant,
        ) => owns(actor, gym),
        (Role::Trainer | Role::Member, ActionScope::GymAdmin) => false,

        (Role::Trainer, ActionScope::Staff | ActionScope::Chat) => trains_at(actor, gym),
        (Role::Member, ActionScope::Staff) => false,

        (Role::Trainer | Role::Member, ActionScope::SelfRequest) => is_self(actor, target),
        (Role::GymOwner, ActionScope::SelfRequest) => false,

        (Role::Member, ActionScope::SelfRecord) => is_self(actor, target),
        (Role::GymOwner | Role::Trainer, ActionScope::SelfRecord) => false,

        (Role::Member, ActionScope::RecordAccess) => is_self(actor, target),
        (Role::Trainer, ActionScope::RecordAccess) => {
            trains_at(actor, gym) && target_is_member(gym, target)
        }
        (Role::GymOwner, ActionScope::RecordAccess) => {
            owns(actor, gym) && target_is_member(gym, target)
        }

        (Role::Member, ActionScope::Chat | ActionScope::GymMember) => belongs_to(actor, gym),
        (Role::GymOwner | Role::Trainer, ActionScope::GymMember) => false,

        (Role::Trainer | Role::Member, ActionScope::Roster) => in_roster(actor, gym),
        (Role::Trainer | Role::Member, ActionScope::Participant) => {
            is_self(actor, target) && in_roster(actor, gym)
        }

        (Role::GymOwner | Role::Trainer | Role::Member, ActionScope::Maintenance) => false,
    };

    if allowed {
        Decision::Allow
    } else {
        tracing::debug!(actor = %actor.id, role = %actor.role, ?action, "authorization denied");
        Decision::deny(ACCESS_DENIED)
    }
}

fn owns(actor: &Actor, gym: Option<&dyn GymScope>) -> bool {
    gym.is_some_and(|g| g.owner_id() == actor.id)
}

fn trains_at(actor: &Actor, gym: Option<&dyn GymScope>) -> bool {
    gym.is_some_and(|g| g.has_trainer(actor.id))
}

fn belongs_to(actor: &Actor, gym: Option<&dyn GymScope>) -> bool {
    gym.is_some_and(|g| g.has_member(actor.id))
}

fn in_roster(actor: &Actor, gym: Option<&dyn GymScope>) -> bool {
    gym.is_some_and(|g| g.includes(actor.id))
}

fn is_self(actor: &Actor, target: Option<UserId>) -> bool {
    target == Some(actor.id)
}

fn target_is_member(gym: Option<&dyn GymScope>, target: Option<UserId>) -> bool {
    match (gym, target) {
        (Some(g), Some(t)) => g.has_member(t),
        _ => false,
    }
}
