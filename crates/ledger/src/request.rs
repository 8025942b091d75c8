//! Request aggregate.
//!
//! Lifecycle: `pending -> accepted | denied`. Both targets are terminal; any
//! further transition fails with `InvalidState`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gymhub_auth::{Action, GymScope, Role};
use gymhub_core::{
    Aggregate, AggregateRoot, DomainError, Entity, GymId, MembershipDuration, RequestId, UserId,
};
use gymhub_events::Event;
use gymhub_gyms::Gym;

/// Stream type used when publishing request events.
pub const REQUEST_STREAM: &str = "ledger.request";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    JoinGym,
    ApplyTrainer,
    RequestWorkout,
    RequestDiet,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::JoinGym => "join_gym",
            RequestKind::ApplyTrainer => "apply_trainer",
            RequestKind::RequestWorkout => "request_workout",
            RequestKind::RequestDiet => "request_diet",
        }
    }

    /// The only role allowed to file this kind of request.
    pub fn requester_role(self) -> Role {
        match self {
            RequestKind::ApplyTrainer => Role::Trainer,
            RequestKind::JoinGym | RequestKind::RequestWorkout | RequestKind::RequestDiet => {
                Role::Member
            }
        }
    }

    /// Policy action a reviewer needs to accept or deny this kind.
    pub fn review_action(self) -> Action {
        match self {
            RequestKind::ApplyTrainer => Action::ReviewTrainerApplication,
            RequestKind::JoinGym | RequestKind::RequestWorkout | RequestKind::RequestDiet => {
                Action::ReviewRequest
            }
        }
    }
}

impl core::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Uniqueness key: at most one pending request per (user, gym, kind).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub user_id: UserId,
    pub gym_id: GymId,
    pub kind: RequestKind,
}

/// Roster change that accepting a request implies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RosterEffect {
    AddMember { gym_id: GymId, user_id: UserId },
    AddTrainer { gym_id: GymId, user_id: UserId },
}

/// Aggregate root: Request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    requester_id: UserId,
    gym_id: GymId,
    kind: RequestKind,
    status: RequestStatus,
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    duration: Option<MembershipDuration>,
    #[serde(default)]
    trainer_id: Option<UserId>,
    #[serde(default)]
    note: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reviewed_by: Option<UserId>,
    #[serde(default)]
    reviewed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Request {
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            requester_id: UserId::from_uuid(Uuid::nil()),
            gym_id: GymId::from_uuid(Uuid::nil()),
            kind: RequestKind::JoinGym,
            status: RequestStatus::Pending,
            plan_name: None,
            duration: None,
            trainer_id: None,
            note: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            reviewed_by: None,
            reviewed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn requester_id(&self) -> UserId {
        self.requester_id
    }

    pub fn gym_id(&self) -> GymId {
        self.gym_id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn plan_name(&self) -> Option<&str> {
        self.plan_name.as_deref()
    }

    pub fn duration(&self) -> Option<MembershipDuration> {
        self.duration
    }

    pub fn trainer_id(&self) -> Option<UserId> {
        self.trainer_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    pub fn is_pending(&self) -> bool {
        self.created && self.status == RequestStatus::Pending
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            user_id: self.requester_id,
            gym_id: self.gym_id,
            kind: self.kind,
        }
    }

    /// Whether this stored request blocks a new one with `key`.
    pub fn blocks(&self, key: &RequestKey) -> bool {
        self.is_pending() && self.key() == *key
    }

    pub fn roster_effect(&self) -> Option<RosterEffect> {
        match self.kind {
            RequestKind::JoinGym => Some(RosterEffect::AddMember {
                gym_id: self.gym_id,
                user_id: self.requester_id,
            }),
            RequestKind::ApplyTrainer => Some(RosterEffect::AddTrainer {
                gym_id: self.gym_id,
                user_id: self.requester_id,
            }),
            RequestKind::RequestWorkout | RequestKind::RequestDiet => None,
        }
    }

    /// Membership length granted on acceptance of a join request: the chosen
    /// plan's duration, else the requested duration, else one month.
    pub fn membership_duration(&self, gym: &Gym) -> MembershipDuration {
        self.plan_name
            .as_deref()
            .and_then(|name| gym.plan(name))
            .map(|plan| plan.duration)
            .or(self.duration)
            .unwrap_or(MembershipDuration::OneMonth)
    }
}

impl AggregateRoot for Request {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for Request {
    type Id = RequestId;
    const COLLECTION: &'static str = "requests";

    fn id(&self) -> RequestId {
        self.id
    }
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub requester_id: UserId,
    pub requester_role: Role,
    pub gym_id: GymId,
    pub kind: RequestKind,
    pub plan_name: Option<String>,
    pub duration: Option<MembershipDuration>,
    pub trainer_id: Option<UserId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SubmitRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey {
            user_id: self.requester_id,
            gym_id: self.gym_id,
            kind: self.kind,
        }
    }

    /// Checks that depend on the target gym's current roster and plans.
    pub fn check_against(&self, gym: &Gym) -> Result<(), DomainError> {
        match self.kind {
            RequestKind::JoinGym => {
                if gym.has_member(self.requester_id) {
                    return Err(DomainError::conflict("already a member of this gym"));
                }
                if let Some(name) = self.plan_name.as_deref() {
                    if gym.plan(name).is_none() {
                        return Err(DomainError::validation(format!("gym has no plan named '{name}'")));
                    }
                }
            }
            RequestKind::ApplyTrainer => {
                if gym.has_trainer(self.requester_id) {
                    return Err(DomainError::conflict("already a trainer at this gym"));
                }
            }
            RequestKind::RequestWorkout | RequestKind::RequestDiet => {
                if !gym.has_member(self.requester_id) {
                    return Err(DomainError::forbidden("requester is not a member of this gym"));
                }
                if let Some(trainer) = self.trainer_id {
                    if !gym.has_trainer(trainer) {
                        return Err(DomainError::invalid_target(
                            "flagged trainer does not train at this gym",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    Submit(SubmitRequest),
    Accept {
        reviewer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Deny {
        reviewer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestEvent {
    Submitted {
        request_id: RequestId,
        requester_id: UserId,
        gym_id: GymId,
        kind: RequestKind,
        plan_name: Option<String>,
        duration: Option<MembershipDuration>,
        trainer_id: Option<UserId>,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Accepted {
        request_id: RequestId,
        reviewer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Denied {
        request_id: RequestId,
        reviewer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::Submitted { .. } => "ledger.request.submitted",
            RequestEvent::Accepted { .. } => "ledger.request.accepted",
            RequestEvent::Denied { .. } => "ledger.request.denied",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::Submitted { occurred_at, .. }
            | RequestEvent::Accepted { occurred_at, .. }
            | RequestEvent::Denied { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Request {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::Submitted {
                request_id,
                requester_id,
                gym_id,
                kind,
                plan_name,
                duration,
                trainer_id,
                note,
                occurred_at,
            } => {
                self.id = *request_id;
                self.requester_id = *requester_id;
                self.gym_id = *gym_id;
                self.kind = *kind;
                self.status = RequestStatus::Pending;
                self.plan_name = plan_name.clone();
                self.duration = *duration;
                self.trainer_id = *trainer_id;
                self.note = note.clone();
                self.created_at = *occurred_at;
                self.created = true;
            }
            RequestEvent::Accepted {
                reviewer_id,
                occurred_at,
                ..
            } => {
                self.status = RequestStatus::Accepted;
                self.reviewed_by = Some(*reviewer_id);
                self.reviewed_at = Some(*occurred_at);
            }
            RequestEvent::Denied {
                reviewer_id,
                occurred_at,
                ..
            } => {
                self.status = RequestStatus::Denied;
                self.reviewed_by = Some(*reviewer_id);
                self.reviewed_at = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::Submit(cmd) => self.handle_submit(cmd),
            RequestCommand::Accept {
                reviewer_id,
                occurred_at,
            } => {
                self.ensure_pending()?;
                Ok(vec![RequestEvent::Accepted {
                    request_id: self.id,
                    reviewer_id: *reviewer_id,
                    occurred_at: *occurred_at,
                }])
            }
            RequestCommand::Deny {
                reviewer_id,
                occurred_at,
            } => {
                self.ensure_pending()?;
                Ok(vec![RequestEvent::Denied {
                    request_id: self.id,
                    reviewer_id: *reviewer_id,
                    occurred_at: *occurred_at,
                }])
            }
        }
    }
}

impl Request {
    fn ensure_pending(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("request"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "request is already {}",
                match self.status {
                    RequestStatus::Accepted => "accepted",
                    RequestStatus::Denied => "denied",
                    RequestStatus::Pending => "pending",
                }
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("request already exists"));
        }

        let expected = cmd.kind.requester_role();
        if cmd.requester_role != expected {
            return Err(DomainError::validation(format!(
                "{} requests can only be filed by a {expected}",
                cmd.kind
            )));
        }

        let joins = cmd.kind == RequestKind::JoinGym;
        if !joins && (cmd.plan_name.is_some() || cmd.duration.is_some()) {
            return Err(DomainError::validation("plan and duration apply to join_gym requests only"));
        }
        let coaching = matches!(cmd.kind, RequestKind::RequestWorkout | RequestKind::RequestDiet);
        if !coaching && cmd.trainer_id.is_some() {
            return Err(DomainError::validation(
                "a trainer can only be flagged on workout or diet requests",
            ));
        }

        let plan_name = cmd
            .plan_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let note = cmd
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(vec![RequestEvent::Submitted {
            request_id: cmd.request_id,
            requester_id: cmd.requester_id,
            gym_id: cmd.gym_id,
            kind: cmd.kind,
            plan_name,
            duration: cmd.duration,
            trainer_id: cmd.trainer_id,
            note,
            occurred_at: cmd.occurred_at,
        }])
    }
}
