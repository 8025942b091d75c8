use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{DomainError, DomainResult, Entity, GymId, PlanId, RequestId, UserId};
use gymhub_ledger::{Request, RequestKind, RequestStatus};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Workout,
    Diet,
}

impl PlanKind {
    /// Request kind a plan of this kind answers.
    pub fn answers(self) -> RequestKind {
        match self {
            PlanKind::Workout => RequestKind::RequestWorkout,
            PlanKind::Diet => RequestKind::RequestDiet,
        }
    }
}

/// Workout or diet plan written by staff for one member of a gym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub kind: PlanKind,
    pub gym_id: GymId,
    pub author_id: UserId,
    pub member_id: UserId,
    #[serde(default)]
    pub request_id: Option<RequestId>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(
        kind: PlanKind,
        gym_id: GymId,
        author_id: UserId,
        member_id: UserId,
        title: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("plan title cannot be empty"));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("plan content cannot be empty"));
        }

        Ok(Self {
            id: PlanId::new(),
            kind,
            gym_id,
            author_id,
            member_id,
            request_id: None,
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Link this plan to the request it answers.
    ///
    /// The request must be an accepted workout/diet request of the same member
    /// and gym, and of the kind matching this plan.
    pub fn answering(mut self, request: &Request) -> DomainResult<Self> {
        if request.requester_id() != self.member_id || request.gym_id() != self.gym_id {
            return Err(DomainError::validation("request belongs to another member or gym"));
        }
        if request.kind() != self.kind.answers() {
            return Err(DomainError::validation(format!(
                "a {:?} plan cannot answer a {} request",
                self.kind,
                request.kind()
            )));
        }
        if request.status() != RequestStatus::Accepted {
            return Err(DomainError::invalid_state("request has not been accepted"));
        }
        self.request_id = Some(request.id_typed());
        Ok(self)
    }
}

impl Entity for Plan {
    type Id = PlanId;
    const COLLECTION: &'static str = "plans";

    fn id(&self) -> PlanId {
        self.id
    }
}
