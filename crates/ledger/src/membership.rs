use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{
    DomainError, DomainResult, Entity, GymId, MembershipDuration, MembershipId, RequestId, UserId,
};
use gymhub_gyms::MembershipPlan;

/// Active (or historical) link between a member and a gym with a validity
/// window. Invariant: `end_date > start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub member_id: UserId,
    pub gym_id: GymId,
    /// Request through which the membership was granted, if any.
    #[serde(default)]
    pub request_id: Option<RequestId>,
    /// Plan as it was at grant time; later plan edits don't affect it.
    #[serde(default)]
    pub plan: Option<MembershipPlan>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Date changes; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChanges {
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Membership {
    /// Grant a membership whose window is derived from a symbolic duration.
    pub fn for_duration(
        member_id: UserId,
        gym_id: GymId,
        duration: MembershipDuration,
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let end_date = duration.end_from(start_date)?;
        Self::with_window(member_id, gym_id, start_date, end_date, now)
    }

    /// Grant a membership with an explicit window.
    pub fn with_window(
        member_id: UserId,
        gym_id: GymId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_window(start_date, end_date)?;
        Ok(Self {
            id: MembershipId::new(),
            member_id,
            gym_id,
            request_id: None,
            plan: None,
            start_date,
            end_date,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn from_request(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_plan(mut self, plan: Option<MembershipPlan>) -> Self {
        self.plan = plan;
        self
    }

    pub fn reschedule(&mut self, changes: MembershipChanges, now: DateTime<Utc>) -> DomainResult<()> {
        let start = changes.start_date.unwrap_or(self.start_date);
        let end = changes.end_date.unwrap_or(self.end_date);
        ensure_window(start, end)?;
        self.start_date = start;
        self.end_date = end;
        self.updated_at = now;
        Ok(())
    }

    /// Half-open: active from `start_date` up to, not including, `end_date`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at < self.end_date
    }
}

fn ensure_window(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<()> {
    if end <= start {
        return Err(DomainError::validation("end date must be after start date"));
    }
    Ok(())
}

impl Entity for Membership {
    type Id = MembershipId;
    const COLLECTION: &'static str = "memberships";

    fn id(&self) -> MembershipId {
        self.id
    }
}
