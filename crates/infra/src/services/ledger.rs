use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use gymhub_auth::{Action, Actor, GymScope};
use gymhub_core::{
    Aggregate, ExpectedVersion, GymId, MembershipDuration, MembershipId, RequestId, UserId,
};
use gymhub_gyms::{Gym, GymCommand};
use gymhub_ledger::{
    Membership, MembershipChanges, Request, RequestCommand, RequestKind, RosterEffect, SubmitRequest,
};

use super::{ServiceContext, ensure_allowed, scope};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Filter, Versioned};

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub gym_id: GymId,
    pub kind: RequestKind,
    pub plan_name: Option<String>,
    pub duration: Option<MembershipDuration>,
    pub trainer_id: Option<UserId>,
    pub note: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestListing {
    #[default]
    All,
    PendingOnly,
}

/// Direct membership grant. Without an explicit `end_date` the window is
/// derived from `duration`, else the named plan's duration, else one month.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub member_id: UserId,
    pub plan_name: Option<String>,
    pub duration: Option<MembershipDuration>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// A write already committed during acceptance that must be undone if a
/// later step fails.
#[derive(Debug)]
enum Undo {
    RemoveMember { gym_id: GymId, user_id: UserId },
    RemoveTrainer { gym_id: GymId, user_id: UserId },
    DeleteMembership(MembershipId),
}

#[derive(Clone)]
pub struct LedgerService {
    ctx: Arc<ServiceContext>,
}

impl LedgerService {
    pub(crate) fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    async fn load_request(&self, id: RequestId) -> ServiceResult<Versioned<Request>> {
        self.ctx
            .requests
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("request"))
    }

    async fn load_membership(&self, id: MembershipId) -> ServiceResult<Versioned<Membership>> {
        self.ctx
            .memberships
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("membership"))
    }

    /// File a request for the calling member or trainer.
    ///
    /// At most one pending request may exist per (requester, gym, kind); the
    /// check and the insert are one atomic store operation.
    pub async fn create_request(&self, actor: &Actor, input: NewRequest) -> ServiceResult<Versioned<Request>> {
        let gym = self.ctx.load_gym(input.gym_id).await?;
        ensure_allowed(actor, Action::CreateRequest, scope(&gym.document), Some(actor.id))?;

        let submit = SubmitRequest {
            request_id: RequestId::new(),
            requester_id: actor.id,
            requester_role: actor.role,
            gym_id: input.gym_id,
            kind: input.kind,
            plan_name: input.plan_name,
            duration: input.duration,
            trainer_id: input.trainer_id,
            note: input.note,
            occurred_at: self.ctx.now(),
        };
        let mut request = Request::empty(submit.request_id);
        request.execute(&RequestCommand::Submit(submit.clone()))?;
        submit.check_against(&gym.document)?;

        // The requester may not sit on another gym's member roster.
        let _roster = if input.kind == RequestKind::JoinGym {
            let guard = self.ctx.roster_lock().await;
            self.ctx.ensure_not_member_elsewhere(actor.id, input.gym_id).await?;
            Some(guard)
        } else {
            None
        };

        let blocker = Filter::new(json!({
            "requester_id": actor.id,
            "gym_id": input.gym_id,
            "kind": input.kind,
            "status": "pending",
        }));
        let saved = self
            .ctx
            .requests
            .insert_unless(request, &blocker, "a pending request of this kind already exists for this gym")
            .await?;

        tracing::info!(
            request = %saved.document.id_typed(),
            gym = %input.gym_id,
            kind = %input.kind,
            requester = %actor.id,
            "request submitted"
        );
        Ok(saved)
    }

    /// Requesters see their own requests; reviewers of the gym see any.
    pub async fn get_request(&self, actor: &Actor, id: RequestId) -> ServiceResult<Versioned<Request>> {
        let request = self.load_request(id).await?;
        if request.document.requester_id() != actor.id {
            let gym = self.ctx.load_gym(request.document.gym_id()).await?;
            ensure_allowed(actor, Action::ViewRequests, scope(&gym.document), None)?;
        }
        Ok(request)
    }

    pub async fn my_requests(&self, actor: &Actor) -> ServiceResult<Vec<Versioned<Request>>> {
        Ok(self
            .ctx
            .requests
            .find(&Filter::new(json!({ "requester_id": actor.id })))
            .await?)
    }

    pub async fn gym_requests(
        &self,
        actor: &Actor,
        gym_id: GymId,
        listing: RequestListing,
    ) -> ServiceResult<Vec<Versioned<Request>>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ViewRequests, scope(&gym.document), None)?;
        let filter = match listing {
            RequestListing::All => json!({ "gym_id": gym_id }),
            RequestListing::PendingOnly => json!({ "gym_id": gym_id, "status": "pending" }),
        };
        Ok(self.ctx.requests.find(&Filter::new(filter)).await?)
    }

    /// Accept a pending request and apply its side effects.
    ///
    /// Writes happen in a fixed order: gym roster, then membership, then the
    /// request status. If a later write fails the earlier ones are undone, so
    /// a failed acceptance leaves the request pending and can be retried.
    /// Side effects an earlier attempt already left in place are reused.
    pub async fn accept_request(
        &self,
        actor: &Actor,
        id: RequestId,
        start_date: Option<DateTime<Utc>>,
    ) -> ServiceResult<Versioned<Request>> {
        let Versioned { revision, document: mut request } = self.load_request(id).await?;
        let gym = self.ctx.load_gym(request.gym_id()).await?;
        ensure_allowed(
            actor,
            request.kind().review_action(),
            scope(&gym.document),
            Some(request.requester_id()),
        )?;

        let now = self.ctx.now();
        // Rejects terminal requests before anything is written.
        request.execute(&RequestCommand::Accept {
            reviewer_id: actor.id,
            occurred_at: now,
        })?;

        let mut undo = Vec::new();
        let gym = self.apply_roster_effect(&request, gym, &mut undo).await?;

        if request.kind() == RequestKind::JoinGym {
            match self.grant_membership(&request, &gym, start_date.unwrap_or(now), now).await {
                Ok(Some(created)) => undo.push(Undo::DeleteMembership(created)),
                Ok(None) => {}
                Err(e) => {
                    self.compensate(id, undo).await;
                    return Err(e);
                }
            }
        }

        match self.ctx.requests.replace(request, ExpectedVersion::Exact(revision)).await {
            Ok(saved) => {
                tracing::info!(request = %id, reviewer = %actor.id, "request accepted");
                Ok(saved)
            }
            Err(e) => {
                self.compensate(id, undo).await;
                Err(e.into())
            }
        }
    }

    async fn apply_roster_effect(
        &self,
        request: &Request,
        gym: Versioned<Gym>,
        undo: &mut Vec<Undo>,
    ) -> ServiceResult<Gym> {
        let now = self.ctx.now();
        let (command, compensation) = match request.roster_effect() {
            Some(RosterEffect::AddMember { gym_id, user_id }) if !gym.document.has_member(user_id) => {
                let user = self.ctx.load_user(user_id).await?;
                (
                    GymCommand::AddMember {
                        member_id: user_id,
                        member_role: user.document.role,
                        occurred_at: now,
                    },
                    Undo::RemoveMember { gym_id, user_id },
                )
            }
            Some(RosterEffect::AddTrainer { gym_id, user_id }) if !gym.document.has_trainer(user_id) => {
                let user = self.ctx.load_user(user_id).await?;
                (
                    GymCommand::AssignTrainer {
                        trainer_id: user_id,
                        trainer_role: user.document.role,
                        occurred_at: now,
                    },
                    Undo::RemoveTrainer { gym_id, user_id },
                )
            }
            // No roster effect, or already applied by an earlier attempt.
            _ => return Ok(gym.document),
        };

        let (saved, _) = self.ctx.commit_gym(gym, command).await?;
        undo.push(compensation);
        Ok(saved.document)
    }

    /// Returns the id of a newly created membership, or `None` when an
    /// earlier attempt already granted one for this request.
    async fn grant_membership(
        &self,
        request: &Request,
        gym: &Gym,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<MembershipId>> {
        let existing = self
            .ctx
            .memberships
            .find(&Filter::new(json!({ "request_id": request.id_typed() })))
            .await?;
        if !existing.is_empty() {
            return Ok(None);
        }

        let plan = request.plan_name().and_then(|name| gym.plan(name)).cloned();
        let membership = Membership::for_duration(
            request.requester_id(),
            request.gym_id(),
            request.membership_duration(gym),
            start,
            now,
        )?
        .from_request(request.id_typed())
        .with_plan(plan);

        let saved = self.ctx.memberships.insert(membership).await?;
        Ok(Some(saved.document.id))
    }

    /// Undo committed steps in reverse order. Failures are logged; the
    /// roster index and a later retry both tolerate leftovers.
    async fn compensate(&self, request: RequestId, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            tracing::warn!(%request, ?step, "compensating failed acceptance");
            let result = match step {
                Undo::DeleteMembership(id) => self
                    .ctx
                    .memberships
                    .delete(id, ExpectedVersion::Any)
                    .await
                    .map_err(ServiceError::from),
                Undo::RemoveMember { gym_id, user_id } => {
                    self.undo_roster(
                        gym_id,
                        GymCommand::RemoveMember {
                            member_id: user_id,
                            occurred_at: self.ctx.now(),
                        },
                    )
                    .await
                }
                Undo::RemoveTrainer { gym_id, user_id } => {
                    self.undo_roster(
                        gym_id,
                        GymCommand::RemoveTrainer {
                            trainer_id: user_id,
                            occurred_at: self.ctx.now(),
                        },
                    )
                    .await
                }
            };
            if let Err(e) = result {
                tracing::error!(%request, error = %e, "compensation failed");
            }
        }
    }

    async fn undo_roster(&self, gym_id: GymId, command: GymCommand) -> ServiceResult<()> {
        let gym = self.ctx.load_gym(gym_id).await?;
        self.ctx.commit_gym(gym, command).await?;
        Ok(())
    }

    pub async fn deny_request(&self, actor: &Actor, id: RequestId) -> ServiceResult<Versioned<Request>> {
        let Versioned { revision, document: mut request } = self.load_request(id).await?;
        let gym = self.ctx.load_gym(request.gym_id()).await?;
        ensure_allowed(
            actor,
            request.kind().review_action(),
            scope(&gym.document),
            Some(request.requester_id()),
        )?;

        request.execute(&RequestCommand::Deny {
            reviewer_id: actor.id,
            occurred_at: self.ctx.now(),
        })?;
        let saved = self.ctx.requests.replace(request, ExpectedVersion::Exact(revision)).await?;
        tracing::info!(request = %id, reviewer = %actor.id, "request denied");
        Ok(saved)
    }

    pub async fn gym_memberships(&self, actor: &Actor, gym_id: GymId) -> ServiceResult<Vec<Versioned<Membership>>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ViewMemberships, scope(&gym.document), None)?;
        Ok(self
            .ctx
            .memberships
            .find(&Filter::new(json!({ "gym_id": gym_id })))
            .await?)
    }

    pub async fn my_memberships(&self, actor: &Actor) -> ServiceResult<Vec<Versioned<Membership>>> {
        Ok(self
            .ctx
            .memberships
            .find(&Filter::new(json!({ "member_id": actor.id })))
            .await?)
    }

    pub async fn create_membership(
        &self,
        actor: &Actor,
        gym_id: GymId,
        input: NewMembership,
    ) -> ServiceResult<Versioned<Membership>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ManageMemberships, scope(&gym.document), Some(input.member_id))?;
        if !gym.document.has_member(input.member_id) {
            return Err(ServiceError::invalid_target("user is not a member of this gym"));
        }

        let plan = match input.plan_name.as_deref() {
            Some(name) => Some(
                gym.document
                    .plan(name)
                    .cloned()
                    .ok_or_else(|| ServiceError::validation(format!("gym has no plan named '{name}'")))?,
            ),
            None => None,
        };

        let now = self.ctx.now();
        let start = input.start_date.unwrap_or(now);
        let membership = match input.end_date {
            Some(end) => Membership::with_window(input.member_id, gym_id, start, end, now)?,
            None => {
                let duration = input
                    .duration
                    .or(plan.as_ref().map(|p| p.duration))
                    .unwrap_or(MembershipDuration::OneMonth);
                Membership::for_duration(input.member_id, gym_id, duration, start, now)?
            }
        }
        .with_plan(plan);

        let saved = self.ctx.memberships.insert(membership).await?;
        tracing::info!(membership = %saved.document.id, gym = %gym_id, member = %input.member_id, "membership created");
        Ok(saved)
    }

    pub async fn update_membership(
        &self,
        actor: &Actor,
        id: MembershipId,
        changes: MembershipChanges,
    ) -> ServiceResult<Versioned<Membership>> {
        let Versioned { revision, mut document } = self.load_membership(id).await?;
        let gym = self.ctx.load_gym(document.gym_id).await?;
        ensure_allowed(actor, Action::ManageMemberships, scope(&gym.document), Some(document.member_id))?;

        document.reschedule(changes, self.ctx.now())?;
        let saved = self
            .ctx
            .memberships
            .replace(document, ExpectedVersion::Exact(revision))
            .await?;
        tracing::info!(membership = %id, "membership rescheduled");
        Ok(saved)
    }

    pub async fn delete_membership(&self, actor: &Actor, id: MembershipId) -> ServiceResult<()> {
        let membership = self.load_membership(id).await?;
        let gym = self.ctx.load_gym(membership.document.gym_id).await?;
        ensure_allowed(
            actor,
            Action::ManageMemberships,
            scope(&gym.document),
            Some(membership.document.member_id),
        )?;
        self.ctx
            .memberships
            .delete(id, ExpectedVersion::Exact(membership.revision))
            .await?;
        tracing::info!(membership = %id, "membership deleted");
        Ok(())
    }
}
