use std::sync::Arc;

use serde_json::json;

use gymhub_auth::{Action, Actor};
use gymhub_core::{Aggregate, ExpectedVersion, GymId, MembershipDuration, UserId};
use gymhub_gyms::{CreateGym, Gym, GymCommand, MembershipPlan, UpdateGym};
use gymhub_ledger::RequestCommand;

use super::{ServiceContext, ensure_allowed, scope};
use crate::error::ServiceResult;
use crate::store::{Filter, Versioned};

#[derive(Debug, Clone, Default)]
pub struct NewGym {
    pub name: String,
    pub address: String,
    pub description: String,
}

#[derive(Clone)]
pub struct GymService {
    ctx: Arc<ServiceContext>,
}

impl GymService {
    pub(crate) fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Create a gym owned by the calling gym owner.
    pub async fn create(&self, actor: &Actor, input: NewGym) -> ServiceResult<Versioned<Gym>> {
        ensure_allowed(actor, Action::CreateGym, None, None)?;
        // The stored role is authoritative for the ownership invariant.
        let owner = self.ctx.load_user(actor.id).await?;

        let gym_id = GymId::new();
        let mut gym = Gym::empty(gym_id);
        let events = gym.execute(&GymCommand::Create(CreateGym {
            gym_id,
            owner_id: owner.document.id,
            owner_role: owner.document.role,
            name: input.name,
            address: input.address,
            description: input.description,
            occurred_at: self.ctx.now(),
        }))?;

        let saved = self.ctx.commit_new_gym(gym, &events).await?;
        tracing::info!(gym = %gym_id, owner = %actor.id, "gym created");
        Ok(saved)
    }

    pub async fn list(&self, actor: &Actor) -> ServiceResult<Vec<Versioned<Gym>>> {
        ensure_allowed(actor, Action::ViewGym, None, None)?;
        let gyms = self.ctx.gyms.find(&Filter::all()).await?;
        Ok(gyms.into_iter().filter(|g| g.document.is_live()).collect())
    }

    pub async fn get(&self, actor: &Actor, id: GymId) -> ServiceResult<Versioned<Gym>> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, Action::ViewGym, scope(&gym.document), None)?;
        Ok(gym)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: GymId,
        changes: UpdateGym,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let command = GymCommand::Update {
            changes,
            occurred_at: self.ctx.now(),
        };
        let saved = self.mutate(actor, id, Action::UpdateGym, precondition, command).await?;
        tracing::info!(gym = %id, "gym updated");
        Ok(saved)
    }

    /// Delete a gym and everything hanging off it: back-references are
    /// cleared through the roster index, pending requests are denied and the
    /// gym's memberships are removed.
    pub async fn delete(&self, actor: &Actor, id: GymId, precondition: ExpectedVersion) -> ServiceResult<()> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, Action::DeleteGym, scope(&gym.document), None)?;
        precondition.check(gym.revision)?;

        self.ctx
            .commit_gym(gym, GymCommand::Delete { occurred_at: self.ctx.now() })
            .await?;
        tracing::info!(gym = %id, by = %actor.id, "gym deleted");

        self.cascade_delete(actor, id).await;
        Ok(())
    }

    /// Best effort: the gym is already gone, so a failure here only leaves
    /// records that point at a missing gym, which every read treats as not
    /// found.
    async fn cascade_delete(&self, actor: &Actor, id: GymId) {
        let now = self.ctx.now();
        match self
            .ctx
            .requests
            .find(&Filter::new(json!({ "gym_id": id, "status": "pending" })))
            .await
        {
            Ok(pending) => {
                for Versioned { revision, mut document } in pending {
                    let request_id = document.id_typed();
                    let denied = document.execute(&RequestCommand::Deny {
                        reviewer_id: actor.id,
                        occurred_at: now,
                    });
                    if let Err(e) = denied {
                        tracing::warn!(request = %request_id, error = %e, "could not deny request of deleted gym");
                        continue;
                    }
                    if let Err(e) = self
                        .ctx
                        .requests
                        .replace(document, ExpectedVersion::Exact(revision))
                        .await
                    {
                        tracing::warn!(request = %request_id, error = %e, "could not deny request of deleted gym");
                    }
                }
            }
            Err(e) => tracing::error!(gym = %id, error = %e, "listing requests of deleted gym failed"),
        }

        self.drop_memberships(id, Filter::new(json!({ "gym_id": id }))).await;
    }

    /// Delete the memberships of `gym` matching `filter`. Best effort, like
    /// the rest of the cascade: the roster change is already committed.
    async fn drop_memberships(&self, gym: GymId, filter: Filter) {
        let memberships = match self.ctx.memberships.find(&filter).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(%gym, error = %e, "listing memberships to drop failed");
                return;
            }
        };
        for m in memberships {
            match self
                .ctx
                .memberships
                .delete(m.document.id, ExpectedVersion::Exact(m.revision))
                .await
            {
                Ok(()) => tracing::info!(%gym, membership = %m.document.id, member = %m.document.member_id, "membership dropped"),
                Err(e) => tracing::warn!(%gym, membership = %m.document.id, error = %e, "could not drop membership"),
            }
        }
    }

    pub async fn assign_trainer(
        &self,
        actor: &Actor,
        id: GymId,
        trainer_id: UserId,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, Action::AssignTrainer, scope(&gym.document), Some(trainer_id))?;
        precondition.check(gym.revision)?;
        let trainer = self.ctx.load_user(trainer_id).await?;

        let command = GymCommand::AssignTrainer {
            trainer_id,
            trainer_role: trainer.document.role,
            occurred_at: self.ctx.now(),
        };
        let (saved, _) = self.ctx.commit_gym(gym, command).await?;
        tracing::info!(gym = %id, trainer = %trainer_id, "trainer assigned");
        Ok(saved)
    }

    pub async fn remove_trainer(
        &self,
        actor: &Actor,
        id: GymId,
        trainer_id: UserId,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let command = GymCommand::RemoveTrainer {
            trainer_id,
            occurred_at: self.ctx.now(),
        };
        let saved = self.mutate(actor, id, Action::RemoveTrainer, precondition, command).await?;
        tracing::info!(gym = %id, trainer = %trainer_id, "trainer removed");
        Ok(saved)
    }

    /// Add a member directly. Fails when the user already belongs to another
    /// gym or is waiting on a join request to another gym.
    pub async fn add_member(
        &self,
        actor: &Actor,
        id: GymId,
        member_id: UserId,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, Action::AddMember, scope(&gym.document), Some(member_id))?;
        precondition.check(gym.revision)?;
        let member = self.ctx.load_user(member_id).await?;

        let command = GymCommand::AddMember {
            member_id,
            member_role: member.document.role,
            occurred_at: self.ctx.now(),
        };
        let (saved, _) = self.ctx.commit_gym(gym, command).await?;
        tracing::info!(gym = %id, member = %member_id, "member added");
        Ok(saved)
    }

    pub async fn remove_member(
        &self,
        actor: &Actor,
        id: GymId,
        member_id: UserId,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let command = GymCommand::RemoveMember {
            member_id,
            occurred_at: self.ctx.now(),
        };
        let saved = self.mutate(actor, id, Action::RemoveMember, precondition, command).await?;
        tracing::info!(gym = %id, member = %member_id, "member removed");

        self.drop_memberships(id, Filter::new(json!({ "gym_id": id, "member_id": member_id })))
            .await;
        Ok(saved)
    }

    pub async fn add_plan(
        &self,
        actor: &Actor,
        id: GymId,
        name: String,
        duration: MembershipDuration,
        price_cents: u64,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let command = GymCommand::AddPlan {
            plan: MembershipPlan {
                name,
                duration,
                price_cents,
            },
            occurred_at: self.ctx.now(),
        };
        self.mutate(actor, id, Action::ManageGymPlans, precondition, command).await
    }

    pub async fn remove_plan(
        &self,
        actor: &Actor,
        id: GymId,
        name: String,
        precondition: ExpectedVersion,
    ) -> ServiceResult<Versioned<Gym>> {
        let command = GymCommand::RemovePlan {
            name,
            occurred_at: self.ctx.now(),
        };
        self.mutate(actor, id, Action::ManageGymPlans, precondition, command).await
    }

    /// Store the blob with the object-storage collaborator and attach its URL.
    pub async fn upload_photo(
        &self,
        actor: &Actor,
        id: GymId,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ServiceResult<Versioned<Gym>> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, Action::UploadGymPhoto, scope(&gym.document), None)?;

        let url = self.ctx.storage.put(&format!("gyms/{id}"), content_type, bytes).await?;
        let command = GymCommand::AttachPhoto {
            url: url.clone(),
            occurred_at: self.ctx.now(),
        };
        match self.ctx.commit_gym(gym, command).await {
            Ok((saved, _)) => Ok(saved),
            Err(e) => {
                // Nothing references the blob yet.
                if let Err(cleanup) = self.ctx.storage.delete(&url).await {
                    tracing::warn!(gym = %id, %url, error = %cleanup, "orphaned gym photo left in storage");
                }
                Err(e)
            }
        }
    }

    /// Throw away the roster index and derive it again from the stored gyms.
    pub async fn rebuild_index(&self, actor: &Actor) -> ServiceResult<usize> {
        ensure_allowed(actor, Action::RebuildIndex, None, None)?;
        let gyms = self.ctx.gyms.find(&Filter::all()).await?;
        Ok(self.ctx.roster.rebuild(gyms.iter().map(|g| &g.document)))
    }

    /// Load, authorize, check the client precondition, commit.
    async fn mutate(
        &self,
        actor: &Actor,
        id: GymId,
        action: Action,
        precondition: ExpectedVersion,
        command: GymCommand,
    ) -> ServiceResult<Versioned<Gym>> {
        let gym = self.ctx.load_gym(id).await?;
        ensure_allowed(actor, action, scope(&gym.document), None)?;
        precondition.check(gym.revision)?;
        let (saved, _) = self.ctx.commit_gym(gym, command).await?;
        Ok(saved)
    }
}
