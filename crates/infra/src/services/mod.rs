//! Application services.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! load referenced documents → not-found check → policy → pure aggregate
//! decision → versioned write → roster index update
//! ```
//!
//! Services are cheap to clone; they share one [`ServiceContext`].

mod activity;
mod gyms;
mod ledger;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};

use gymhub_activity::{Announcement, Booking, BodyLog, MacroLog, Message, Plan, Review};
use gymhub_auth::{Action, Actor, GymScope, User, authorize};
use gymhub_core::{Aggregate, AggregateRoot, ExpectedVersion, GymId, UserId};
use gymhub_events::{EventEnvelope, Projection};
use gymhub_gyms::{GYM_STREAM, Gym, GymCommand, GymEvent};
use gymhub_ledger::{Membership, Request, RequestKind};

use crate::error::{ServiceError, ServiceResult};
use crate::identity::CredentialHasher;
use crate::roster::RosterIndex;
use crate::storage::ObjectStorage;
use crate::store::{DocumentStore, Filter, Repository, Versioned};

pub use activity::{ActivityService, NewBodyLog, NewBooking, NewMacroLog, NewPlan};
pub use gyms::{GymService, NewGym};
pub use ledger::{LedgerService, NewMembership, NewRequest, RequestListing};
pub use users::{PublicUser, SignupInput, UserService, UserView};

/// Shared state behind every service.
pub struct ServiceContext {
    pub(crate) users: Repository<User>,
    pub(crate) gyms: Repository<Gym>,
    pub(crate) requests: Repository<Request>,
    pub(crate) memberships: Repository<Membership>,
    pub(crate) messages: Repository<Message>,
    pub(crate) plans: Repository<Plan>,
    pub(crate) macro_logs: Repository<MacroLog>,
    pub(crate) body_logs: Repository<BodyLog>,
    pub(crate) reviews: Repository<Review>,
    pub(crate) bookings: Repository<Booking>,
    pub(crate) announcements: Repository<Announcement>,
    pub(crate) roster: Arc<RosterIndex>,
    pub(crate) hasher: Arc<dyn CredentialHasher>,
    pub(crate) storage: Arc<dyn ObjectStorage>,
    /// Serializes gym commits so index updates are applied in commit order.
    gym_commits: Mutex<()>,
    /// Serializes the overlap check and insert of bookings.
    pub(crate) booking_slots: Mutex<()>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hasher: Arc<dyn CredentialHasher>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            users: Repository::new(store.clone()),
            gyms: Repository::new(store.clone()),
            requests: Repository::new(store.clone()),
            memberships: Repository::new(store.clone()),
            messages: Repository::new(store.clone()),
            plans: Repository::new(store.clone()),
            macro_logs: Repository::new(store.clone()),
            body_logs: Repository::new(store.clone()),
            reviews: Repository::new(store.clone()),
            bookings: Repository::new(store.clone()),
            announcements: Repository::new(store),
            roster: Arc::new(RosterIndex::new()),
            hasher,
            storage,
            gym_commits: Mutex::new(()),
            booking_slots: Mutex::new(()),
        }
    }

    pub(crate) async fn load_gym(&self, id: GymId) -> ServiceResult<Versioned<Gym>> {
        self.gyms
            .get(id)
            .await?
            .filter(|g| g.document.is_live())
            .ok_or_else(|| ServiceError::not_found("gym"))
    }

    pub(crate) async fn load_user(&self, id: UserId) -> ServiceResult<Versioned<User>> {
        self.users.get(id).await?.ok_or_else(|| ServiceError::not_found("user"))
    }

    /// Held by every gym commit. Roster checks that span several documents
    /// run under it.
    pub(crate) async fn roster_lock(&self) -> MutexGuard<'_, ()> {
        self.gym_commits.lock().await
    }

    /// Insert a freshly created gym and index it.
    pub(crate) async fn commit_new_gym(&self, gym: Gym, events: &[GymEvent]) -> ServiceResult<Versioned<Gym>> {
        let _commit = self.roster_lock().await;
        let saved = self.gyms.insert(gym).await?;
        self.publish(&saved.document, events);
        Ok(saved)
    }

    /// Run `command` against a loaded gym and persist the result.
    ///
    /// The write is guarded by the revision the gym was loaded at, so a
    /// concurrent commit in between surfaces as `Concurrency` instead of being
    /// overwritten. Deletion removes the document.
    pub(crate) async fn commit_gym(
        &self,
        loaded: Versioned<Gym>,
        command: GymCommand,
    ) -> ServiceResult<(Versioned<Gym>, Vec<GymEvent>)> {
        let Versioned { revision, mut document } = loaded;
        let events = document.execute(&command)?;

        let _commit = self.roster_lock().await;
        if let GymCommand::AddMember { member_id, .. } = &command {
            self.ensure_free_to_join(*member_id, document.id_typed()).await?;
        }

        let saved = if matches!(command, GymCommand::Delete { .. }) {
            self.gyms
                .delete(document.id_typed(), ExpectedVersion::Exact(revision))
                .await?;
            Versioned { revision, document }
        } else {
            self.gyms.replace(document, ExpectedVersion::Exact(revision)).await?
        };
        self.publish(&saved.document, &events);
        Ok((saved, events))
    }

    /// Every path that puts a user on a member roster goes through here: the
    /// user is on no other gym's roster and has no join request pending at
    /// another gym. Callers hold the roster lock.
    async fn ensure_free_to_join(&self, user: UserId, gym: GymId) -> ServiceResult<()> {
        self.ensure_not_member_elsewhere(user, gym).await?;
        let pending_elsewhere = self
            .requests
            .find(&Filter::new(json!({
                "requester_id": user,
                "kind": RequestKind::JoinGym,
                "status": "pending",
            })))
            .await?
            .into_iter()
            .any(|r| r.document.gym_id() != gym);
        if pending_elsewhere {
            return Err(ServiceError::conflict("user has a pending join request for another gym"));
        }
        Ok(())
    }

    /// A member belongs to at most one gym.
    pub(crate) async fn ensure_not_member_elsewhere(&self, user: UserId, gym: GymId) -> ServiceResult<()> {
        let elsewhere = self
            .gyms
            .find(&Filter::new(json!({ "members": [user] })))
            .await?
            .into_iter()
            .any(|g| g.document.id_typed() != gym);
        if elsewhere {
            return Err(ServiceError::conflict("user is already a member of another gym"));
        }
        Ok(())
    }

    /// Feed committed events to the roster index. `gym` is the state after
    /// the events; each event's sequence number is the version it produced.
    fn publish(&self, gym: &Gym, events: &[GymEvent]) {
        let first = gym.version() - events.len() as u64;
        for (i, event) in events.iter().enumerate() {
            let envelope = EventEnvelope::new(gym.id_typed(), GYM_STREAM, first + i as u64 + 1, event.clone());
            self.roster.apply(&envelope);
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Policy check folded into the service error taxonomy.
pub(crate) fn ensure_allowed(
    actor: &Actor,
    action: Action,
    gym: Option<&dyn GymScope>,
    target: Option<UserId>,
) -> ServiceResult<()> {
    authorize(actor, action, gym, target).into_result()?;
    Ok(())
}

pub(crate) fn scope(gym: &Gym) -> Option<&dyn GymScope> {
    Some(gym)
}

/// All services over one shared context.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub gyms: GymService,
    pub ledger: LedgerService,
    pub activity: ActivityService,
    context: Arc<ServiceContext>,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        hasher: Arc<dyn CredentialHasher>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let context = Arc::new(ServiceContext::new(store, hasher, storage));
        Self {
            users: UserService::new(context.clone()),
            gyms: GymService::new(context.clone()),
            ledger: LedgerService::new(context.clone()),
            activity: ActivityService::new(context.clone()),
            context,
        }
    }

    /// Derive the roster index from the gyms already in the store.
    pub async fn warm_up(&self) -> ServiceResult<usize> {
        let gyms = self.context.gyms.find(&Filter::all()).await?;
        Ok(self.context.roster.rebuild(gyms.iter().map(|g| &g.document)))
    }

    pub fn roster(&self) -> &RosterIndex {
        &self.context.roster
    }
}
