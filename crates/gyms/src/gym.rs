use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gymhub_auth::{GymScope, Role};
use gymhub_core::{
    Aggregate, AggregateRoot, DomainError, Entity, GymId, MembershipDuration, UserId,
};
use gymhub_events::Event;

/// Stream type used when publishing gym events.
pub const GYM_STREAM: &str = "gyms.gym";

/// A purchasable membership option offered by a gym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPlan {
    pub name: String,
    pub duration: MembershipDuration,
    /// Price in minor currency units.
    pub price_cents: u64,
}

/// Aggregate root: Gym.
///
/// Persisted as a snapshot document; `version` counts applied events and is
/// independent from the store revision used for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gym {
    id: GymId,
    owner_id: UserId,
    name: String,
    address: String,
    description: String,
    trainers: Vec<UserId>,
    members: Vec<UserId>,
    plans: Vec<MembershipPlan>,
    photos: Vec<String>,
    created_at: DateTime<Utc>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Gym {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: GymId) -> Self {
        Self {
            id,
            owner_id: UserId::from_uuid(Uuid::nil()),
            name: String::new(),
            address: String::new(),
            description: String::new(),
            trainers: Vec::new(),
            members: Vec::new(),
            plans: Vec::new(),
            photos: Vec::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> GymId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn trainers(&self) -> &[UserId] {
        &self.trainers
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn plans(&self) -> &[MembershipPlan] {
        &self.plans
    }

    pub fn plan(&self, name: &str) -> Option<&MembershipPlan> {
        self.plans.iter().find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn photos(&self) -> &[String] {
        &self.photos
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(DomainError::not_found("gym"))
        }
    }
}

impl AggregateRoot for Gym {
    type Id = GymId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for Gym {
    type Id = GymId;
    const COLLECTION: &'static str = "gyms";

    fn id(&self) -> GymId {
        self.id
    }
}

impl GymScope for Gym {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }

    fn has_trainer(&self, user: UserId) -> bool {
        self.trainers.contains(&user)
    }

    fn has_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }
}

/// Command: CreateGym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGym {
    pub gym_id: GymId,
    pub owner_id: UserId,
    /// Role of the owning user as recorded in the identity store.
    pub owner_role: Role,
    pub name: String,
    pub address: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateGym. `None` keeps the existing value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGym {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GymCommand {
    Create(CreateGym),
    Update {
        changes: UpdateGym,
        occurred_at: DateTime<Utc>,
    },
    AssignTrainer {
        trainer_id: UserId,
        trainer_role: Role,
        occurred_at: DateTime<Utc>,
    },
    RemoveTrainer {
        trainer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    AddMember {
        member_id: UserId,
        member_role: Role,
        occurred_at: DateTime<Utc>,
    },
    RemoveMember {
        member_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    AddPlan {
        plan: MembershipPlan,
        occurred_at: DateTime<Utc>,
    },
    RemovePlan {
        name: String,
        occurred_at: DateTime<Utc>,
    },
    AttachPhoto {
        url: String,
        occurred_at: DateTime<Utc>,
    },
    Delete {
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GymEvent {
    Created {
        gym_id: GymId,
        owner_id: UserId,
        name: String,
        address: String,
        description: String,
        occurred_at: DateTime<Utc>,
    },
    Updated {
        gym_id: GymId,
        name: String,
        address: String,
        description: String,
        occurred_at: DateTime<Utc>,
    },
    TrainerAssigned {
        gym_id: GymId,
        trainer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    TrainerRemoved {
        gym_id: GymId,
        trainer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    MemberAdded {
        gym_id: GymId,
        member_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    MemberRemoved {
        gym_id: GymId,
        member_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    PlanAdded {
        gym_id: GymId,
        plan: MembershipPlan,
        occurred_at: DateTime<Utc>,
    },
    PlanRemoved {
        gym_id: GymId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    PhotoAttached {
        gym_id: GymId,
        url: String,
        occurred_at: DateTime<Utc>,
    },
    /// Carries the roster at deletion time so back-references can be cleared
    /// without reading the (now gone) gym.
    Deleted {
        gym_id: GymId,
        owner_id: UserId,
        trainers: Vec<UserId>,
        members: Vec<UserId>,
        occurred_at: DateTime<Utc>,
    },
}

impl GymEvent {
    pub fn gym_id(&self) -> GymId {
        match self {
            GymEvent::Created { gym_id, .. }
            | GymEvent::Updated { gym_id, .. }
            | GymEvent::TrainerAssigned { gym_id, .. }
            | GymEvent::TrainerRemoved { gym_id, .. }
            | GymEvent::MemberAdded { gym_id, .. }
            | GymEvent::MemberRemoved { gym_id, .. }
            | GymEvent::PlanAdded { gym_id, .. }
            | GymEvent::PlanRemoved { gym_id, .. }
            | GymEvent::PhotoAttached { gym_id, .. }
            | GymEvent::Deleted { gym_id, .. } => *gym_id,
        }
    }
}

impl Event for GymEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GymEvent::Created { .. } => "gyms.gym.created",
            GymEvent::Updated { .. } => "gyms.gym.updated",
            GymEvent::TrainerAssigned { .. } => "gyms.gym.trainer_assigned",
            GymEvent::TrainerRemoved { .. } => "gyms.gym.trainer_removed",
            GymEvent::MemberAdded { .. } => "gyms.gym.member_added",
            GymEvent::MemberRemoved { .. } => "gyms.gym.member_removed",
            GymEvent::PlanAdded { .. } => "gyms.gym.plan_added",
            GymEvent::PlanRemoved { .. } => "gyms.gym.plan_removed",
            GymEvent::PhotoAttached { .. } => "gyms.gym.photo_attached",
            GymEvent::Deleted { .. } => "gyms.gym.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GymEvent::Created { occurred_at, .. }
            | GymEvent::Updated { occurred_at, .. }
            | GymEvent::TrainerAssigned { occurred_at, .. }
            | GymEvent::TrainerRemoved { occurred_at, .. }
            | GymEvent::MemberAdded { occurred_at, .. }
            | GymEvent::MemberRemoved { occurred_at, .. }
            | GymEvent::PlanAdded { occurred_at, .. }
            | GymEvent::PlanRemoved { occurred_at, .. }
            | GymEvent::PhotoAttached { occurred_at, .. }
            | GymEvent::Deleted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Gym {
    type Command = GymCommand;
    type Event = GymEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GymEvent::Created {
                gym_id,
                owner_id,
                name,
                address,
                description,
                occurred_at,
            } => {
                self.id = *gym_id;
                self.owner_id = *owner_id;
                self.name = name.clone();
                self.address = address.clone();
                self.description = description.clone();
                self.created_at = *occurred_at;
                self.created = true;
            }
            GymEvent::Updated {
                name,
                address,
                description,
                ..
            } => {
                self.name = name.clone();
                self.address = address.clone();
                self.description = description.clone();
            }
            GymEvent::TrainerAssigned { trainer_id, .. } => {
                if !self.trainers.contains(trainer_id) {
                    self.trainers.push(*trainer_id);
                }
            }
            GymEvent::TrainerRemoved { trainer_id, .. } => {
                self.trainers.retain(|t| t != trainer_id);
            }
            GymEvent::MemberAdded { member_id, .. } => {
                if !self.members.contains(member_id) {
                    self.members.push(*member_id);
                }
            }
            GymEvent::MemberRemoved { member_id, .. } => {
                self.members.retain(|m| m != member_id);
            }
            GymEvent::PlanAdded { plan, .. } => self.plans.push(plan.clone()),
            GymEvent::PlanRemoved { name, .. } => {
                self.plans.retain(|p| !p.name.eq_ignore_ascii_case(name));
            }
            GymEvent::PhotoAttached { url, .. } => self.photos.push(url.clone()),
            GymEvent::Deleted { .. } => {
                self.trainers.clear();
                self.members.clear();
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GymCommand::Create(cmd) => self.handle_create(cmd),
            GymCommand::Update {
                changes,
                occurred_at,
            } => self.handle_update(changes, *occurred_at),
            GymCommand::AssignTrainer {
                trainer_id,
                trainer_role,
                occurred_at,
            } => self.handle_assign_trainer(*trainer_id, *trainer_role, *occurred_at),
            GymCommand::RemoveTrainer {
                trainer_id,
                occurred_at,
            } => self.handle_remove_trainer(*trainer_id, *occurred_at),
            GymCommand::AddMember {
                member_id,
                member_role,
                occurred_at,
            } => self.handle_add_member(*member_id, *member_role, *occurred_at),
            GymCommand::RemoveMember {
                member_id,
                occurred_at,
            } => self.handle_remove_member(*member_id, *occurred_at),
            GymCommand::AddPlan { plan, occurred_at } => self.handle_add_plan(plan, *occurred_at),
            GymCommand::RemovePlan { name, occurred_at } => {
                self.handle_remove_plan(name, *occurred_at)
            }
            GymCommand::AttachPhoto { url, occurred_at } => {
                self.handle_attach_photo(url, *occurred_at)
            }
            GymCommand::Delete { occurred_at } => self.handle_delete(*occurred_at),
        }
    }
}

impl Gym {
    fn handle_create(&self, cmd: &CreateGym) -> Result<Vec<GymEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("gym already exists"));
        }
        if cmd.owner_role != Role::GymOwner {
            return Err(DomainError::invalid_target("gym owner must have role gym_owner"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![GymEvent::Created {
            gym_id: cmd.gym_id,
            owner_id: cmd.owner_id,
            name: name.to_string(),
            address: cmd.address.trim().to_string(),
            description: cmd.description.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update(&self, changes: &UpdateGym, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;

        let name = changes
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&self.name)
            .to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let address = changes
            .address
            .as_deref()
            .map_or_else(|| self.address.clone(), |a| a.trim().to_string());
        let description = changes
            .description
            .as_deref()
            .map_or_else(|| self.description.clone(), |d| d.trim().to_string());

        Ok(vec![GymEvent::Updated {
            gym_id: self.id,
            name,
            address,
            description,
            occurred_at,
        }])
    }

    fn handle_assign_trainer(
        &self,
        trainer_id: UserId,
        trainer_role: Role,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        if trainer_role != Role::Trainer {
            return Err(DomainError::invalid_target("user is not a trainer"));
        }
        if self.trainers.contains(&trainer_id) {
            return Err(DomainError::conflict("trainer already assigned to this gym"));
        }

        Ok(vec![GymEvent::TrainerAssigned {
            gym_id: self.id,
            trainer_id,
            occurred_at,
        }])
    }

    fn handle_remove_trainer(&self, trainer_id: UserId, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        if !self.trainers.contains(&trainer_id) {
            return Err(DomainError::conflict("trainer is not assigned to this gym"));
        }

        Ok(vec![GymEvent::TrainerRemoved {
            gym_id: self.id,
            trainer_id,
            occurred_at,
        }])
    }

    fn handle_add_member(
        &self,
        member_id: UserId,
        member_role: Role,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        if member_role != Role::Member {
            return Err(DomainError::invalid_target("user is not a member"));
        }
        if self.members.contains(&member_id) {
            return Err(DomainError::conflict("user is already a member of this gym"));
        }

        Ok(vec![GymEvent::MemberAdded {
            gym_id: self.id,
            member_id,
            occurred_at,
        }])
    }

    fn handle_remove_member(&self, member_id: UserId, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        if !self.members.contains(&member_id) {
            return Err(DomainError::conflict("user is not a member of this gym"));
        }

        Ok(vec![GymEvent::MemberRemoved {
            gym_id: self.id,
            member_id,
            occurred_at,
        }])
    }

    fn handle_add_plan(&self, plan: &MembershipPlan, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        let name = plan.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("plan name cannot be empty"));
        }
        if self.plan(name).is_some() {
            return Err(DomainError::conflict(format!("plan '{name}' already exists")));
        }

        Ok(vec![GymEvent::PlanAdded {
            gym_id: self.id,
            plan: MembershipPlan {
                name: name.to_string(),
                duration: plan.duration,
                price_cents: plan.price_cents,
            },
            occurred_at,
        }])
    }

    fn handle_remove_plan(&self, name: &str, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        let Some(plan) = self.plan(name) else {
            return Err(DomainError::not_found("plan"));
        };

        Ok(vec![GymEvent::PlanRemoved {
            gym_id: self.id,
            name: plan.name.clone(),
            occurred_at,
        }])
    }

    fn handle_attach_photo(&self, url: &str, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;
        if url.trim().is_empty() {
            return Err(DomainError::validation("photo url cannot be empty"));
        }

        Ok(vec![GymEvent::PhotoAttached {
            gym_id: self.id,
            url: url.trim().to_string(),
            occurred_at,
        }])
    }

    fn handle_delete(&self, occurred_at: DateTime<Utc>) -> Result<Vec<GymEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![GymEvent::Deleted {
            gym_id: self.id,
            owner_id: self.owner_id,
            trainers: self.trainers.clone(),
            members: self.members.clone(),
            occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_gym(owner: UserId) -> Gym {
        let id = GymId::new();
        let mut gym = Gym::empty(id);
        gym.execute(&GymCommand::Create(CreateGym {
            gym_id: id,
            owner_id: owner,
            owner_role: Role::GymOwner,
            name: "  Iron Temple ".into(),
            address: "1 Main St".into(),
            description: String::new(),
            occurred_at: now(),
        }))
        .unwrap();
        gym
    }

    fn assign(gym: &mut Gym, trainer: UserId) -> Result<Vec<GymEvent>, DomainError> {
        gym.execute(&GymCommand::AssignTrainer {
            trainer_id: trainer,
            trainer_role: Role::Trainer,
            occurred_at: now(),
        })
    }

    fn add_member(gym: &mut Gym, member: UserId) -> Result<Vec<GymEvent>, DomainError> {
        gym.execute(&GymCommand::AddMember {
            member_id: member,
            member_role: Role::Member,
            occurred_at: now(),
        })
    }

    #[test]
    fn create_emits_created_event_and_trims_name() {
        let owner = UserId::new();
        let gym = created_gym(owner);
        assert!(gym.is_live());
        assert_eq!(gym.name(), "Iron Temple");
        assert_eq!(GymScope::owner_id(&gym), owner);
        assert_eq!(gym.version(), 1);
    }

    #[test]
    fn create_requires_gym_owner_role() {
        let id = GymId::new();
        let gym = Gym::empty(id);
        let err = gym
            .handle(&GymCommand::Create(CreateGym {
                gym_id: id,
                owner_id: UserId::new(),
                owner_role: Role::Trainer,
                name: "Gym".into(),
                address: String::new(),
                description: String::new(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTarget(_)));
    }

    #[test]
    fn create_twice_conflicts() {
        let owner = UserId::new();
        let gym = created_gym(owner);
        let err = gym
            .handle(&GymCommand::Create(CreateGym {
                gym_id: gym.id_typed(),
                owner_id: owner,
                owner_role: Role::GymOwner,
                name: "Again".into(),
                address: String::new(),
                description: String::new(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn assigning_the_same_trainer_twice_conflicts_and_keeps_one_entry() {
        let mut gym = created_gym(UserId::new());
        let trainer = UserId::new();

        assign(&mut gym, trainer).unwrap();
        let err = assign(&mut gym, trainer).unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(gym.trainers(), &[trainer]);
    }

    #[test]
    fn assigning_a_non_trainer_is_invalid_target() {
        let mut gym = created_gym(UserId::new());
        let err = gym
            .execute(&GymCommand::AssignTrainer {
                trainer_id: UserId::new(),
                trainer_role: Role::Member,
                occurred_at: now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTarget(_)));
        assert!(gym.trainers().is_empty());
    }

    #[test]
    fn removing_an_absent_trainer_conflicts() {
        let mut gym = created_gym(UserId::new());
        let err = gym
            .execute(&GymCommand::RemoveTrainer {
                trainer_id: UserId::new(),
                occurred_at: now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn member_add_and_remove_are_symmetric() {
        let mut gym = created_gym(UserId::new());
        let member = UserId::new();

        add_member(&mut gym, member).unwrap();
        assert!(gym.has_member(member));
        assert!(matches!(add_member(&mut gym, member), Err(DomainError::Conflict(_))));

        gym.execute(&GymCommand::RemoveMember {
            member_id: member,
            occurred_at: now(),
        })
        .unwrap();
        assert!(!gym.has_member(member));
        assert!(matches!(
            gym.execute(&GymCommand::RemoveMember {
                member_id: member,
                occurred_at: now(),
            }),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn update_keeps_unset_fields_and_rejects_blank_name() {
        let mut gym = created_gym(UserId::new());
        gym.execute(&GymCommand::Update {
            changes: UpdateGym {
                description: Some("Open 24/7".into()),
                ..UpdateGym::default()
            },
            occurred_at: now(),
        })
        .unwrap();
        assert_eq!(gym.name(), "Iron Temple");
        assert_eq!(gym.description(), "Open 24/7");

        let err = gym
            .handle(&GymCommand::Update {
                changes: UpdateGym {
                    name: Some("  ".into()),
                    ..UpdateGym::default()
                },
                occurred_at: now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn plan_names_are_unique_case_insensitively() {
        let mut gym = created_gym(UserId::new());
        let plan = MembershipPlan {
            name: "Monthly".into(),
            duration: MembershipDuration::OneMonth,
            price_cents: 4_999,
        };
        gym.execute(&GymCommand::AddPlan {
            plan: plan.clone(),
            occurred_at: now(),
        })
        .unwrap();

        let dup = MembershipPlan {
            name: "monthly".into(),
            ..plan
        };
        let err = gym
            .execute(&GymCommand::AddPlan {
                plan: dup,
                occurred_at: now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(gym.plan("MONTHLY").map(|p| p.price_cents), Some(4_999));

        gym.execute(&GymCommand::RemovePlan {
            name: "monthly".into(),
            occurred_at: now(),
        })
        .unwrap();
        assert!(gym.plans().is_empty());
    }

    #[test]
    fn delete_carries_roster_and_blocks_further_commands() {
        let owner = UserId::new();
        let mut gym = created_gym(owner);
        let trainer = UserId::new();
        let member = UserId::new();
        assign(&mut gym, trainer).unwrap();
        add_member(&mut gym, member).unwrap();

        let events = gym.execute(&GymCommand::Delete { occurred_at: now() }).unwrap();
        match &events[0] {
            GymEvent::Deleted {
                trainers, members, ..
            } => {
                assert_eq!(trainers, &vec![trainer]);
                assert_eq!(members, &vec![member]);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(!gym.is_live());
        assert!(gym.trainers().is_empty());
        assert_eq!(assign(&mut gym, UserId::new()).unwrap_err(), DomainError::not_found("gym"));
    }

    #[test]
    fn snapshot_survives_serialization() {
        let mut gym = created_gym(UserId::new());
        assign(&mut gym, UserId::new()).unwrap();
        let json = serde_json::to_value(&gym).unwrap();
        let back: Gym = serde_json::from_value(json).unwrap();
        assert_eq!(back, gym);
    }

    proptest! {
        // Arbitrary assign/remove interleavings never produce duplicate entries.
        #[test]
        fn trainer_list_never_contains_duplicates(ops in prop::collection::vec((0usize..4, any::<bool>()), 0..40)) {
            let mut gym = created_gym(UserId::new());
            let pool: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
            for (idx, add) in ops {
                let trainer = pool[idx];
                let _ = if add {
                    assign(&mut gym, trainer)
                } else {
                    gym.execute(&GymCommand::RemoveTrainer { trainer_id: trainer, occurred_at: now() })
                };
            }
            let mut seen = gym.trainers().to_vec();
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), gym.trainers().len());
        }
    }
}
