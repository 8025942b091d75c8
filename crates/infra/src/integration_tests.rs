//! End-to-end service tests over the in-memory store.
//!
//! Pipeline under test: policy → aggregate → versioned write → roster index.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value as JsonValue;
    use uuid::Uuid;

    use gymhub_activity::PlanKind;
    use gymhub_auth::{Actor, Profile, Role, User};
    use gymhub_core::{ExpectedVersion, GymId, MembershipDuration, UserId};
    use gymhub_gyms::{Gym, UpdateGym};
    use gymhub_ledger::{RequestKind, RequestStatus};

    use crate::error::ServiceError;
    use crate::identity::BcryptHasher;
    use crate::services::{NewBooking, NewGym, NewPlan, NewRequest, RequestListing, Services, SignupInput};
    use crate::storage::InMemoryObjectStorage;
    use crate::store::{
        DocumentStore, Filter, InMemoryDocumentStore, Repository, StoreError, StoredDocument, Versioned,
    };

    /// Wraps the in-memory store and fails chosen writes on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryDocumentStore,
        fail_replace_in: Mutex<Option<&'static str>>,
        fail_insert_in: Mutex<Option<&'static str>>,
    }

    impl FlakyStore {
        fn fail_replaces_in(&self, collection: Option<&'static str>) {
            *self.fail_replace_in.lock().unwrap() = collection;
        }

        fn fail_inserts_in(&self, collection: Option<&'static str>) {
            *self.fail_insert_in.lock().unwrap() = collection;
        }

        fn injected() -> StoreError {
            StoreError::Backend {
                message: "injected failure".into(),
                transient: false,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<StoredDocument>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
            self.inner.find(collection, filter).await
        }

        async fn insert(&self, collection: &'static str, id: Uuid, body: JsonValue) -> Result<u64, StoreError> {
            if *self.fail_insert_in.lock().unwrap() == Some(collection) {
                return Err(Self::injected());
            }
            self.inner.insert(collection, id, body).await
        }

        async fn insert_unless(
            &self,
            collection: &'static str,
            id: Uuid,
            body: JsonValue,
            blocker: &Filter,
            conflict_message: &str,
        ) -> Result<u64, StoreError> {
            self.inner
                .insert_unless(collection, id, body, blocker, conflict_message)
                .await
        }

        async fn replace(
            &self,
            collection: &'static str,
            id: Uuid,
            body: JsonValue,
            expected: ExpectedVersion,
        ) -> Result<u64, StoreError> {
            if *self.fail_replace_in.lock().unwrap() == Some(collection) {
                return Err(Self::injected());
            }
            self.inner.replace(collection, id, body, expected).await
        }

        async fn delete(&self, collection: &'static str, id: Uuid, expected: ExpectedVersion) -> Result<(), StoreError> {
            self.inner.delete(collection, id, expected).await
        }
    }

    struct World {
        services: Services,
        store: Arc<FlakyStore>,
        storage: Arc<InMemoryObjectStorage>,
    }

    impl World {
        fn new() -> Self {
            let store = Arc::new(FlakyStore::default());
            let storage = Arc::new(InMemoryObjectStorage::new("memory://uploads"));
            let services = Services::new(store.clone(), Arc::new(BcryptHasher::new(4)), storage.clone());
            Self {
                services,
                store,
                storage,
            }
        }

        async fn user(&self, role: Role) -> Actor {
            let id = Uuid::now_v7();
            let view = self
                .services
                .users
                .signup(SignupInput {
                    email: format!("{id}@example.com"),
                    password: "long enough".into(),
                    role,
                    profile: Profile {
                        name: format!("{role} {id}"),
                        ..Profile::default()
                    },
                })
                .await
                .unwrap();
            Actor::new(view.user.id, view.user.role)
        }

        /// The super-role is provisioned out of band, straight into the store.
        async fn super_owner(&self) -> Actor {
            let now = Utc::now();
            let user = User {
                id: UserId::new(),
                email: format!("{}@example.com", Uuid::now_v7()),
                credential_hash: String::new(),
                role: Role::Owner,
                profile: Profile {
                    name: "Root".into(),
                    ..Profile::default()
                },
                created_at: now,
                updated_at: now,
            };
            let repo: Repository<User> = Repository::new(self.store.clone());
            let saved = repo.insert(user).await.unwrap();
            Actor::new(saved.document.id, Role::Owner)
        }

        async fn gym(&self, owner: &Actor) -> GymId {
            self.services
                .gyms
                .create(
                    owner,
                    NewGym {
                        name: "Iron Temple".into(),
                        address: "1 Main St".into(),
                        description: String::new(),
                    },
                )
                .await
                .unwrap()
                .document
                .id_typed()
        }

        async fn gym_doc(&self, owner: &Actor, id: GymId) -> Versioned<Gym> {
            self.services.gyms.get(owner, id).await.unwrap()
        }

        async fn join(&self, member: &Actor, gym: GymId) -> gymhub_core::RequestId {
            self.services
                .ledger
                .create_request(member, join_request(gym))
                .await
                .unwrap()
                .document
                .id_typed()
        }
    }

    fn join_request(gym_id: GymId) -> NewRequest {
        NewRequest {
            gym_id,
            kind: RequestKind::JoinGym,
            plan_name: None,
            duration: None,
            trainer_id: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn assigning_a_trainer_twice_conflicts_and_keeps_one_entry() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;

        w.services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        let err = w
            .services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        let doc = w.gym_doc(&owner, gym).await;
        assert_eq!(doc.document.trainers().iter().filter(|t| **t == trainer.id).count(), 1);
        assert!(w.services.roster().links(trainer.id).trainer_gyms.contains(&gym));
    }

    #[tokio::test]
    async fn assigning_a_non_trainer_is_an_invalid_target() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;

        let err = w
            .services
            .gyms
            .assign_trainer(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn only_the_owning_gym_owner_mutates_and_missing_gyms_are_not_found() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let stranger = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;

        let err = w
            .services
            .gyms
            .assign_trainer(&stranger, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden("Access denied".into()));

        let err = w
            .services
            .gyms
            .assign_trainer(&stranger, GymId::new(), trainer.id, ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("gym".into()));

        let member = w.user(Role::Member).await;
        let err = w
            .services
            .gyms
            .create(&member, NewGym::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn super_role_may_mutate_any_gym() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let root = w.super_owner().await;
        let trainer = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;

        w.services
            .gyms
            .assign_trainer(&root, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        let updated = w
            .services
            .gyms
            .update(
                &root,
                gym,
                UpdateGym {
                    name: Some("Renamed".into()),
                    ..UpdateGym::default()
                },
                ExpectedVersion::Any,
            )
            .await
            .unwrap();
        assert_eq!(updated.document.name(), "Renamed");
    }

    #[tokio::test]
    async fn duplicate_pending_request_conflicts_until_resolved() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;

        let first = w.join(&member, gym).await;
        let err = w
            .services
            .ledger
            .create_request(&member, join_request(gym))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        w.services.ledger.deny_request(&owner, first).await.unwrap();
        w.services
            .ledger
            .create_request(&member, join_request(gym))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn request_role_must_match_kind() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;

        let err = w
            .services
            .ledger
            .create_request(&trainer, join_request(gym))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn accepting_a_join_request_adds_the_member_once_and_grants_a_membership() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .add_plan(&owner, gym, "Quarterly".into(), MembershipDuration::ThreeMonths, 9900, ExpectedVersion::Any)
            .await
            .unwrap();

        let request = w
            .services
            .ledger
            .create_request(
                &member,
                NewRequest {
                    plan_name: Some("quarterly".into()),
                    ..join_request(gym)
                },
            )
            .await
            .unwrap()
            .document
            .id_typed();

        let start = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let accepted = w
            .services
            .ledger
            .accept_request(&owner, request, Some(start))
            .await
            .unwrap();
        assert_eq!(accepted.document.status(), RequestStatus::Accepted);

        let doc = w.gym_doc(&owner, gym).await;
        assert_eq!(doc.document.members(), &[member.id]);
        assert_eq!(w.services.roster().links(member.id).member_gym, Some(gym));

        let memberships = w.services.ledger.my_memberships(&member).await.unwrap();
        assert_eq!(memberships.len(), 1);
        let m = &memberships[0].document;
        assert_eq!(m.request_id, Some(request));
        assert_eq!(m.end_date, Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap());
        assert_eq!(m.plan.as_ref().map(|p| p.price_cents), Some(9900));

        let err = w
            .services
            .ledger
            .accept_request(&owner, request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(w.gym_doc(&owner, gym).await.document.members().len(), 1);
    }

    #[tokio::test]
    async fn trainer_applications_are_reviewed_by_the_owner_only() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let staff = w.user(Role::Trainer).await;
        let applicant = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .assign_trainer(&owner, gym, staff.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let request = w
            .services
            .ledger
            .create_request(
                &applicant,
                NewRequest {
                    kind: RequestKind::ApplyTrainer,
                    ..join_request(gym)
                },
            )
            .await
            .unwrap()
            .document
            .id_typed();

        let err = w
            .services
            .ledger
            .accept_request(&staff, request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        w.services.ledger.accept_request(&owner, request, None).await.unwrap();
        assert!(w.gym_doc(&owner, gym).await.document.trainers().contains(&applicant.id));
    }

    #[tokio::test]
    async fn failed_status_write_compensates_and_the_retry_succeeds() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        let request = w.join(&member, gym).await;

        w.store.fail_replaces_in(Some("requests"));
        let err = w
            .services
            .ledger
            .accept_request(&owner, request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        // Roster change and membership were rolled back; request still pending.
        assert!(w.gym_doc(&owner, gym).await.document.members().is_empty());
        assert_eq!(w.services.roster().links(member.id).member_gym, None);
        assert!(w.services.ledger.my_memberships(&member).await.unwrap().is_empty());
        let pending = w.services.ledger.get_request(&member, request).await.unwrap();
        assert!(pending.document.is_pending());

        w.store.fail_replaces_in(None);
        w.services.ledger.accept_request(&owner, request, None).await.unwrap();
        assert_eq!(w.gym_doc(&owner, gym).await.document.members(), &[member.id]);
        assert_eq!(w.services.ledger.my_memberships(&member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_membership_write_undoes_the_roster_change() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        let request = w.join(&member, gym).await;

        w.store.fail_inserts_in(Some("memberships"));
        w.services
            .ledger
            .accept_request(&owner, request, None)
            .await
            .unwrap_err();
        w.store.fail_inserts_in(None);

        assert!(w.gym_doc(&owner, gym).await.document.members().is_empty());
        assert!(w.services.ledger.get_request(&owner, request).await.unwrap().document.is_pending());
    }

    #[tokio::test]
    async fn a_member_belongs_to_one_gym() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let first = w.gym(&owner).await;
        let second = w.gym(&owner).await;

        let a = w.join(&member, first).await;
        w.services.ledger.accept_request(&owner, a, None).await.unwrap();

        let err = w
            .services
            .ledger
            .create_request(&member, join_request(second))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(w.services.ledger.my_requests(&member).await.unwrap().len(), 1);

        let err = w
            .services
            .gyms
            .add_member(&owner, second, member.id, ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn a_pending_join_elsewhere_blocks_every_way_onto_a_roster() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let (a, b, c) = (w.gym(&owner).await, w.gym(&owner).await, w.gym(&owner).await);

        let waiting = w.join(&member, b).await;
        let wanted = w.join(&member, a).await;

        let err = w
            .services
            .gyms
            .add_member(&owner, c, member.id, ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = w.services.ledger.accept_request(&owner, wanted, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(w.gym_doc(&owner, a).await.document.members().is_empty());
        assert!(w.services.ledger.get_request(&owner, wanted).await.unwrap().document.is_pending());
        assert!(w.services.ledger.my_memberships(&member).await.unwrap().is_empty());

        w.services.ledger.deny_request(&owner, waiting).await.unwrap();
        w.services.ledger.accept_request(&owner, wanted, None).await.unwrap();
        assert_eq!(w.gym_doc(&owner, a).await.document.members(), &[member.id]);
        assert_eq!(w.services.roster().links(member.id).member_gym, Some(a));
    }

    #[tokio::test]
    async fn removing_a_member_drops_their_memberships_at_that_gym() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let other = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;

        let request = w.join(&member, gym).await;
        w.services.ledger.accept_request(&owner, request, None).await.unwrap();
        let request = w.join(&other, gym).await;
        w.services.ledger.accept_request(&owner, request, None).await.unwrap();

        w.services
            .gyms
            .remove_member(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap();

        assert!(!w.gym_doc(&owner, gym).await.document.members().contains(&member.id));
        assert!(w.services.ledger.my_memberships(&member).await.unwrap().is_empty());
        let remaining = w.services.ledger.gym_memberships(&owner, gym).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].document.member_id, other.id);

        // Free to join elsewhere now.
        let elsewhere = w.gym(&owner).await;
        w.join(&member, elsewhere).await;
    }

    #[tokio::test]
    async fn stale_preconditions_are_concurrency_errors() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let gym = w.gym(&owner).await;
        let loaded = w.gym_doc(&owner, gym).await;

        w.services
            .gyms
            .update(
                &owner,
                gym,
                UpdateGym {
                    description: Some("first".into()),
                    ..UpdateGym::default()
                },
                ExpectedVersion::Exact(loaded.revision),
            )
            .await
            .unwrap();

        let err = w
            .services
            .gyms
            .update(
                &owner,
                gym,
                UpdateGym {
                    description: Some("second".into()),
                    ..UpdateGym::default()
                },
                ExpectedVersion::Exact(loaded.revision),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Concurrency(_)));
        assert_eq!(w.gym_doc(&owner, gym).await.document.description(), "first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_roster_writes_never_lose_an_update() {
        let w = Arc::new(World::new());
        let owner = w.user(Role::GymOwner).await;
        let gym = w.gym(&owner).await;
        let mut trainers = Vec::new();
        for _ in 0..8 {
            trainers.push(w.user(Role::Trainer).await);
        }

        let mut handles = Vec::new();
        for trainer in &trainers {
            let w = w.clone();
            let trainer = trainer.id;
            handles.push(tokio::spawn(async move {
                w.services
                    .gyms
                    .assign_trainer(&owner, gym, trainer, ExpectedVersion::Any)
                    .await
            }));
        }
        let mut assigned = HashSet::new();
        for (handle, trainer) in handles.into_iter().zip(&trainers) {
            match handle.await.unwrap() {
                Ok(_) => {
                    assigned.insert(trainer.id);
                }
                Err(ServiceError::Concurrency(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        // Every reported success is in the stored gym and in the index.
        let doc = w.gym_doc(&owner, gym).await;
        let stored: HashSet<UserId> = doc.document.trainers().iter().copied().collect();
        assert_eq!(stored, assigned);
        for trainer in &assigned {
            assert!(w.services.roster().links(*trainer).trainer_gyms.contains(&gym));
        }
    }

    #[tokio::test]
    async fn chat_follows_the_adjacency_rule() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let other_owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let trainer = w.user(Role::Trainer).await;
        let foreign_member = w.user(Role::Member).await;
        let foreign_trainer = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;
        let other = w.gym(&other_owner).await;

        let gyms = &w.services.gyms;
        gyms.add_member(&owner, gym, member.id, ExpectedVersion::Any).await.unwrap();
        gyms.assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any).await.unwrap();
        gyms.add_member(&other_owner, other, foreign_member.id, ExpectedVersion::Any)
            .await
            .unwrap();
        gyms.assign_trainer(&other_owner, other, foreign_trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let chat = &w.services.activity;
        chat.send_message(&member, gym, trainer.id, "hi coach").await.unwrap();

        let err = chat
            .send_message(&member, gym, foreign_member.id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = chat
            .send_message(&member, gym, foreign_trainer.id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = chat
            .send_message(&member, other, foreign_trainer.id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        chat.send_message(&trainer, gym, member.id, "hi back").await.unwrap();
        let thread = chat.conversation(&member, gym, trainer.id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "hi coach");

        chat.send_message(&owner, gym, member.id, "welcome").await.unwrap();
        // The member cannot write to the owner, but may read what the owner sent.
        assert!(chat.send_message(&member, gym, owner.id, "thanks").await.is_err());
        assert_eq!(chat.conversation(&member, gym, owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_gym_leaves_no_dangling_references() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let member = w.user(Role::Member).await;
        let waiting = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        let kept = w.gym(&owner).await;

        w.services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        let joined = w.join(&member, gym).await;
        w.services.ledger.accept_request(&owner, joined, None).await.unwrap();
        let pending = w.join(&waiting, gym).await;

        w.services.gyms.delete(&owner, gym, ExpectedVersion::Any).await.unwrap();

        let live: HashSet<GymId> = [kept].into_iter().collect();
        assert!(w.services.roster().dangling(&live).is_empty());
        assert_eq!(w.services.roster().links(member.id).member_gym, None);
        assert!(w.services.roster().links(trainer.id).trainer_gyms.is_empty());

        let err = w.services.gyms.get(&owner, gym).await.unwrap_err();
        assert_eq!(err, ServiceError::NotFound("gym".into()));
        assert!(w.services.ledger.my_memberships(&member).await.unwrap().is_empty());
        let denied = w.services.ledger.my_requests(&waiting).await.unwrap();
        assert_eq!(denied[0].document.id_typed(), pending);
        assert_eq!(denied[0].document.status(), RequestStatus::Denied);

        // Rebuilding from the store agrees with the incrementally maintained index.
        let root = w.super_owner().await;
        assert_eq!(w.services.gyms.rebuild_index(&root).await.unwrap(), 1);
        assert!(w.services.roster().dangling(&live).is_empty());
        assert!(w.services.roster().links(owner.id).gyms_owned.contains(&kept));
    }

    #[tokio::test]
    async fn index_rebuild_is_super_role_only_and_warm_up_restores_links() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .add_member(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let err = w.services.gyms.rebuild_index(&owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // A fresh process over the same store starts with an empty index.
        let restarted = Services::new(
            w.store.clone(),
            Arc::new(BcryptHasher::new(4)),
            Arc::new(InMemoryObjectStorage::new("memory://uploads")),
        );
        assert_eq!(restarted.roster().links(member.id).member_gym, None);
        assert_eq!(restarted.warm_up().await.unwrap(), 1);
        assert_eq!(restarted.roster().links(member.id).member_gym, Some(gym));
    }

    #[tokio::test]
    async fn signup_normalizes_email_and_rejects_duplicates_and_super_role() {
        let w = World::new();
        let input = |email: &str, role| SignupInput {
            email: email.into(),
            password: "long enough".into(),
            role,
            profile: Profile {
                name: "Sam".into(),
                ..Profile::default()
            },
        };

        let view = w.services.users.signup(input(" Sam@Example.com ", Role::Member)).await.unwrap();
        assert_eq!(view.user.email, "sam@example.com");

        let err = w.services.users.signup(input("sam@example.com", Role::Trainer)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = w.services.users.signup(input("root@example.com", Role::Owner)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = w
            .services
            .users
            .signup(SignupInput {
                password: "short".into(),
                ..input("new@example.com", Role::Member)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        w.services.users.verify_credentials("SAM@example.com", "long enough").await.unwrap();
        assert!(w.services.users.verify_credentials("sam@example.com", "wrong one!").await.is_err());
    }

    #[tokio::test]
    async fn workout_plans_answer_accepted_requests() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let member = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        w.services
            .gyms
            .add_member(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let request = w
            .services
            .ledger
            .create_request(
                &member,
                NewRequest {
                    kind: RequestKind::RequestWorkout,
                    trainer_id: Some(trainer.id),
                    ..join_request(gym)
                },
            )
            .await
            .unwrap()
            .document
            .id_typed();

        let plan = |request_id| NewPlan {
            kind: PlanKind::Workout,
            gym_id: gym,
            member_id: member.id,
            title: "Push/Pull".into(),
            content: "Day 1: push".into(),
            request_id: Some(request_id),
        };

        let err = w.services.activity.create_plan(&trainer, plan(request)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        w.services.ledger.accept_request(&trainer, request, None).await.unwrap();
        let created = w.services.activity.create_plan(&trainer, plan(request)).await.unwrap();
        assert_eq!(created.request_id, Some(request));
        assert_eq!(w.services.activity.my_plans(&member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn progress_logs_are_private_to_the_member_and_gym_staff() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let member = w.user(Role::Member).await;
        let outsider = w.user(Role::Trainer).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        w.services
            .gyms
            .add_member(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        w.services
            .activity
            .log_macros(
                &member,
                crate::services::NewMacroLog {
                    date: today,
                    calories: 2200,
                    protein_g: 150,
                    carbs_g: 250,
                    fat_g: 70,
                },
            )
            .await
            .unwrap();

        assert!(w.services.activity.log_macros(&trainer, crate::services::NewMacroLog {
            date: today,
            calories: 1,
            protein_g: 1,
            carbs_g: 1,
            fat_g: 1,
        })
        .await
        .is_err());

        assert_eq!(w.services.activity.macro_logs(&member, member.id).await.unwrap().len(), 1);
        assert_eq!(w.services.activity.macro_logs(&trainer, member.id).await.unwrap().len(), 1);
        assert_eq!(w.services.activity.macro_logs(&owner, member.id).await.unwrap().len(), 1);
        let err = w.services.activity.macro_logs(&outsider, member.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reviews_and_bookings_enforce_uniqueness() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let trainer = w.user(Role::Trainer).await;
        let member = w.user(Role::Member).await;
        let other = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .assign_trainer(&owner, gym, trainer.id, ExpectedVersion::Any)
            .await
            .unwrap();
        for m in [&member, &other] {
            w.services
                .gyms
                .add_member(&owner, gym, m.id, ExpectedVersion::Any)
                .await
                .unwrap();
        }

        let activity = &w.services.activity;
        activity.write_review(&member, gym, 5, "great").await.unwrap();
        let err = activity.write_review(&member, gym, 4, "again").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(activity.reviews(&owner, gym).await.unwrap().len(), 1);

        let start = Utc::now() + Duration::days(1);
        let booking = |from: i64, to: i64| NewBooking {
            trainer_id: trainer.id,
            starts_at: start + Duration::hours(from),
            ends_at: start + Duration::hours(to),
            note: None,
        };
        let first = activity.book_session(&member, gym, booking(0, 1)).await.unwrap();
        let err = activity.book_session(&other, gym, booking(0, 2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        activity.book_session(&other, gym, booking(1, 2)).await.unwrap();

        assert_eq!(activity.bookings(&owner, gym).await.unwrap().len(), 2);
        assert_eq!(activity.bookings(&member, gym).await.unwrap().len(), 1);

        let err = activity.cancel_booking(&other, first.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        activity.cancel_booking(&trainer, first.id).await.unwrap();
        let err = activity.cancel_booking(&member, first.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        activity.book_session(&other, gym, booking(0, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn announcements_are_posted_by_the_owner_and_read_by_the_roster() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let member = w.user(Role::Member).await;
        let outsider = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;
        w.services
            .gyms
            .add_member(&owner, gym, member.id, ExpectedVersion::Any)
            .await
            .unwrap();

        let activity = &w.services.activity;
        assert!(activity.post_announcement(&member, gym, "Hi", "body").await.is_err());
        activity.post_announcement(&owner, gym, "Closed Monday", "Holiday").await.unwrap();
        assert_eq!(activity.announcements(&member, gym).await.unwrap().len(), 1);
        assert!(activity.announcements(&outsider, gym).await.is_err());
    }

    #[tokio::test]
    async fn gym_photos_go_through_object_storage() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let gym = w.gym(&owner).await;

        let saved = w
            .services
            .gyms
            .upload_photo(&owner, gym, "image/jpeg", vec![0xFF, 0xD8])
            .await
            .unwrap();
        assert_eq!(saved.document.photos().len(), 1);
        assert!(saved.document.photos()[0].starts_with(&format!("memory://uploads/gyms/{gym}/")));

        let err = w
            .services
            .gyms
            .upload_photo(&owner, gym, "image/jpeg", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(w.storage.len(), 1);
    }

    #[tokio::test]
    async fn a_photo_whose_gym_write_fails_is_removed_from_storage() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let gym = w.gym(&owner).await;

        w.store.fail_replaces_in(Some("gyms"));
        let err = w
            .services
            .gyms
            .upload_photo(&owner, gym, "image/jpeg", vec![0xFF, 0xD8])
            .await
            .unwrap_err();
        w.store.fail_replaces_in(None);

        assert!(matches!(err, ServiceError::Internal(_)));
        assert!(w.storage.is_empty());
        assert!(w.gym_doc(&owner, gym).await.document.photos().is_empty());
    }

    #[tokio::test]
    async fn gym_requests_can_be_filtered_to_pending() {
        let w = World::new();
        let owner = w.user(Role::GymOwner).await;
        let a = w.user(Role::Member).await;
        let b = w.user(Role::Member).await;
        let gym = w.gym(&owner).await;

        let first = w.join(&a, gym).await;
        w.join(&b, gym).await;
        w.services.ledger.deny_request(&owner, first).await.unwrap();

        let all = w.services.ledger.gym_requests(&owner, gym, RequestListing::All).await.unwrap();
        let pending = w
            .services
            .ledger
            .gym_requests(&owner, gym, RequestListing::PendingOnly)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(pending.len(), 1);

        let err = w.services.ledger.get_request(&b, first).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
