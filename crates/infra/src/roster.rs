//! Roster index: user → gym back-references.
//!
//! The gym document owns its trainer and member lists. This projection keeps
//! the reverse lookup ("which gyms does this user own / train at / belong
//! to") derived from committed [`GymEvent`]s, so it can never disagree with
//! the gyms for longer than one publish, and can always be rebuilt from them.
//!
//! Idempotent by aggregate version: an envelope whose sequence number is not
//! newer than the last one applied for that gym is ignored.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use gymhub_auth::GymScope;
use gymhub_core::{AggregateRoot, GymId, UserId};
use gymhub_events::{EventEnvelope, Projection};
use gymhub_gyms::{Gym, GymEvent};

/// Back-references of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserLinks {
    pub gyms_owned: BTreeSet<GymId>,
    pub trainer_gyms: BTreeSet<GymId>,
    pub member_gym: Option<GymId>,
}

impl UserLinks {
    fn is_empty(&self) -> bool {
        self.gyms_owned.is_empty() && self.trainer_gyms.is_empty() && self.member_gym.is_none()
    }

    fn forget(&mut self, gym: GymId) {
        self.gyms_owned.remove(&gym);
        self.trainer_gyms.remove(&gym);
        if self.member_gym == Some(gym) {
            self.member_gym = None;
        }
    }

    fn gyms(&self) -> impl Iterator<Item = GymId> + '_ {
        self.gyms_owned
            .iter()
            .chain(self.trainer_gyms.iter())
            .copied()
            .chain(self.member_gym)
    }
}

#[derive(Debug, Default)]
struct State {
    links: HashMap<UserId, UserLinks>,
    applied: HashMap<GymId, u64>,
}

impl State {
    fn entry(&mut self, user: UserId) -> &mut UserLinks {
        self.links.entry(user).or_default()
    }

    fn update(&mut self, user: UserId, f: impl FnOnce(&mut UserLinks)) {
        if let Some(links) = self.links.get_mut(&user) {
            f(links);
            if links.is_empty() {
                self.links.remove(&user);
            }
        }
    }

    fn index_gym(&mut self, gym: &Gym) {
        let id = gym.id_typed();
        self.entry(gym.owner_id()).gyms_owned.insert(id);
        for trainer in gym.trainers() {
            self.entry(*trainer).trainer_gyms.insert(id);
        }
        for member in gym.members() {
            self.entry(*member).member_gym = Some(id);
        }
        self.applied.insert(id, gym.version());
    }
}

/// In-process reverse index over gym rosters.
#[derive(Debug, Default)]
pub struct RosterIndex {
    state: RwLock<State>,
}

impl RosterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        // The state is only mutated through whole-event updates, so a panic
        // mid-write cannot leave it half-applied.
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Back-references of `user` (empty when the user is on no roster).
    pub fn links(&self, user: UserId) -> UserLinks {
        self.read().links.get(&user).cloned().unwrap_or_default()
    }

    /// Last applied gym version, if the gym has been seen.
    pub fn applied_version(&self, gym: GymId) -> Option<u64> {
        self.read().applied.get(&gym).copied()
    }

    /// Replace the whole index with one derived from live gyms.
    pub fn rebuild<'a>(&self, gyms: impl IntoIterator<Item = &'a Gym>) -> usize {
        let mut fresh = State::default();
        let mut count = 0;
        for gym in gyms.into_iter().filter(|g| g.is_live()) {
            fresh.index_gym(gym);
            count += 1;
        }
        *self.write() = fresh;
        tracing::info!(gyms = count, "roster index rebuilt");
        count
    }

    /// Back-references pointing at gyms outside `live`.
    pub fn dangling(&self, live: &HashSet<GymId>) -> Vec<(UserId, GymId)> {
        let state = self.read();
        let mut found: Vec<(UserId, GymId)> = state
            .links
            .iter()
            .flat_map(|(user, links)| links.gyms().map(move |gym| (*user, gym)))
            .filter(|(_, gym)| !live.contains(gym))
            .collect();
        found.sort();
        found
    }
}

impl Projection for RosterIndex {
    type Ev = GymEvent;

    fn apply(&self, envelope: &EventEnvelope<GymEvent>) {
        let event = envelope.payload();
        let gym = event.gym_id();
        let seq = envelope.sequence_number();

        let mut state = self.write();
        if state.applied.get(&gym).is_some_and(|applied| seq <= *applied) {
            tracing::debug!(%gym, seq, "roster index skipped replayed event");
            return;
        }

        match event {
            GymEvent::Created { owner_id, .. } => {
                state.entry(*owner_id).gyms_owned.insert(gym);
            }
            GymEvent::TrainerAssigned { trainer_id, .. } => {
                state.entry(*trainer_id).trainer_gyms.insert(gym);
            }
            GymEvent::TrainerRemoved { trainer_id, .. } => {
                state.update(*trainer_id, |links| {
                    links.trainer_gyms.remove(&gym);
                });
            }
            GymEvent::MemberAdded { member_id, .. } => {
                state.entry(*member_id).member_gym = Some(gym);
            }
            GymEvent::MemberRemoved { member_id, .. } => {
                state.update(*member_id, |links| {
                    if links.member_gym == Some(gym) {
                        links.member_gym = None;
                    }
                });
            }
            GymEvent::Deleted {
                owner_id,
                trainers,
                members,
                ..
            } => {
                for user in std::iter::once(owner_id).chain(trainers).chain(members) {
                    state.update(*user, |links| links.forget(gym));
                }
            }
            GymEvent::Updated { .. }
            | GymEvent::PlanAdded { .. }
            | GymEvent::PlanRemoved { .. }
            | GymEvent::PhotoAttached { .. } => {}
        }
        state.applied.insert(gym, seq);
    }
}
