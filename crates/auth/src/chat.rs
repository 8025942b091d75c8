//! Chat adjacency: which role pairs may message each other inside a gym.
//!
//! | sender     | may message                          |
//! |------------|--------------------------------------|
//! | member     | trainers of own gym                  |
//! | trainer    | members of own gym, or the gym owner |
//! | gym_owner  | trainers and members of own gym      |
//! | owner      | anyone                               |

use serde::{Deserialize, Serialize};

use gymhub_core::UserId;

use crate::{Decision, GymScope, Role};

/// One side of a conversation, with the role taken from the identity store
/// (sender) or token (actor).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub role: Role,
}

impl Participant {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Decide whether `sender` may message `receiver` inside `gym`.
pub fn check_adjacency(gym: &dyn GymScope, sender: &Participant, receiver: &Participant) -> Decision {
    match sender.role {
        Role::Owner => Decision::Allow,
        Role::Member => {
            if !gym.has_member(sender.id) {
                return Decision::deny("sender is not a member of this gym");
            }
            if receiver.role == Role::Trainer && gym.has_trainer(receiver.id) {
                Decision::Allow
            } else {
                Decision::deny("members may only message trainers of their gym")
            }
        }
        Role::Trainer => {
            if !gym.has_trainer(sender.id) {
                return Decision::deny("sender is not a trainer of this gym");
            }
            let to_member = receiver.role == Role::Member && gym.has_member(receiver.id);
            let to_owner = receiver.role == Role::GymOwner && gym.owner_id() == receiver.id;
            if to_member || to_owner {
                Decision::Allow
            } else {
                Decision::deny("trainers may only message members or the owner of their gym")
            }
        }
        Role::GymOwner => {
            if gym.owner_id() != sender.id {
                return Decision::deny("sender does not own this gym");
            }
            let allowed = match receiver.role {
                Role::Trainer => gym.has_trainer(receiver.id),
                Role::Member => gym.has_member(receiver.id),
                Role::Owner | Role::GymOwner => false,
            };
            if allowed {
                Decision::Allow
            } else {
                Decision::deny("gym owners may only message trainers and members of their gym")
            }
        }
    }
}

/// Decide whether `reader` may read the conversation with `peer`.
///
/// A conversation is readable when either direction is an allowed pair, so a
/// member can read what the gym owner sent them.
pub fn check_conversation(gym: &dyn GymScope, reader: &Participant, peer: &Participant) -> Decision {
    let forward = check_adjacency(gym, reader, peer);
    if forward.is_allowed() {
        return forward;
    }
    if check_adjacency(gym, peer, reader).is_allowed() && gym.includes(reader.id) {
        return Decision::Allow;
    }
    forward
}
