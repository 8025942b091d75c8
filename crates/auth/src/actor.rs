use serde::{Deserialize, Serialize};

use gymhub_core::UserId;

use crate::Role;

/// The authenticated caller of an operation, as resolved from a verified token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_super(&self) -> bool {
        self.role.is_super()
    }
}

/// Read-only view of a gym's roster, as seen by the policy.
///
/// Implemented by the gym aggregate; the policy never needs anything else
/// from it.
pub trait GymScope {
    fn owner_id(&self) -> UserId;

    fn has_trainer(&self, user: UserId) -> bool;

    fn has_member(&self, user: UserId) -> bool;

    /// Whether `user` occupies any slot (owner, trainer or member).
    fn includes(&self, user: UserId) -> bool {
        self.owner_id() == user || self.has_trainer(user) || self.has_member(user)
    }
}
