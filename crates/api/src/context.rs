use gymhub_auth::{Actor, Role};
use gymhub_core::UserId;

/// Authenticated caller of a request, resolved from the bearer token.
///
/// Inserted by the auth middleware; present for every protected route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
}

impl ActorContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.id
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }
}
