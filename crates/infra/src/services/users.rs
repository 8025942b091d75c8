use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use gymhub_auth::{Actor, Profile, ProfileUpdate, Role, User, normalize_email};
use gymhub_core::{ExpectedVersion, UserId};

use super::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::roster::UserLinks;
use crate::store::{Filter, Versioned};

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub profile: Profile,
}

/// A user together with the derived roster back-references.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: PublicUser,
    #[serde(flatten)]
    pub links: UserLinks,
}

/// User fields safe to return to callers (no credential hash).
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub profile: Profile,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            profile: user.profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    ctx: Arc<ServiceContext>,
}

impl UserService {
    pub(crate) fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Register a new identity. Emails are unique after normalization.
    pub async fn signup(&self, input: SignupInput) -> ServiceResult<UserView> {
        let now = self.ctx.now();
        // Validate before paying for the hash.
        let mut user = User::register(UserId::new(), &input.email, String::new(), input.role, input.profile, now)?;

        let hasher = self.ctx.hasher.clone();
        let password = input.password;
        user.credential_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::internal(format!("hashing task failed: {e}")))??;

        let blocker = Filter::new(json!({ "email": user.email }));
        let saved = self
            .ctx
            .users
            .insert_unless(user, &blocker, "email is already registered")
            .await?;

        tracing::info!(user = %saved.document.id, role = %saved.document.role, "user signed up");
        Ok(self.view(saved.document))
    }

    /// Check an email/password pair against the stored hash.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> ServiceResult<UserView> {
        let email = normalize_email(email)?;
        let found = self.ctx.users.find(&Filter::new(json!({ "email": email }))).await?;
        let Some(Versioned { document: user, .. }) = found.into_iter().next() else {
            return Err(ServiceError::forbidden("invalid credentials"));
        };

        let hasher = self.ctx.hasher.clone();
        let password = password.to_string();
        let hash = user.credential_hash.clone();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| ServiceError::internal(format!("hashing task failed: {e}")))??;
        if !valid {
            return Err(ServiceError::forbidden("invalid credentials"));
        }
        Ok(self.view(user))
    }

    /// Any authenticated caller may look up a user.
    pub async fn get(&self, _actor: &Actor, id: UserId) -> ServiceResult<UserView> {
        let user = self.ctx.load_user(id).await?;
        Ok(self.view(user.document))
    }

    pub async fn me(&self, actor: &Actor) -> ServiceResult<UserView> {
        self.get(actor, actor.id).await
    }

    /// Users only edit their own profile.
    pub async fn update_profile(&self, actor: &Actor, update: ProfileUpdate) -> ServiceResult<UserView> {
        let Versioned { revision, mut document } = self.ctx.load_user(actor.id).await?;
        document.apply_profile_update(update, self.ctx.now())?;
        let saved = self
            .ctx
            .users
            .replace(document, ExpectedVersion::Exact(revision))
            .await?;
        tracing::info!(user = %actor.id, "profile updated");
        Ok(self.view(saved.document))
    }

    fn view(&self, user: User) -> UserView {
        let links = self.ctx.roster.links(user.id);
        UserView {
            user: user.into(),
            links,
        }
    }
}
