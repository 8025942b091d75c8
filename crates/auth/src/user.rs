//! Identity record.
//!
//! Users are created at signup, mutated on profile update and never
//! hard-deleted (historical requests, memberships and messages keep pointing
//! at them). Back-references to gyms are not stored here; they are derived by
//! the roster index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// Free-form profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Public URLs returned by object storage.
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Partial profile update. `None` leaves a field untouched; an empty
/// `phone`/`bio` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Opaque hash produced by the credential hasher; never serialized to clients.
    pub credential_hash: String,
    pub role: Role,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new identity record from signup input.
    ///
    /// The super-role cannot be self-assigned; it is provisioned out of band.
    pub fn register(
        id: UserId,
        email: &str,
        credential_hash: String,
        role: Role,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = normalize_email(email)?;
        if role.is_super() {
            return Err(DomainError::validation("role 'owner' cannot be self-assigned"));
        }
        let name = profile.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(Self {
            id,
            email,
            credential_hash,
            role,
            profile: Profile {
                name: name.to_string(),
                phone: non_empty(profile.phone),
                bio: non_empty(profile.bio),
                photos: profile.photos,
            },
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_profile_update(&mut self, update: ProfileUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            self.profile.name = name.to_string();
        }
        if let Some(phone) = update.phone {
            self.profile.phone = non_empty(Some(phone));
        }
        if let Some(bio) = update.bio {
            self.profile.bio = non_empty(Some(bio));
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;
    const COLLECTION: &'static str = "users";

    fn id(&self) -> UserId {
        self.id
    }
}

/// Trim + lowercase, with a basic shape check.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(email)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            ..Profile::default()
        }
    }

    fn register(email: &str, role: Role) -> DomainResult<User> {
        User::register(UserId::new(), email, "hash".into(), role, profile("Sam"), Utc::now())
    }

    #[test]
    fn register_normalizes_email() {
        let user = register("  Sam@Example.COM ", Role::Member).unwrap();
        assert_eq!(user.email, "sam@example.com");
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn register_rejects_malformed_email() {
        for email in ["", "sam", "@example.com", "sam@", "a@b@c"] {
            assert!(matches!(register(email, Role::Member), Err(DomainError::Validation(_))), "{email}");
        }
    }

    #[test]
    fn super_role_cannot_be_self_assigned() {
        let err = register("root@example.com", Role::Owner).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = User::register(
            UserId::new(),
            "a@b.c",
            "hash".into(),
            Role::Trainer,
            profile("   "),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }

    #[test]
    fn profile_update_trims_and_clears() {
        let mut user = register("a@b.c", Role::Trainer).unwrap();
        user.apply_profile_update(
            ProfileUpdate {
                name: Some("  Alex ".into()),
                phone: Some("555-0100".into()),
                bio: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(user.profile.name, "Alex");
        assert_eq!(user.profile.phone.as_deref(), Some("555-0100"));

        user.apply_profile_update(
            ProfileUpdate {
                phone: Some(String::new()),
                ..ProfileUpdate::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(user.profile.phone, None);
        assert_eq!(user.profile.name, "Alex");
    }

    #[test]
    fn profile_update_rejects_blank_name() {
        let mut user = register("a@b.c", Role::Member).unwrap();
        let err = user
            .apply_profile_update(
                ProfileUpdate {
                    name: Some(" ".into()),
                    ..ProfileUpdate::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(user.profile.name, "Sam");
    }
}
