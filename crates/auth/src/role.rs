use serde::{Deserialize, Serialize};

use gymhub_core::DomainError;

/// Role tag carried by every user and every verified token.
///
/// Canonical spelling is snake_case (`gym_owner`); the PascalCase spellings
/// found in older tokens are accepted on input and never emitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Super-role: allowed every action irrespective of gym ownership.
    #[serde(alias = "Owner")]
    Owner,
    #[serde(alias = "GymOwner")]
    GymOwner,
    #[serde(alias = "Trainer")]
    Trainer,
    #[serde(alias = "Member")]
    Member,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::GymOwner, Role::Trainer, Role::Member];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::GymOwner => "gym_owner",
            Role::Trainer => "trainer",
            Role::Member => "member",
        }
    }

    pub fn is_super(self) -> bool {
        self == Role::Owner
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" | "Owner" => Ok(Role::Owner),
            "gym_owner" | "GymOwner" => Ok(Role::GymOwner),
            "trainer" | "Trainer" => Ok(Role::Trainer),
            "member" | "Member" => Ok(Role::Member),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_spellings_parse_to_canonical_roles() {
        assert_eq!("GymOwner".parse::<Role>().unwrap(), Role::GymOwner);
        assert_eq!("gym_owner".parse::<Role>().unwrap(), Role::GymOwner);
        let role: Role = serde_json::from_str("\"Owner\"").unwrap();
        assert_eq!(role, Role::Owner);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"owner\"");
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("admin".parse::<Role>().is_err());
        assert!(serde_json::from_str::<Role>("\"GYM_OWNER\"").is_err());
    }
}
