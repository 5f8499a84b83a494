//! Authenticated identity attached to a request after token verification.

use serde::{Deserialize, Serialize};

/// Access role carried in the token and stored on the user row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Collaborator,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Collaborator => write!(f, "collaborator"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "collaborator" => Ok(Self::Collaborator),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Verified identity: numeric subject id plus role.
///
/// Handlers receive this as an explicit value; nothing downstream re-reads
/// the token or digs identity out of request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_roundtrip() {
        for role in [Role::Admin, Role::Collaborator, Role::User] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        let result: Result<Role, _> = "superuser".parse();
        assert!(result.is_err());
    }

    #[test]
    fn role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Collaborator).unwrap();
        assert_eq!(json, "\"collaborator\"");
        let back: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(back, Role::Admin);
    }

    #[test]
    fn principal_admin_check() {
        assert!(Principal::new(1, Role::Admin).is_admin());
        assert!(!Principal::new(2, Role::User).is_admin());
    }
}
