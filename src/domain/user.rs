//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{ROLE_ADMIN, ROLE_FACULTY, ROLE_GUEST, ROLE_MANAGER, ROLE_STUDENT};

/// User roles enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    Faculty,
    Student,
    Guest,
}

impl UserRole {
    /// Check if this role has admin privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Roles that may be assigned as infrastructure managers
    pub fn can_manage_infrastructure(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    /// Parse a stored role string; unknown values fall back to the least privileged role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ROLE_ADMIN => Some(UserRole::Admin),
            ROLE_MANAGER => Some(UserRole::Manager),
            ROLE_FACULTY => Some(UserRole::Faculty),
            ROLE_STUDENT => Some(UserRole::Student),
            ROLE_GUEST => Some(UserRole::Guest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => ROLE_ADMIN,
            UserRole::Manager => ROLE_MANAGER,
            UserRole::Faculty => ROLE_FACULTY,
            UserRole::Student => ROLE_STUDENT,
            UserRole::Guest => ROLE_GUEST,
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        UserRole::parse(s).unwrap_or(UserRole::Guest)
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub email_notifications: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete timestamp (None = active, Some = deleted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Check if user has admin role
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check if user is soft deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether status-change emails should be sent to this user
    pub fn wants_notifications(&self) -> bool {
        self.email_notifications && !self.is_deleted()
    }
}

/// Canonical form used to store and compare email addresses
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The authenticated caller of a service operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "student")]
    pub role: String,
    pub email_notifications: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role.to_string(),
            email_notifications: user.email_notifications,
            is_verified: user.is_verified,
            created_at: user.created_at,
            deleted_at: user.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_strings() {
        for role in [
            UserRole::Admin,
            UserRole::Manager,
            UserRole::Faculty,
            UserRole::Student,
            UserRole::Guest,
        ] {
            assert_eq!(UserRole::from(role.as_str()), role);
        }
    }

    #[test]
    fn test_unknown_role_is_least_privileged() {
        assert_eq!(UserRole::from("superuser"), UserRole::Guest);
        assert!(UserRole::parse("superuser").is_none());
    }

    #[test]
    fn test_manager_capability() {
        assert!(UserRole::Admin.can_manage_infrastructure());
        assert!(UserRole::Manager.can_manage_infrastructure());
        assert!(!UserRole::Faculty.can_manage_infrastructure());
        assert!(!UserRole::Student.can_manage_infrastructure());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
