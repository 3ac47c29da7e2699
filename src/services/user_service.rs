//! User service - profiles and admin account management.
//!
//! Lookups exclude soft-deleted accounts unless stated otherwise.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::access::ensure_admin;
use crate::domain::{Actor, Password, User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    async fn me(&self, actor: Actor) -> AppResult<User>;

    async fn update_profile(&self, actor: Actor, name: String) -> AppResult<User>;

    /// Opt in or out of booking status emails
    async fn update_email_preferences(&self, actor: Actor, enabled: bool) -> AppResult<User>;

    /// Requires the current password
    async fn change_password(
        &self,
        actor: Actor,
        current_password: String,
        new_password: String,
    ) -> AppResult<()>;

    async fn list_users(
        &self,
        actor: Actor,
        params: PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)>;

    async fn set_role(&self, actor: Actor, id: Uuid, role: UserRole) -> AppResult<User>;

    /// Soft delete (sets deleted_at)
    async fn delete_user(&self, actor: Actor, id: Uuid) -> AppResult<()>;

    async fn restore_user(&self, actor: Actor, id: Uuid) -> AppResult<User>;
}

pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

/// Admins may not demote or delete themselves.
fn ensure_not_self(actor: &Actor, id: Uuid, what: &str) -> AppResult<()> {
    if actor.id == id {
        return Err(AppError::validation(format!("You cannot {} your own account", what)));
    }
    Ok(())
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn me(&self, actor: Actor) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(actor.id)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    async fn update_profile(&self, actor: Actor, name: String) -> AppResult<User> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        self.uow.users().update_profile(actor.id, Some(name), None).await
    }

    async fn update_email_preferences(&self, actor: Actor, enabled: bool) -> AppResult<User> {
        let user = self
            .uow
            .users()
            .update_profile(actor.id, None, Some(enabled))
            .await?;
        tracing::debug!(user_id = %user.id, enabled, "Email preferences updated");
        Ok(user)
    }

    async fn change_password(
        &self,
        actor: Actor,
        current_password: String,
        new_password: String,
    ) -> AppResult<()> {
        let user = self.me(actor).await?;
        if !Password::from_hash(user.password_hash).verify(&current_password) {
            return Err(AppError::InvalidCredentials);
        }

        let hash = Password::new(&new_password)?.into_string();
        self.uow.users().set_password(user.id, hash).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn list_users(
        &self,
        actor: Actor,
        params: PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)> {
        ensure_admin(&actor)?;
        self.uow.users().list(params, include_deleted).await
    }

    async fn set_role(&self, actor: Actor, id: Uuid, role: UserRole) -> AppResult<User> {
        ensure_admin(&actor)?;
        ensure_not_self(&actor, id, "change the role of")?;

        let user = self.uow.users().set_role(id, role).await?;
        tracing::info!(user_id = %id, role = %role, admin = %actor.email, "Role changed");
        Ok(user)
    }

    async fn delete_user(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        ensure_admin(&actor)?;
        ensure_not_self(&actor, id, "delete")?;

        self.uow.users().delete(id).await?;
        tracing::info!(user_id = %id, admin = %actor.email, "User soft deleted");
        Ok(())
    }

    async fn restore_user(&self, actor: Actor, id: Uuid) -> AppResult<User> {
        ensure_admin(&actor)?;
        let user = self.uow.users().restore(id).await?;
        tracing::info!(user_id = %id, admin = %actor.email, "User restored");
        Ok(user)
    }
}
