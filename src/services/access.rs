//! Shared authorization checks.

use crate::domain::{Actor, Infrastructure, UserRole};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

/// Admins manage everything; managers only their assigned infrastructures.
pub async fn ensure_can_manage<U: UnitOfWork>(
    uow: &U,
    actor: &Actor,
    infrastructure_id: i32,
) -> AppResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.role == UserRole::Manager
        && uow
            .infrastructures()
            .is_manager(infrastructure_id, actor.id)
            .await?
    {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

pub fn ensure_admin(actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Load an infrastructure or fail with `NotFound`.
pub async fn load_infrastructure<U: UnitOfWork>(uow: &U, id: i32) -> AppResult<Infrastructure> {
    uow.infrastructures().find_by_id(id).await?.ok_or_not_found()
}
