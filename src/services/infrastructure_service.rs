//! Infrastructure service - infrastructures, their managers and their questions.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::access::{ensure_admin, ensure_can_manage, load_infrastructure};
use crate::domain::{
    Actor, Infrastructure, InfrastructureDraft, InfrastructureQuestion, QuestionDraft, User,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait InfrastructureService: Send + Sync {
    /// Admins see every infrastructure, everyone else only active ones
    async fn list(&self, actor: Actor) -> AppResult<Vec<Infrastructure>>;

    async fn list_active(&self) -> AppResult<Vec<Infrastructure>>;

    async fn get(&self, id: i32) -> AppResult<Infrastructure>;

    async fn create(&self, actor: Actor, draft: InfrastructureDraft) -> AppResult<Infrastructure>;

    async fn update(
        &self,
        actor: Actor,
        id: i32,
        draft: InfrastructureDraft,
    ) -> AppResult<Infrastructure>;

    async fn toggle_active(&self, actor: Actor, id: i32) -> AppResult<Infrastructure>;

    async fn delete(&self, actor: Actor, id: i32) -> AppResult<()>;

    async fn managers(&self, actor: Actor, id: i32) -> AppResult<Vec<User>>;

    async fn assign_manager(&self, actor: Actor, id: i32, user_id: Uuid) -> AppResult<()>;

    async fn unassign_manager(&self, actor: Actor, id: i32, user_id: Uuid) -> AppResult<()>;

    /// Infrastructures the caller manages (all of them for admins)
    async fn managed_by(&self, actor: Actor) -> AppResult<Vec<Infrastructure>>;

    async fn questions(&self, infrastructure_id: i32) -> AppResult<Vec<InfrastructureQuestion>>;

    async fn create_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion>;

    async fn update_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        question_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion>;

    async fn delete_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        question_id: i32,
    ) -> AppResult<()>;
}

pub struct InfrastructureManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> InfrastructureManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Question must exist and belong to the given infrastructure.
    async fn load_question(
        &self,
        infrastructure_id: i32,
        question_id: i32,
    ) -> AppResult<InfrastructureQuestion> {
        self.uow
            .questions()
            .find_by_id(question_id)
            .await?
            .filter(|q| q.infrastructure_id == infrastructure_id)
            .ok_or_not_found()
    }
}

fn validate_draft(draft: &InfrastructureDraft) -> AppResult<()> {
    if draft.name.trim().is_empty() {
        return Err(AppError::validation("Infrastructure name is required"));
    }
    if matches!(draft.max_booking_duration, Some(minutes) if minutes <= 0) {
        return Err(AppError::validation("Maximum booking duration must be positive"));
    }
    Ok(())
}

#[async_trait]
impl<U: UnitOfWork> InfrastructureService for InfrastructureManager<U> {
    async fn list(&self, actor: Actor) -> AppResult<Vec<Infrastructure>> {
        self.uow.infrastructures().list(!actor.is_admin()).await
    }

    async fn list_active(&self) -> AppResult<Vec<Infrastructure>> {
        self.uow.infrastructures().list(true).await
    }

    async fn get(&self, id: i32) -> AppResult<Infrastructure> {
        load_infrastructure(self.uow.as_ref(), id).await
    }

    async fn create(&self, actor: Actor, draft: InfrastructureDraft) -> AppResult<Infrastructure> {
        ensure_admin(&actor)?;
        validate_draft(&draft)?;

        let infrastructure = self.uow.infrastructures().create(draft).await?;
        tracing::info!(
            infrastructure_id = infrastructure.id,
            name = %infrastructure.name,
            "Infrastructure created"
        );
        Ok(infrastructure)
    }

    async fn update(
        &self,
        actor: Actor,
        id: i32,
        draft: InfrastructureDraft,
    ) -> AppResult<Infrastructure> {
        ensure_admin(&actor)?;
        validate_draft(&draft)?;
        self.uow.infrastructures().update(id, draft).await
    }

    async fn toggle_active(&self, actor: Actor, id: i32) -> AppResult<Infrastructure> {
        ensure_admin(&actor)?;
        let current = load_infrastructure(self.uow.as_ref(), id).await?;
        let draft = InfrastructureDraft {
            name: current.name,
            description: current.description,
            location: current.location,
            is_active: !current.is_active,
            max_booking_duration: current.max_booking_duration,
        };

        let updated = self.uow.infrastructures().update(id, draft).await?;
        tracing::info!(infrastructure_id = id, is_active = updated.is_active, "Infrastructure toggled");
        Ok(updated)
    }

    async fn delete(&self, actor: Actor, id: i32) -> AppResult<()> {
        ensure_admin(&actor)?;
        self.uow.infrastructures().delete(id).await?;
        tracing::info!(infrastructure_id = id, "Infrastructure deleted");
        Ok(())
    }

    async fn managers(&self, actor: Actor, id: i32) -> AppResult<Vec<User>> {
        ensure_admin(&actor)?;
        load_infrastructure(self.uow.as_ref(), id).await?;
        self.uow.infrastructures().managers(id).await
    }

    async fn assign_manager(&self, actor: Actor, id: i32, user_id: Uuid) -> AppResult<()> {
        ensure_admin(&actor)?;
        load_infrastructure(self.uow.as_ref(), id).await?;

        let user = self.uow.users().find_by_id(user_id).await?.ok_or_not_found()?;
        if !user.role.can_manage_infrastructure() {
            return Err(AppError::validation(format!(
                "User with role '{}' cannot manage infrastructures",
                user.role
            )));
        }

        self.uow.infrastructures().add_manager(id, user_id).await?;
        tracing::info!(infrastructure_id = id, %user_id, "Manager assigned");
        Ok(())
    }

    async fn unassign_manager(&self, actor: Actor, id: i32, user_id: Uuid) -> AppResult<()> {
        ensure_admin(&actor)?;
        self.uow.infrastructures().remove_manager(id, user_id).await?;
        tracing::info!(infrastructure_id = id, %user_id, "Manager unassigned");
        Ok(())
    }

    async fn managed_by(&self, actor: Actor) -> AppResult<Vec<Infrastructure>> {
        if actor.is_admin() {
            return self.uow.infrastructures().list(false).await;
        }

        let ids = self.uow.infrastructures().managed_by(actor.id).await?;
        let mut managed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(infrastructure) = self.uow.infrastructures().find_by_id(id).await? {
                managed.push(infrastructure);
            }
        }
        Ok(managed)
    }

    async fn questions(&self, infrastructure_id: i32) -> AppResult<Vec<InfrastructureQuestion>> {
        load_infrastructure(self.uow.as_ref(), infrastructure_id).await?;
        self.uow.questions().list_for(infrastructure_id).await
    }

    async fn create_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion> {
        ensure_can_manage(self.uow.as_ref(), &actor, infrastructure_id).await?;
        load_infrastructure(self.uow.as_ref(), infrastructure_id).await?;
        draft.validate()?;
        self.uow.questions().create(infrastructure_id, draft).await
    }

    async fn update_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        question_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion> {
        ensure_can_manage(self.uow.as_ref(), &actor, infrastructure_id).await?;
        draft.validate()?;
        self.load_question(infrastructure_id, question_id).await?;
        self.uow.questions().update(question_id, draft).await
    }

    async fn delete_question(
        &self,
        actor: Actor,
        infrastructure_id: i32,
        question_id: i32,
    ) -> AppResult<()> {
        ensure_can_manage(self.uow.as_ref(), &actor, infrastructure_id).await?;
        self.load_question(infrastructure_id, question_id).await?;
        self.uow.questions().delete(question_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, max: Option<i32>) -> InfrastructureDraft {
        InfrastructureDraft {
            name: name.to_string(),
            description: None,
            location: None,
            is_active: true,
            max_booking_duration: max,
        }
    }

    #[test]
    fn test_draft_validation() {
        assert!(validate_draft(&draft("Cryo-EM", Some(240))).is_ok());
        assert!(validate_draft(&draft("Cryo-EM", None)).is_ok());
        assert!(validate_draft(&draft("  ", None)).is_err());
        assert!(validate_draft(&draft("Cryo-EM", Some(0))).is_err());
    }
}
