//! Infrastructure repository with manager assignments.

use async_trait::async_trait;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::entities::infrastructure::{self, ActiveModel, Entity as InfrastructureEntity};
use super::entities::infrastructure_manager::{self, Entity as ManagerEntity};
use super::entities::user::{self, Entity as UserEntity};
use crate::domain::{Infrastructure, InfrastructureDraft, User};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait InfrastructureRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Infrastructure>>;

    /// All infrastructures ordered by name, optionally only active ones
    async fn list(&self, active_only: bool) -> AppResult<Vec<Infrastructure>>;

    async fn create(&self, draft: InfrastructureDraft) -> AppResult<Infrastructure>;

    async fn update(&self, id: i32, draft: InfrastructureDraft) -> AppResult<Infrastructure>;

    /// Hard delete; bookings, questions and assignments cascade
    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Active users assigned as managers
    async fn managers(&self, infrastructure_id: i32) -> AppResult<Vec<User>>;

    /// Assign a manager; assigning twice is a no-op
    async fn add_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<()>;

    async fn remove_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<()>;

    async fn is_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<bool>;

    /// Ids of the infrastructures a user manages
    async fn managed_by(&self, user_id: Uuid) -> AppResult<Vec<i32>>;
}

pub struct InfrastructureStore {
    db: Arc<DatabaseConnection>,
}

impl InfrastructureStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

pub(crate) async fn find_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> AppResult<Option<Infrastructure>> {
    let result = InfrastructureEntity::find_by_id(id).one(db).await?;
    Ok(result.map(Infrastructure::from))
}

pub(crate) async fn manager_users<C: ConnectionTrait>(
    db: &C,
    infrastructure_id: i32,
) -> AppResult<Vec<User>> {
    let user_ids: Vec<Uuid> = ManagerEntity::find()
        .select_only()
        .column(infrastructure_manager::Column::UserId)
        .filter(infrastructure_manager::Column::InfrastructureId.eq(infrastructure_id))
        .into_tuple()
        .all(db)
        .await?;

    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let models = UserEntity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .filter(user::Column::DeletedAt.is_null())
        .order_by_asc(user::Column::Email)
        .all(db)
        .await?;
    Ok(models.into_iter().map(User::from).collect())
}

#[async_trait]
impl InfrastructureRepository for InfrastructureStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Infrastructure>> {
        find_by_id(self.db.as_ref(), id).await
    }

    async fn list(&self, active_only: bool) -> AppResult<Vec<Infrastructure>> {
        let mut query = InfrastructureEntity::find().order_by_asc(infrastructure::Column::Name);
        if active_only {
            query = query.filter(infrastructure::Column::IsActive.eq(true));
        }
        let models = query.all(self.db.as_ref()).await?;
        Ok(models.into_iter().map(Infrastructure::from).collect())
    }

    async fn create(&self, draft: InfrastructureDraft) -> AppResult<Infrastructure> {
        let now = chrono::Utc::now();
        let active_model = ActiveModel {
            name: Set(draft.name),
            description: Set(draft.description),
            location: Set(draft.location),
            is_active: Set(draft.is_active),
            max_booking_duration: Set(draft.max_booking_duration),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model.insert(self.db.as_ref()).await?;
        Ok(Infrastructure::from(model))
    }

    async fn update(&self, id: i32, draft: InfrastructureDraft) -> AppResult<Infrastructure> {
        let existing = InfrastructureEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(draft.name);
        active.description = Set(draft.description);
        active.location = Set(draft.location);
        active.is_active = Set(draft.is_active);
        active.max_booking_duration = Set(draft.max_booking_duration);
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.db.as_ref()).await?;
        Ok(Infrastructure::from(model))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = InfrastructureEntity::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn managers(&self, infrastructure_id: i32) -> AppResult<Vec<User>> {
        manager_users(self.db.as_ref(), infrastructure_id).await
    }

    async fn add_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<()> {
        let assignment = infrastructure_manager::ActiveModel {
            infrastructure_id: Set(infrastructure_id),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now()),
        };

        ManagerEntity::insert(assignment)
            .on_conflict(
                OnConflict::columns([
                    infrastructure_manager::Column::InfrastructureId,
                    infrastructure_manager::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .do_nothing()
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn remove_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<()> {
        let result = ManagerEntity::delete_many()
            .filter(infrastructure_manager::Column::InfrastructureId.eq(infrastructure_id))
            .filter(infrastructure_manager::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn is_manager(&self, infrastructure_id: i32, user_id: Uuid) -> AppResult<bool> {
        let found = ManagerEntity::find_by_id((infrastructure_id, user_id))
            .one(self.db.as_ref())
            .await?;
        Ok(found.is_some())
    }

    async fn managed_by(&self, user_id: Uuid) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = ManagerEntity::find()
            .select_only()
            .column(infrastructure_manager::Column::InfrastructureId)
            .filter(infrastructure_manager::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.db.as_ref())
            .await?;
        Ok(ids)
    }
}
