//! User repository implementation with soft delete support.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::{User, UserRole};
use crate::errors::{AppError, AppResult};
use crate::types::PaginationParams;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// By default, all query methods exclude soft-deleted records.
/// Use `*_with_deleted` variants to include them.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find active user by ID (excludes soft-deleted)
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find user by ID including soft-deleted
    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find active user by email address (excludes soft-deleted)
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Find user by email including soft-deleted
    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>>;

    /// Create a new, unverified user
    async fn create(
        &self,
        email: String,
        password_hash: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User>;

    /// Update self-service profile fields
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email_notifications: Option<bool>,
    ) -> AppResult<User>;

    /// Change a user's role
    async fn set_role(&self, id: Uuid, role: UserRole) -> AppResult<User>;

    /// Replace the stored password hash
    async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()>;

    /// Soft delete user by ID (sets deleted_at timestamp)
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Restore a soft-deleted user
    async fn restore(&self, id: Uuid) -> AppResult<User>;

    /// Page through users ordered by email
    async fn list(&self, params: PaginationParams, include_deleted: bool)
        -> AppResult<(Vec<User>, u64)>;

    /// Active users among the given ids
    async fn find_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>>;
}

/// Concrete implementation of UserRepository with soft delete
pub struct UserStore {
    db: Arc<DatabaseConnection>,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

pub(crate) async fn find_active<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<User>> {
    let result = UserEntity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(result.map(User::from))
}

pub(crate) async fn find_active_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> AppResult<Option<User>> {
    let result = UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(result.map(User::from))
}

pub(crate) async fn insert<C: ConnectionTrait>(
    db: &C,
    email: String,
    password_hash: String,
    name: String,
    role: UserRole,
) -> AppResult<User> {
    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(name),
        role: Set(role.as_str().to_string()),
        email_notifications: Set(true),
        is_verified: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    };

    let model = active_model.insert(db).await?;
    Ok(User::from(model))
}

async fn load_active_model<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<ActiveModel> {
    let model = UserEntity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(model.into())
}

pub(crate) async fn update_password<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    password_hash: String,
) -> AppResult<()> {
    let mut active = load_active_model(db, id).await?;
    active.password_hash = Set(password_hash);
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await?;
    Ok(())
}

pub(crate) async fn mark_verified<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<User> {
    let mut active = load_active_model(db, id).await?;
    active.is_verified = Set(true);
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(db).await?;
    Ok(User::from(model))
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        find_active(self.db.as_ref(), id).await
    }

    async fn find_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(result.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_active_by_email(self.db.as_ref(), email).await
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?;
        Ok(result.map(User::from))
    }

    async fn create(
        &self,
        email: String,
        password_hash: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User> {
        insert(self.db.as_ref(), email, password_hash, name, role).await
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email_notifications: Option<bool>,
    ) -> AppResult<User> {
        let mut active = load_active_model(self.db.as_ref(), id).await?;
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(enabled) = email_notifications {
            active.email_notifications = Set(enabled);
        }
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.db.as_ref()).await?;
        Ok(User::from(model))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        let mut active = load_active_model(self.db.as_ref(), id).await?;
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.db.as_ref()).await?;
        Ok(User::from(model))
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        update_password(self.db.as_ref(), id, password_hash).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut active = load_active_model(self.db.as_ref(), id).await?;
        let now = chrono::Utc::now();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);

        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> AppResult<User> {
        let user = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_not_null())
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| AppError::validation("User is not deleted or does not exist"))?;

        let mut active: ActiveModel = user.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(self.db.as_ref()).await?;
        Ok(User::from(model))
    }

    async fn list(
        &self,
        params: PaginationParams,
        include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)> {
        let mut query = UserEntity::find().order_by_asc(user::Column::Email);
        if !include_deleted {
            query = query.filter(user::Column::DeletedAt.is_null());
        }

        let paginator = query.paginate(self.db.as_ref(), params.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page_index()).await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn find_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = UserEntity::find()
            .filter(user::Column::Id.is_in(ids))
            .filter(user::Column::DeletedAt.is_null())
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(User::from).collect())
    }
}
