//! Transient token store (verification, reset, guest and action links).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QuerySelect, Set,
};
use std::sync::Arc;

use super::entities::auth_token::{self, ActiveModel, Entity as TokenEntity};
use crate::domain::{generate_token, AuthToken, TokenPurpose};
use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Token to be issued
#[derive(Debug, Clone)]
pub struct NewToken {
    pub purpose: TokenPurpose,
    pub email: String,
    pub booking_id: Option<i32>,
    pub payload: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Persist a freshly generated token
    async fn issue(&self, token: NewToken) -> AppResult<AuthToken>;

    async fn find(&self, token: &str) -> AppResult<Option<AuthToken>>;

    /// Mark unused tokens of `purpose` for `email` as used
    async fn revoke_all(&self, email: &str, purpose: TokenPurpose) -> AppResult<u64>;

    /// Remove expired and used tokens
    async fn purge(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

pub struct TokenStore {
    db: Arc<DatabaseConnection>,
}

impl TokenStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

pub(crate) async fn issue<C: ConnectionTrait>(db: &C, token: NewToken) -> AppResult<AuthToken> {
    let active_model = ActiveModel {
        token: Set(generate_token()),
        purpose: Set(token.purpose.as_str().to_string()),
        email: Set(token.email),
        booking_id: Set(token.booking_id),
        payload: Set(token.payload),
        expires_at: Set(token.expires_at),
        used_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let model = active_model.insert(db).await?;
    Ok(AuthToken::from(model))
}

/// Load a token and lock it so it can be consumed exactly once.
pub(crate) async fn find_for_update<C: ConnectionTrait>(
    db: &C,
    token: &str,
) -> AppResult<Option<AuthToken>> {
    let result = TokenEntity::find()
        .filter(auth_token::Column::Token.eq(token))
        .lock_exclusive()
        .one(db)
        .await?;
    Ok(result.map(AuthToken::from))
}

/// Mark a token used; false when it was already consumed.
pub(crate) async fn consume<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<bool> {
    let result = TokenEntity::update_many()
        .col_expr(auth_token::Column::UsedAt, Expr::value(Utc::now()))
        .filter(auth_token::Column::Id.eq(id))
        .filter(auth_token::Column::UsedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

pub(crate) async fn revoke_booking_actions<C: ConnectionTrait>(
    db: &C,
    booking_ids: Vec<i32>,
) -> AppResult<u64> {
    if booking_ids.is_empty() {
        return Ok(0);
    }
    let result = TokenEntity::update_many()
        .col_expr(auth_token::Column::UsedAt, Expr::value(Utc::now()))
        .filter(auth_token::Column::BookingId.is_in(booking_ids))
        .filter(auth_token::Column::Purpose.eq(TokenPurpose::BookingAction.as_str()))
        .filter(auth_token::Column::UsedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[async_trait]
impl TokenRepository for TokenStore {
    async fn issue(&self, token: NewToken) -> AppResult<AuthToken> {
        issue(self.db.as_ref(), token).await
    }

    async fn find(&self, token: &str) -> AppResult<Option<AuthToken>> {
        let result = TokenEntity::find()
            .filter(auth_token::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await?;
        Ok(result.map(AuthToken::from))
    }

    async fn revoke_all(&self, email: &str, purpose: TokenPurpose) -> AppResult<u64> {
        let result = TokenEntity::update_many()
            .col_expr(auth_token::Column::UsedAt, Expr::value(Utc::now()))
            .filter(auth_token::Column::Email.eq(email))
            .filter(auth_token::Column::Purpose.eq(purpose.as_str()))
            .filter(auth_token::Column::UsedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn purge(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = TokenEntity::delete_many()
            .filter(
                sea_orm::Condition::any()
                    .add(auth_token::Column::ExpiresAt.lte(now))
                    .add(auth_token::Column::UsedAt.is_not_null()),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
