//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and runs multi-statement workflows
//! (claiming a timeslot, approving with cascade, consuming tokens) inside
//! one database transaction.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::repositories::{
    booking_repository, infrastructure_repository, question_repository, token_repository,
    user_repository, BookingRepository, BookingStore, InfrastructureRepository,
    InfrastructureStore, NewToken, QuestionRepository, QuestionStore, TokenRepository,
    TokenStore, UserRepository, UserStore,
};
use crate::domain::{
    AnswerInput, AuthToken, Booking, BookingStatus, Infrastructure, InfrastructureQuestion,
    TimeWindow, User, UserRole,
};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transaction closures
pub type TxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly because of the generic transaction methods;
/// tests either supply a hand-written implementation or run `Persistence`
/// over a mock connection.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn infrastructures(&self) -> Arc<dyn InfrastructureRepository>;

    fn bookings(&self) -> Arc<dyn BookingRepository>;

    fn questions(&self) -> Arc<dyn QuestionRepository>;

    fn tokens(&self) -> Arc<dyn TokenRepository>;

    /// Execute a closure within a transaction.
    ///
    /// Committed on success, rolled back on error. ReadCommitted isolation;
    /// row locks taken inside the closure serialize competing writers.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;

    /// Execute a closure within a serializable transaction.
    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub fn users(&self) -> TxUserRepository<'_> {
        TxUserRepository { txn: self.txn }
    }

    pub fn infrastructures(&self) -> TxInfrastructureRepository<'_> {
        TxInfrastructureRepository { txn: self.txn }
    }

    pub fn bookings(&self) -> TxBookingRepository<'_> {
        TxBookingRepository { txn: self.txn }
    }

    pub fn questions(&self) -> TxQuestionRepository<'_> {
        TxQuestionRepository { txn: self.txn }
    }

    pub fn tokens(&self) -> TxTokenRepository<'_> {
        TxTokenRepository { txn: self.txn }
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: Arc<DatabaseConnection>,
    user_repo: Arc<UserStore>,
    infrastructure_repo: Arc<InfrastructureStore>,
    booking_repo: Arc<BookingStore>,
    question_repo: Arc<QuestionStore>,
    token_repo: Arc<TokenStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_shared(Arc::new(db))
    }

    /// Build on a connection shared with other owners.
    pub fn from_shared(db: Arc<DatabaseConnection>) -> Self {
        Self {
            user_repo: Arc::new(UserStore::new(db.clone())),
            infrastructure_repo: Arc::new(InfrastructureStore::new(db.clone())),
            booking_repo: Arc::new(BookingStore::new(db.clone())),
            question_repo: Arc::new(QuestionStore::new(db.clone())),
            token_repo: Arc::new(TokenStore::new(db.clone())),
            db,
        }
    }

    async fn execute_transaction<F, T>(&self, isolation: IsolationLevel, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
            .await
            .map_err(AppError::from)?;

        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    fn infrastructures(&self) -> Arc<dyn InfrastructureRepository> {
        self.infrastructure_repo.clone()
    }

    fn bookings(&self) -> Arc<dyn BookingRepository> {
        self.booking_repo.clone()
    }

    fn questions(&self) -> Arc<dyn QuestionRepository> {
        self.question_repo.clone()
    }

    fn tokens(&self) -> Arc<dyn TokenRepository> {
        self.token_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::ReadCommitted, f).await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::Serializable, f).await
    }
}

/// Transaction-aware user repository (active users only)
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxUserRepository<'_> {
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        user_repository::find_active(self.txn, id).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        user_repository::find_active_by_email(self.txn, email).await
    }

    pub async fn create(
        &self,
        email: String,
        password_hash: String,
        name: String,
        role: UserRole,
    ) -> AppResult<User> {
        user_repository::insert(self.txn, email, password_hash, name, role).await
    }

    pub async fn set_password(&self, id: Uuid, password_hash: String) -> AppResult<()> {
        user_repository::update_password(self.txn, id, password_hash).await
    }

    pub async fn mark_verified(&self, id: Uuid) -> AppResult<User> {
        user_repository::mark_verified(self.txn, id).await
    }
}

/// Transaction-aware infrastructure lookups
pub struct TxInfrastructureRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxInfrastructureRepository<'_> {
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Infrastructure>> {
        infrastructure_repository::find_by_id(self.txn, id).await
    }

    pub async fn managers(&self, infrastructure_id: i32) -> AppResult<Vec<User>> {
        infrastructure_repository::manager_users(self.txn, infrastructure_id).await
    }
}

/// Transaction-aware booking repository
pub struct TxBookingRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxBookingRepository<'_> {
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Booking>> {
        booking_repository::find_by_id(self.txn, id).await
    }

    /// Load with a row lock held until commit
    pub async fn find_for_update(&self, id: i32) -> AppResult<Option<Booking>> {
        booking_repository::find_for_update(self.txn, id).await
    }

    /// Conditional flip of an available timeslot into a pending booking
    pub async fn claim(
        &self,
        id: i32,
        user_email: &str,
        purpose: Option<String>,
    ) -> AppResult<u64> {
        booking_repository::claim(self.txn, id, user_email, purpose).await
    }

    pub async fn set_status_if(
        &self,
        id: i32,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<u64> {
        booking_repository::set_status_if(self.txn, id, from, to).await
    }

    pub async fn pending_overlapping_for_update(
        &self,
        infrastructure_id: i32,
        window: &TimeWindow,
        exclude_id: i32,
    ) -> AppResult<Vec<Booking>> {
        booking_repository::pending_overlapping_for_update(
            self.txn,
            infrastructure_id,
            window,
            exclude_id,
        )
        .await
    }

    pub async fn reject_pending(&self, ids: Vec<i32>) -> AppResult<u64> {
        booking_repository::reject_pending(self.txn, ids).await
    }

    pub async fn occupying(
        &self,
        infrastructure_id: i32,
        window: &TimeWindow,
    ) -> AppResult<Vec<Booking>> {
        booking_repository::occupying(self.txn, infrastructure_id, window).await
    }

    pub async fn insert_timeslot(
        &self,
        infrastructure_id: i32,
        window: &TimeWindow,
    ) -> AppResult<Booking> {
        booking_repository::insert_timeslot(self.txn, infrastructure_id, window).await
    }
}

/// Transaction-aware questions and answers
pub struct TxQuestionRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxQuestionRepository<'_> {
    pub async fn list_for(&self, infrastructure_id: i32) -> AppResult<Vec<InfrastructureQuestion>> {
        question_repository::list_for(self.txn, infrastructure_id).await
    }

    pub async fn insert_answers(&self, booking_id: i32, answers: Vec<AnswerInput>) -> AppResult<u64> {
        question_repository::insert_answers(self.txn, booking_id, answers).await
    }
}

/// Transaction-aware token store
pub struct TxTokenRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl TxTokenRepository<'_> {
    pub async fn issue(&self, token: NewToken) -> AppResult<AuthToken> {
        token_repository::issue(self.txn, token).await
    }

    pub async fn find_for_update(&self, token: &str) -> AppResult<Option<AuthToken>> {
        token_repository::find_for_update(self.txn, token).await
    }

    pub async fn consume(&self, id: i32) -> AppResult<bool> {
        token_repository::consume(self.txn, id).await
    }

    /// Invalidate outstanding approve/reject links of the given bookings
    pub async fn revoke_booking_actions(&self, booking_ids: Vec<i32>) -> AppResult<u64> {
        token_repository::revoke_booking_actions(self.txn, booking_ids).await
    }
}
