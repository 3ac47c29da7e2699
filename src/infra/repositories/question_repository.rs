//! Infrastructure questions and booking answers.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

use super::entities::booking_answer::{self, Entity as AnswerEntity};
use super::entities::question::{self, encode_options, ActiveModel, Entity as QuestionEntity};
use crate::domain::{AnswerInput, BookingAnswer, InfrastructureQuestion, QuestionDraft};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of an infrastructure in display order
    async fn list_for(&self, infrastructure_id: i32) -> AppResult<Vec<InfrastructureQuestion>>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<InfrastructureQuestion>>;

    async fn create(
        &self,
        infrastructure_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion>;

    async fn update(&self, id: i32, draft: QuestionDraft) -> AppResult<InfrastructureQuestion>;

    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Answers stored with a booking
    async fn answers_for(&self, booking_id: i32) -> AppResult<Vec<BookingAnswer>>;
}

pub struct QuestionStore {
    db: Arc<DatabaseConnection>,
}

impl QuestionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

pub(crate) async fn list_for<C: ConnectionTrait>(
    db: &C,
    infrastructure_id: i32,
) -> AppResult<Vec<InfrastructureQuestion>> {
    QuestionEntity::find()
        .filter(question::Column::InfrastructureId.eq(infrastructure_id))
        .order_by_asc(question::Column::DisplayOrder)
        .order_by_asc(question::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(InfrastructureQuestion::try_from)
        .collect()
}

/// Store answers for a booking. Returns the number of rows written.
pub(crate) async fn insert_answers<C: ConnectionTrait>(
    db: &C,
    booking_id: i32,
    answers: Vec<AnswerInput>,
) -> AppResult<u64> {
    if answers.is_empty() {
        return Ok(0);
    }
    let now = chrono::Utc::now();
    let rows = answers.into_iter().map(|answer| booking_answer::ActiveModel {
        booking_id: Set(booking_id),
        question_id: Set(answer.question_id),
        answer_text: Set(answer.answer_text),
        document_path: Set(answer.document_path),
        created_at: Set(now),
        ..Default::default()
    });

    let written = AnswerEntity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(written)
}

#[async_trait]
impl QuestionRepository for QuestionStore {
    async fn list_for(&self, infrastructure_id: i32) -> AppResult<Vec<InfrastructureQuestion>> {
        list_for(self.db.as_ref(), infrastructure_id).await
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<InfrastructureQuestion>> {
        QuestionEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(InfrastructureQuestion::try_from)
            .transpose()
    }

    async fn create(
        &self,
        infrastructure_id: i32,
        draft: QuestionDraft,
    ) -> AppResult<InfrastructureQuestion> {
        let active_model = ActiveModel {
            infrastructure_id: Set(infrastructure_id),
            question_text: Set(draft.question_text),
            question_type: Set(draft.question_type.as_str().to_string()),
            is_required: Set(draft.is_required),
            options: Set(encode_options(&draft.options)),
            display_order: Set(draft.display_order),
            ..Default::default()
        };
        let model = active_model.insert(self.db.as_ref()).await?;
        InfrastructureQuestion::try_from(model)
    }

    async fn update(&self, id: i32, draft: QuestionDraft) -> AppResult<InfrastructureQuestion> {
        let existing = QuestionEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.question_text = Set(draft.question_text);
        active.question_type = Set(draft.question_type.as_str().to_string());
        active.is_required = Set(draft.is_required);
        active.options = Set(encode_options(&draft.options));
        active.display_order = Set(draft.display_order);

        let model = active.update(self.db.as_ref()).await?;
        InfrastructureQuestion::try_from(model)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = QuestionEntity::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn answers_for(&self, booking_id: i32) -> AppResult<Vec<BookingAnswer>> {
        let models = AnswerEntity::find()
            .filter(booking_answer::Column::BookingId.eq(booking_id))
            .order_by_asc(booking_answer::Column::QuestionId)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(BookingAnswer::from).collect())
    }
}
