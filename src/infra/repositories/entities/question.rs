//! Infrastructure question database entity.

use sea_orm::entity::prelude::*;

use crate::domain::{InfrastructureQuestion, QuestionType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "infrastructure_questions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub infrastructure_id: i32,
    pub question_text: String,
    pub question_type: String,
    pub is_required: bool,
    /// Newline-separated choices for select questions
    pub options: Option<String>,
    pub display_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Join select options for storage
pub fn encode_options(options: &[String]) -> Option<String> {
    let cleaned: Vec<&str> = options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

impl TryFrom<Model> for InfrastructureQuestion {
    type Error = crate::errors::AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(InfrastructureQuestion {
            id: model.id,
            infrastructure_id: model.infrastructure_id,
            question_text: model.question_text,
            question_type: model.question_type.parse::<QuestionType>()?,
            is_required: model.is_required,
            options: model
                .options
                .map(|o| o.lines().map(str::to_string).collect())
                .unwrap_or_default(),
            display_order: model.display_order,
        })
    }
}
