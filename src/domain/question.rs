//! Infrastructure questions and the answers attached to booking requests.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

use crate::config::UPLOADS_URL_PREFIX;
use crate::errors::{AppError, AppResult};

/// Kind of input a question expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Number,
    Select,
    Checkbox,
    Document,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Number => "number",
            QuestionType::Select => "select",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Document => "document",
        }
    }
}

impl std::str::FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(QuestionType::Text),
            "number" => Ok(QuestionType::Number),
            "select" => Ok(QuestionType::Select),
            "checkbox" => Ok(QuestionType::Checkbox),
            "document" => Ok(QuestionType::Document),
            other => Err(AppError::validation(format!("Unknown question type '{}'", other))),
        }
    }
}

/// A question an infrastructure asks every booking request
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InfrastructureQuestion {
    pub id: i32,
    pub infrastructure_id: i32,
    pub question_text: String,
    pub question_type: QuestionType,
    pub is_required: bool,
    /// Choices for `select` questions
    pub options: Vec<String>,
    pub display_order: i32,
}

/// Fields accepted when creating or replacing a question
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub question_text: String,
    pub question_type: QuestionType,
    pub is_required: bool,
    pub options: Vec<String>,
    pub display_order: i32,
}

impl QuestionDraft {
    pub fn validate(&self) -> AppResult<()> {
        if self.question_text.trim().is_empty() {
            return Err(AppError::validation("Question text is required"));
        }
        if self.question_type == QuestionType::Select && self.options.is_empty() {
            return Err(AppError::validation("Select questions need at least one option"));
        }
        Ok(())
    }
}

/// Answer supplied with a booking request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnswerInput {
    pub question_id: i32,
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Path returned by the upload endpoint, e.g. `/uploads/abc.pdf`
    #[serde(default)]
    pub document_path: Option<String>,
}

impl AnswerInput {
    /// An answer counts only if it carries non-blank text or an uploaded
    /// document.
    pub fn is_filled(&self) -> bool {
        let has_text = self
            .answer_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        has_text || self.has_uploaded_document()
    }

    /// True when `document_path` names a file returned by the upload endpoint.
    pub fn has_uploaded_document(&self) -> bool {
        self.document_path.as_deref().is_some_and(is_upload_path)
    }
}

fn is_upload_path(path: &str) -> bool {
    path.strip_prefix(UPLOADS_URL_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
}

/// Stored answer
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookingAnswer {
    pub id: i32,
    pub booking_id: i32,
    pub question_id: i32,
    pub answer_text: Option<String>,
    pub document_path: Option<String>,
}

/// Ids of required questions without a filled answer, in question order.
pub fn missing_required_answers(
    questions: &[InfrastructureQuestion],
    answers: &[AnswerInput],
) -> Vec<i32> {
    let answered: HashSet<i32> = answers
        .iter()
        .filter(|a| a.is_filled())
        .map(|a| a.question_id)
        .collect();

    questions
        .iter()
        .filter(|q| q.is_required && !answered.contains(&q.id))
        .map(|q| q.id)
        .collect()
}

/// Fail with `MissingAnswers` when any required question is unanswered.
pub fn ensure_required_answers(
    questions: &[InfrastructureQuestion],
    answers: &[AnswerInput],
) -> AppResult<()> {
    let missing = missing_required_answers(questions, answers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::MissingAnswers(missing))
    }
}

/// Keep filled answers that belong to the given questions; the last answer
/// for a question wins.
pub fn answers_to_store(
    questions: &[InfrastructureQuestion],
    answers: Vec<AnswerInput>,
) -> Vec<AnswerInput> {
    let known: HashSet<i32> = questions.iter().map(|q| q.id).collect();
    let mut kept: Vec<AnswerInput> = Vec::new();
    for mut answer in answers.into_iter().filter(|a| a.is_filled() && known.contains(&a.question_id)) {
        if !answer.has_uploaded_document() {
            answer.document_path = None;
        }
        kept.retain(|existing| existing.question_id != answer.question_id);
        kept.push(answer);
    }
    kept
}
