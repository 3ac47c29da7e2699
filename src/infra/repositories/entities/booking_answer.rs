//! Booking answer database entity.

use sea_orm::entity::prelude::*;

use crate::domain::BookingAnswer;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "booking_answers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub booking_id: i32,
    pub question_id: i32,
    pub answer_text: Option<String>,
    pub document_path: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for BookingAnswer {
    fn from(model: Model) -> Self {
        BookingAnswer {
            id: model.id,
            booking_id: model.booking_id,
            question_id: model.question_id,
            answer_text: model.answer_text,
            document_path: model.document_path,
        }
    }
}
