//! Transient token store entity.

use sea_orm::entity::prelude::*;

use crate::domain::AuthToken;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub token: String,
    pub purpose: String,
    pub email: String,
    pub booking_id: Option<i32>,
    pub payload: Option<String>,
    pub expires_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for AuthToken {
    fn from(model: Model) -> Self {
        AuthToken {
            id: model.id,
            token: model.token,
            purpose: model.purpose,
            email: model.email,
            booking_id: model.booking_id,
            payload: model.payload,
            expires_at: model.expires_at,
            used_at: model.used_at,
        }
    }
}
