//! Infrastructure database entity.

use sea_orm::entity::prelude::*;

use crate::domain::Infrastructure;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "infrastructures")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub max_booking_duration: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Infrastructure {
    fn from(model: Model) -> Self {
        Infrastructure {
            id: model.id,
            name: model.name,
            description: model.description,
            location: model.location,
            is_active: model.is_active,
            max_booking_duration: model.max_booking_duration,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
