//! Migration: Create infrastructures and manager assignments.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Infrastructures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Infrastructures::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Infrastructures::Name).string().not_null())
                    .col(ColumnDef::new(Infrastructures::Description).text().null())
                    .col(ColumnDef::new(Infrastructures::Location).string().null())
                    .col(
                        ColumnDef::new(Infrastructures::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Infrastructures::MaxBookingDuration)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Infrastructures::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Infrastructures::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InfrastructureManagers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InfrastructureManagers::InfrastructureId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfrastructureManagers::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfrastructureManagers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(InfrastructureManagers::InfrastructureId)
                            .col(InfrastructureManagers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_infrastructure_managers_infrastructure")
                            .from(
                                InfrastructureManagers::Table,
                                InfrastructureManagers::InfrastructureId,
                            )
                            .to(Infrastructures::Table, Infrastructures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_infrastructure_managers_user")
                            .from(InfrastructureManagers::Table, InfrastructureManagers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InfrastructureManagers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Infrastructures::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum Infrastructures {
    Table,
    Id,
    Name,
    Description,
    Location,
    IsActive,
    MaxBookingDuration,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InfrastructureManagers {
    Table,
    InfrastructureId,
    UserId,
    CreatedAt,
}
