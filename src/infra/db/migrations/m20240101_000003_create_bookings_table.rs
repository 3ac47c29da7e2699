//! Migration: Create the shared bookings/timeslots table.

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_infrastructures_table::Infrastructures;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookings::InfrastructureId).integer().not_null())
                    .col(ColumnDef::new(Bookings::BookingDate).date().not_null())
                    .col(ColumnDef::new(Bookings::StartTime).time().not_null())
                    .col(ColumnDef::new(Bookings::EndTime).time().not_null())
                    .col(
                        ColumnDef::new(Bookings::BookingType)
                            .string_len(16)
                            .not_null()
                            .default("timeslot"),
                    )
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string_len(16)
                            .not_null()
                            .default("available"),
                    )
                    .col(ColumnDef::new(Bookings::UserEmail).string().null())
                    .col(ColumnDef::new(Bookings::Purpose).text().null())
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_infrastructure")
                            .from(Bookings::Table, Bookings::InfrastructureId)
                            .to(Infrastructures::Table, Infrastructures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Overlap lookups filter on infrastructure, day and status
        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_infrastructure_date_status")
                    .table(Bookings::Table)
                    .col(Bookings::InfrastructureId)
                    .col(Bookings::BookingDate)
                    .col(Bookings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_user_email")
                    .table(Bookings::Table)
                    .col(Bookings::UserEmail)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum Bookings {
    Table,
    Id,
    InfrastructureId,
    BookingDate,
    StartTime,
    EndTime,
    BookingType,
    Status,
    UserEmail,
    Purpose,
    CreatedAt,
    UpdatedAt,
}
