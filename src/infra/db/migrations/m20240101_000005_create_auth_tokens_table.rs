//! Migration: Create the transient token store.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthTokens::Token).string_len(128).not_null().unique_key())
                    .col(ColumnDef::new(AuthTokens::Purpose).string_len(32).not_null())
                    .col(ColumnDef::new(AuthTokens::Email).string().not_null())
                    .col(ColumnDef::new(AuthTokens::BookingId).integer().null())
                    .col(ColumnDef::new(AuthTokens::Payload).text().null())
                    .col(
                        ColumnDef::new(AuthTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthTokens::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auth_tokens_email_purpose")
                    .table(AuthTokens::Table)
                    .col(AuthTokens::Email)
                    .col(AuthTokens::Purpose)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthTokens::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuthTokens {
    Table,
    Id,
    Token,
    Purpose,
    Email,
    BookingId,
    Payload,
    ExpiresAt,
    UsedAt,
    CreatedAt,
}
