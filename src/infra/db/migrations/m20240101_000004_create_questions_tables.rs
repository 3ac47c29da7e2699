//! Migration: Create infrastructure questions and booking answers.

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_infrastructures_table::Infrastructures;
use super::m20240101_000003_create_bookings_table::Bookings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InfrastructureQuestions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InfrastructureQuestions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InfrastructureQuestions::InfrastructureId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfrastructureQuestions::QuestionText)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InfrastructureQuestions::QuestionType)
                            .string_len(16)
                            .not_null()
                            .default("text"),
                    )
                    .col(
                        ColumnDef::new(InfrastructureQuestions::IsRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(InfrastructureQuestions::Options).text().null())
                    .col(
                        ColumnDef::new(InfrastructureQuestions::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_questions_infrastructure")
                            .from(
                                InfrastructureQuestions::Table,
                                InfrastructureQuestions::InfrastructureId,
                            )
                            .to(Infrastructures::Table, Infrastructures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookingAnswers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BookingAnswers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BookingAnswers::BookingId).integer().not_null())
                    .col(ColumnDef::new(BookingAnswers::QuestionId).integer().not_null())
                    .col(ColumnDef::new(BookingAnswers::AnswerText).text().null())
                    .col(ColumnDef::new(BookingAnswers::DocumentPath).string().null())
                    .col(
                        ColumnDef::new(BookingAnswers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_answers_booking")
                            .from(BookingAnswers::Table, BookingAnswers::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_answers_question")
                            .from(BookingAnswers::Table, BookingAnswers::QuestionId)
                            .to(InfrastructureQuestions::Table, InfrastructureQuestions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BookingAnswers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InfrastructureQuestions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum InfrastructureQuestions {
    Table,
    Id,
    InfrastructureId,
    QuestionText,
    QuestionType,
    IsRequired,
    Options,
    DisplayOrder,
}

#[derive(Iden)]
enum BookingAnswers {
    Table,
    Id,
    BookingId,
    QuestionId,
    AnswerText,
    DocumentPath,
    CreatedAt,
}
