//! Audit log and expense revisions.
//!
//! Both tables are append-only and reference budgets and expenses by id
//! without foreign keys, so history survives deletions.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum AuditEntries {
    Table,
    Id,
    Action,
    BudgetId,
    ExpenseId,
    ObjectBefore,
    Actor,
    CreatedAt,
}

#[derive(Iden)]
enum ExpenseRevisions {
    Table,
    Id,
    ExpenseId,
    Revision,
    Kind,
    BudgetId,
    CreatedBy,
    State,
    Actor,
    RecordedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditEntries::Action).string().not_null())
                    .col(ColumnDef::new(AuditEntries::BudgetId).string())
                    .col(ColumnDef::new(AuditEntries::ExpenseId).string())
                    .col(ColumnDef::new(AuditEntries::ObjectBefore).text())
                    .col(ColumnDef::new(AuditEntries::Actor).string().not_null())
                    .col(
                        ColumnDef::new(AuditEntries::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-audit_entries-budget_id")
                    .table(AuditEntries::Table)
                    .col(AuditEntries::BudgetId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-audit_entries-expense_id")
                    .table(AuditEntries::Table)
                    .col(AuditEntries::ExpenseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpenseRevisions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseRevisions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExpenseRevisions::ExpenseId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseRevisions::Revision)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseRevisions::Kind).string().not_null())
                    .col(ColumnDef::new(ExpenseRevisions::BudgetId).string())
                    .col(
                        ColumnDef::new(ExpenseRevisions::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseRevisions::State).text().not_null())
                    .col(ColumnDef::new(ExpenseRevisions::Actor).string().not_null())
                    .col(
                        ColumnDef::new(ExpenseRevisions::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per revision number of an expense.
        manager
            .create_index(
                Index::create()
                    .name("idx-expense_revisions-expense_id-revision-unique")
                    .table(ExpenseRevisions::Table)
                    .col(ExpenseRevisions::ExpenseId)
                    .col(ExpenseRevisions::Revision)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExpenseRevisions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
            .await?;
        Ok(())
    }
}
