//! Initial schema migration.
//!
//! - `users`: people who can own, join and pay into budgets
//! - `budgets`: shared containers of expenses
//! - `budget_access`: membership role of each user in a budget
//! - `expenses`: personal or budget expenses, versioned for optimistic writes
//! - `allocations`: share of an expense owed by one participant

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    DisplayName,
    Email,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    Name,
    Description,
    OwnerId,
    CreatedAt,
}

#[derive(Iden)]
enum BudgetAccess {
    Table,
    BudgetId,
    UserId,
    Role,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    Title,
    Description,
    AmountMinor,
    Category,
    SpentOn,
    BudgetId,
    CreatedBy,
    CreatedAt,
    UpdatedBy,
    UpdatedAt,
    Version,
}

#[derive(Iden)]
enum Allocations {
    Table,
    Id,
    ExpenseId,
    UserId,
    PercentageUnits,
    AmountMinor,
    PaidMinor,
    PaidInFull,
    EqualDivision,
    CreatedBy,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string())
                    .col(ColumnDef::new(Users::Email).string())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::Description).string())
                    .col(ColumnDef::new(Budgets::OwnerId).string().not_null())
                    .col(ColumnDef::new(Budgets::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-owner_id")
                            .from(Budgets::Table, Budgets::OwnerId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-owner_id")
                    .table(Budgets::Table)
                    .col(Budgets::OwnerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Budget access
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetAccess::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BudgetAccess::BudgetId).string().not_null())
                    .col(ColumnDef::new(BudgetAccess::UserId).string().not_null())
                    .col(ColumnDef::new(BudgetAccess::Role).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(BudgetAccess::BudgetId)
                            .col(BudgetAccess::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_access-budget_id")
                            .from(BudgetAccess::Table, BudgetAccess::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_access-user_id")
                            .from(BudgetAccess::Table, BudgetAccess::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_access-user_id")
                    .table(BudgetAccess::Table)
                    .col(BudgetAccess::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::Title).string().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .col(ColumnDef::new(Expenses::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Expenses::Category)
                            .string()
                            .not_null()
                            .default("other"),
                    )
                    .col(ColumnDef::new(Expenses::SpentOn).date().not_null())
                    .col(ColumnDef::new(Expenses::BudgetId).string())
                    .col(ColumnDef::new(Expenses::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::UpdatedBy).string())
                    .col(ColumnDef::new(Expenses::UpdatedAt).timestamp())
                    .col(
                        ColumnDef::new(Expenses::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-budget_id")
                            .from(Expenses::Table, Expenses::BudgetId)
                            .to(Budgets::Table, Budgets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-budget_id-spent_on")
                    .table(Expenses::Table)
                    .col(Expenses::BudgetId)
                    .col(Expenses::SpentOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-created_by")
                    .table(Expenses::Table)
                    .col(Expenses::CreatedBy)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Allocations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Allocations::ExpenseId).string().not_null())
                    .col(ColumnDef::new(Allocations::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Allocations::PercentageUnits)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::PaidMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Allocations::PaidInFull)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Allocations::EqualDivision)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Allocations::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Allocations::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-expense_id")
                            .from(Allocations::Table, Allocations::ExpenseId)
                            .to(Expenses::Table, Expenses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-expense_id-user_id-unique")
                    .table(Allocations::Table)
                    .col(Allocations::ExpenseId)
                    .col(Allocations::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-user_id")
                    .table(Allocations::Table)
                    .col(Allocations::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetAccess::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
