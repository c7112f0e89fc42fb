use base64::Engine as _;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, Condition, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ActionType, CreateExpenseCmd, EngineError, Expense, ExpenseCategory, MoneyCents,
    ResultEngine, RevisionKind, UpdateExpenseCmd, expenses,
    util::{normalize_optional_text, normalize_required_name, now},
};

use super::{
    Engine,
    allocations::amount_change_plan,
    audit::AuditTrail,
    ledger::{AllocationLedger, ensure_version},
    with_tx,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ExpensesCursor {
    spent_on: NaiveDate,
    expense_id: String,
}

impl ExpensesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))
    }
}

impl Engine {
    /// Creates an expense and returns its id.
    ///
    /// With a `budget_id` the user needs write access to that budget.
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<Uuid> {
        let title = normalize_required_name(&cmd.title, "expense")?;
        let description = normalize_optional_text(cmd.description.as_deref());
        with_tx!(self, |db_tx| {
            match cmd.budget_id {
                Some(budget_id) => {
                    self.require_budget_write(&db_tx, budget_id, &cmd.user_id)
                        .await?;
                }
                None => self.require_user_exists(&db_tx, &cmd.user_id).await?,
            }

            let created_at = now();
            let expense = Expense::new(
                title,
                description,
                cmd.amount,
                cmd.category,
                cmd.spent_on,
                cmd.budget_id,
                &cmd.user_id,
                created_at,
            )?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;

            let audit = AuditTrail::new(&db_tx, &cmd.user_id, created_at);
            audit
                .record(
                    ActionType::CreateExpense,
                    expense.budget_id,
                    Some(expense.id),
                    None::<&Expense>,
                )
                .await?;
            audit.revision(&expense, RevisionKind::Added).await?;

            tracing::info!(
                expense_id = %expense.id,
                budget_id = ?expense.budget_id,
                amount = %expense.amount,
                "expense created"
            );
            Ok(expense.id)
        })
    }

    /// Applies a patch to an expense and returns the stored result.
    ///
    /// A changed amount rescales the allocations, unless the command asks to
    /// discard them; discarding drops them whether or not the amount changed.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        let title = cmd
            .title
            .as_deref()
            .map(|t| normalize_required_name(t, "expense"))
            .transpose()?;
        if cmd.amount.is_some_and(|amount| !amount.is_positive()) {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let before = self
                .require_expense_write(&db_tx, cmd.expense_id, &cmd.user_id)
                .await?;
            ensure_version(&before, cmd.expected_version)?;
            self.apply_expense_update(&db_tx, before, &cmd, title).await
        })
    }

    /// Writes a patched expense with its allocations, audit entries and
    /// revision. `before` must be the stored row, already access-checked.
    pub(super) async fn apply_expense_update(
        &self,
        db: &DatabaseTransaction,
        before: Expense,
        cmd: &UpdateExpenseCmd,
        title: Option<String>,
    ) -> ResultEngine<Expense> {
        let updated_at = now();
        let mut after = before.clone();
        if let Some(title) = title {
            after.title = title;
        }
        if let Some(description) = cmd.description.as_deref() {
            after.description = normalize_optional_text(Some(description));
        }
        if let Some(amount) = cmd.amount {
            after.amount = amount;
        }
        if let Some(category) = cmd.category {
            after.category = category;
        }
        if let Some(spent_on) = cmd.spent_on {
            after.spent_on = spent_on;
        }

        let ledger = AllocationLedger::new(db);
        after.version = ledger.claim(&before, cmd.expected_version).await?;
        after.updated_by = Some(cmd.user_id.clone());
        after.updated_at = Some(updated_at);

        let audit = AuditTrail::new(db, &cmd.user_id, updated_at);
        audit
            .record(
                ActionType::UpdateExpense,
                before.budget_id,
                Some(before.id),
                Some(&before),
            )
            .await?;

        let allocations = ledger.load_set(&before).await?;
        let plan = amount_change_plan(
            &allocations,
            before.amount,
            after.amount,
            cmd.preserve_allocations,
        )?;
        if !plan.is_empty() {
            audit
                .record(
                    ActionType::DistributeExpense,
                    before.budget_id,
                    Some(before.id),
                    Some(allocations.items()),
                )
                .await?;
            ledger.apply(&allocations, &plan).await?;
        }

        expenses::ActiveModel::from(&after).update(db).await?;
        audit.revision(&after, RevisionKind::Modified).await?;

        tracing::info!(
            expense_id = %after.id,
            version = after.version,
            rescaled = cmd.preserve_allocations && before.amount != after.amount,
            "expense updated"
        );
        Ok(after)
    }

    /// Moves a personal expense into a budget, making it shareable.
    pub async fn assign_budget(
        &self,
        expense_id: Uuid,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let before = self
                .require_expense_write(&db_tx, expense_id, user_id)
                .await?;
            if before.budget_id.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "expense {expense_id} already belongs to a budget"
                )));
            }
            self.require_budget_write(&db_tx, budget_id, user_id)
                .await?;

            let updated_at = now();
            let mut after = before.clone();
            after.budget_id = Some(budget_id);
            after.version = AllocationLedger::new(&db_tx)
                .claim(&before, None)
                .await?;
            after.updated_by = Some(user_id.to_string());
            after.updated_at = Some(updated_at);
            expenses::ActiveModel::from(&after).update(&db_tx).await?;

            let audit = AuditTrail::new(&db_tx, user_id, updated_at);
            audit
                .record(
                    ActionType::UpdateExpense,
                    Some(budget_id),
                    Some(expense_id),
                    Some(&before),
                )
                .await?;
            audit.revision(&after, RevisionKind::Modified).await?;

            tracing::info!(
                expense_id = %expense_id,
                budget_id = %budget_id,
                "expense assigned to budget"
            );
            Ok(after)
        })
    }

    /// Deletes an expense with its allocations. Its history stays readable.
    pub async fn delete_expense(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let expense = self
                .require_expense_write(&db_tx, expense_id, user_id)
                .await?;
            self.remove_expense(&db_tx, &expense, user_id).await?;
            tracing::info!(expense_id = %expense_id, "expense deleted");
            Ok(())
        })
    }

    /// Deletes allocations and row, then records the deletion.
    pub(super) async fn remove_expense(
        &self,
        db: &DatabaseTransaction,
        expense: &Expense,
        user_id: &str,
    ) -> ResultEngine<()> {
        let ledger = AllocationLedger::new(db);
        ledger.claim(expense, None).await?;
        ledger.delete_all_by_expense(expense.id).await?;

        let recorded_at = now();
        let audit = AuditTrail::new(db, user_id, recorded_at);
        audit
            .record(
                ActionType::DeleteExpense,
                expense.budget_id,
                Some(expense.id),
                Some(expense),
            )
            .await?;
        let mut last = expense.clone();
        last.updated_by = Some(user_id.to_string());
        last.updated_at = Some(recorded_at);
        audit.revision(&last, RevisionKind::Deleted).await?;

        expenses::Entity::delete_by_id(expense.id.to_string())
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn expense(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_expense_read(&db_tx, expense_id, user_id).await
        })
    }

    /// Expenses of a budget, most recent first.
    pub async fn list_budget_expenses(
        &self,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await?;
            expenses::Entity::find()
                .filter(expenses::Column::BudgetId.eq(budget_id.to_string()))
                .order_by_desc(expenses::Column::SpentOn)
                .order_by_desc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Expense::try_from)
                .collect()
        })
    }

    /// Expenses of a budget, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(spent_on DESC, expense_id DESC)`.
    pub async fn budget_expenses_page(
        &self,
        budget_id: Uuid,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Expense>, Option<String>)> {
        if limit == 0 {
            return Err(EngineError::InvalidCursor(
                "limit must be greater than 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = expenses::Entity::find()
                .filter(expenses::Column::BudgetId.eq(budget_id.to_string()))
                .order_by_desc(expenses::Column::SpentOn)
                .order_by_desc(expenses::Column::Id)
                .limit(limit_plus_one);
            if let Some(cursor) = cursor {
                let cursor = ExpensesCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(expenses::Column::SpentOn.lt(cursor.spent_on))
                        .add(
                            Condition::all()
                                .add(expenses::Column::SpentOn.eq(cursor.spent_on))
                                .add(expenses::Column::Id.lt(cursor.expense_id)),
                        ),
                );
            }

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;
            let out = rows
                .into_iter()
                .take(limit as usize)
                .map(Expense::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let next_cursor = out.last().map(|e| ExpensesCursor {
                spent_on: e.spent_on,
                expense_id: e.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Number of expenses in a budget.
    pub async fn count_budget_expenses(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await?;
            let count = expenses::Entity::find()
                .filter(expenses::Column::BudgetId.eq(budget_id.to_string()))
                .count(&db_tx)
                .await?;
            Ok(count)
        })
    }

    /// The last `limit` expenses created by `user_id`, in any budget or none.
    pub async fn recent_expenses(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            expenses::Entity::find()
                .filter(expenses::Column::CreatedBy.eq(user_id.to_string()))
                .order_by_desc(expenses::Column::CreatedAt)
                .order_by_desc(expenses::Column::Id)
                .limit(limit)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Expense::try_from)
                .collect()
        })
    }

    /// Expenses of `user_id` outside any budget, most recent first.
    pub async fn list_personal_expenses(&self, user_id: &str) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            expenses::Entity::find()
                .filter(expenses::Column::BudgetId.is_null())
                .filter(expenses::Column::CreatedBy.eq(user_id.to_string()))
                .order_by_desc(expenses::Column::SpentOn)
                .order_by_desc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Expense::try_from)
                .collect()
        })
    }

    /// Sum of the expense amounts of a budget.
    pub async fn budget_total(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<MoneyCents> {
        let expenses = self.list_budget_expenses(budget_id, user_id).await?;
        sum_amounts(expenses.iter())
    }

    /// Totals per category over every expense created by `user_id`.
    ///
    /// Categories without expenses are left out.
    pub async fn expenses_by_category(
        &self,
        user_id: &str,
    ) -> ResultEngine<Vec<(ExpenseCategory, MoneyCents)>> {
        let all: Vec<Expense> = with_tx!(self, |db_tx| {
            expenses::Entity::find()
                .filter(expenses::Column::CreatedBy.eq(user_id.to_string()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Expense::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })?;

        let mut out = Vec::new();
        for category in ExpenseCategory::ALL {
            let mut matching = all.iter().filter(|e| e.category == category).peekable();
            if matching.peek().is_none() {
                continue;
            }
            out.push((category, sum_amounts(matching)?));
        }
        Ok(out)
    }
}

fn sum_amounts<'a>(
    mut expenses: impl Iterator<Item = &'a Expense>,
) -> ResultEngine<MoneyCents> {
    expenses.try_fold(MoneyCents::ZERO, |acc, e| {
        acc.checked_add(e.amount)
            .ok_or_else(|| EngineError::InvalidAmount("total too large".to_string()))
    })
}
