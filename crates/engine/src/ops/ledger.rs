//! Persistence of allocations.
//!
//! Allocation rows are only written through [`AllocationLedger::apply`], which
//! checks the resulting set before the first write and re-reads the stored
//! total after the last one. Callers run it inside the transaction of their
//! operation.

use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Allocation, AllocationSet, EngineError, Expense, Percentage, ResultEngine,
    allocation_set::SplitPlan, allocations, expenses,
};

pub(crate) struct AllocationLedger<'a> {
    db: &'a DatabaseTransaction,
}

impl<'a> AllocationLedger<'a> {
    pub fn new(db: &'a DatabaseTransaction) -> Self {
        Self { db }
    }

    pub async fn list_by_expense(&self, expense_id: Uuid) -> ResultEngine<Vec<Allocation>> {
        allocations::Entity::find()
            .filter(allocations::Column::ExpenseId.eq(expense_id.to_string()))
            .order_by_asc(allocations::Column::CreatedAt)
            .order_by_asc(allocations::Column::UserId)
            .all(self.db)
            .await?
            .into_iter()
            .map(Allocation::try_from)
            .collect()
    }

    pub async fn get_by_expense_and_user(
        &self,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<Allocation>> {
        allocations::Entity::find()
            .filter(allocations::Column::ExpenseId.eq(expense_id.to_string()))
            .filter(allocations::Column::UserId.eq(user_id.to_string()))
            .one(self.db)
            .await?
            .map(Allocation::try_from)
            .transpose()
    }

    pub async fn load_set(&self, expense: &Expense) -> ResultEngine<AllocationSet> {
        let items = self.list_by_expense(expense.id).await?;
        Ok(AllocationSet::new(expense.id, expense.amount, items))
    }

    /// Persists `plan` on top of `current` and returns the resulting set.
    ///
    /// Nothing is written when the resulting set breaks an invariant.
    pub async fn apply(
        &self,
        current: &AllocationSet,
        plan: &SplitPlan,
    ) -> ResultEngine<AllocationSet> {
        let next = current.with_plan(plan);
        next.check()?;
        if plan.is_empty() {
            return Ok(next);
        }

        for id in &plan.delete {
            allocations::Entity::delete_by_id(id.to_string())
                .exec(self.db)
                .await?;
        }
        for allocation in &plan.update {
            allocations::ActiveModel::from(allocation)
                .update(self.db)
                .await?;
        }
        for allocation in &plan.create {
            allocations::ActiveModel::from(allocation)
                .insert(self.db)
                .await?;
        }

        self.verify_total(current.expense_id()).await?;
        Ok(next)
    }

    /// Removes every allocation of the expense, bypassing the plan checks
    /// (an empty set is always valid).
    pub async fn delete_all_by_expense(&self, expense_id: Uuid) -> ResultEngine<u64> {
        let res = allocations::Entity::delete_many()
            .filter(allocations::Column::ExpenseId.eq(expense_id.to_string()))
            .exec(self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn verify_total(&self, expense_id: Uuid) -> ResultEngine<()> {
        let total: Percentage = self
            .list_by_expense(expense_id)
            .await?
            .iter()
            .map(|a| a.percentage)
            .sum();
        if total > Percentage::HUNDRED {
            return Err(EngineError::PercentageOverflow {
                remaining: total.remaining(),
            });
        }
        Ok(())
    }

    /// Bumps the expense version if it still equals the version the caller
    /// read.
    ///
    /// `expected` defaults to the version of `expense`. Another writer having
    /// committed in between yields `ConcurrentModification`.
    pub async fn claim(&self, expense: &Expense, expected: Option<i64>) -> ResultEngine<i64> {
        let expected = expected.unwrap_or(expense.version);
        ensure_version(expense, Some(expected))?;
        let res = expenses::Entity::update_many()
            .col_expr(
                expenses::Column::Version,
                Expr::col(expenses::Column::Version).add(1),
            )
            .filter(expenses::Column::Id.eq(expense.id.to_string()))
            .filter(expenses::Column::Version.eq(expected))
            .exec(self.db)
            .await?;
        if res.rows_affected == 0 {
            tracing::warn!(expense_id = %expense.id, expected, "lost optimistic write race");
            return Err(concurrent(expense.id));
        }
        Ok(expected + 1)
    }
}

/// Rejects a request built on a version other than the stored one.
pub(crate) fn ensure_version(expense: &Expense, expected: Option<i64>) -> ResultEngine<()> {
    match expected {
        Some(v) if v != expense.version => {
            tracing::warn!(
                expense_id = %expense.id,
                expected = v,
                stored = expense.version,
                "stale expense version"
            );
            Err(concurrent(expense.id))
        }
        _ => Ok(()),
    }
}

fn concurrent(expense_id: Uuid) -> EngineError {
    EngineError::ConcurrentModification(format!("expense {expense_id} changed, reload and retry"))
}
