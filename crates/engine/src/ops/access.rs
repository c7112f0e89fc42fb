use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    Budget, EngineError, Expense, ResultEngine, budgets, expense_revisions, expenses, users,
};

use super::{AccessLevel, Engine};

fn budget_not_found() -> EngineError {
    EngineError::KeyNotFound("budget not exists".to_string())
}

fn expense_not_found() -> EngineError {
    EngineError::KeyNotFound("expense not exists".to_string())
}

impl Engine {
    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }
        Ok(())
    }

    /// Loads a budget the user can see, with the user's role.
    ///
    /// Unknown budgets and budgets the user is not a member of both report
    /// `KeyNotFound`.
    async fn require_budget_access(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(Budget, AccessLevel)> {
        let model = budgets::Entity::find_by_id(budget_id.to_string())
            .one(db)
            .await?
            .ok_or_else(budget_not_found)?;
        let level = self
            .registry
            .access_level(db, budget_id, user_id)
            .await?
            .ok_or_else(budget_not_found)?;
        Ok((Budget::try_from(model)?, level))
    }

    pub(super) async fn require_budget_read(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Budget> {
        let (budget, _) = self.require_budget_access(db, budget_id, user_id).await?;
        Ok(budget)
    }

    pub(super) async fn require_budget_write(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Budget> {
        let (budget, level) = self.require_budget_access(db, budget_id, user_id).await?;
        if !level.can_write() {
            return Err(EngineError::Forbidden(format!(
                "{user_id} cannot edit budget {budget_id}"
            )));
        }
        Ok(budget)
    }

    pub(super) async fn require_budget_owner(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Budget> {
        let (budget, level) = self.require_budget_access(db, budget_id, user_id).await?;
        if level != AccessLevel::Owner {
            return Err(EngineError::Forbidden(format!(
                "only the owner can manage budget {budget_id}"
            )));
        }
        Ok(budget)
    }

    pub(super) async fn find_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Option<Expense>> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .map(Expense::try_from)
            .transpose()
    }

    /// Shared expenses follow the budget roles; personal ones are visible to
    /// their creator only.
    pub(super) async fn require_expense_read(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        let expense = self
            .find_expense(db, expense_id)
            .await?
            .ok_or_else(expense_not_found)?;
        match expense.budget_id {
            Some(budget_id) => {
                let level = self.registry.access_level(db, budget_id, user_id).await?;
                if level.is_none() {
                    return Err(expense_not_found());
                }
            }
            None if expense.created_by != user_id => return Err(expense_not_found()),
            None => {}
        }
        Ok(expense)
    }

    pub(super) async fn require_expense_write(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        let expense = self.require_expense_read(db, expense_id, user_id).await?;
        if let Some(budget_id) = expense.budget_id {
            self.require_budget_write(db, budget_id, user_id).await?;
        }
        Ok(expense)
    }

    /// Checks read access to the history of an expense, which may have been
    /// deleted since.
    ///
    /// For a deleted expense the last recorded budget decides; if that budget
    /// is gone too, only the creator keeps access.
    pub(super) async fn require_history_read(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        if self.find_expense(db, expense_id).await?.is_some() {
            self.require_expense_read(db, expense_id, user_id).await?;
            return Ok(());
        }

        let last = expense_revisions::Entity::find()
            .filter(expense_revisions::Column::ExpenseId.eq(expense_id.to_string()))
            .order_by_desc(expense_revisions::Column::Revision)
            .one(db)
            .await?
            .ok_or_else(expense_not_found)?;
        if last.created_by == user_id {
            return Ok(());
        }
        let Some(budget_id) = last.budget_id.as_deref() else {
            return Err(expense_not_found());
        };
        let budget_id = crate::util::parse_uuid(budget_id, "budget")?;
        let allowed = self
            .registry
            .has_access(db, budget_id, user_id, AccessLevel::Viewer)
            .await?;
        if !allowed {
            return Err(expense_not_found());
        }
        Ok(())
    }
}
