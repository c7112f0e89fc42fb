use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    ActionType, Budget, Expense, ResultEngine, UpdateBudgetCmd, budget_access, budgets, expenses,
    util::{normalize_optional_text, normalize_required_name, now},
};

use super::{AccessLevel, Engine, audit::AuditTrail, with_tx};

impl Engine {
    /// Creates a budget owned by `user_id` and returns its id.
    pub async fn new_budget(
        &self,
        name: &str,
        description: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "budget")?;
        let description = normalize_optional_text(description);
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let created_at = now();
            let budget = Budget::new(name, description, user_id, created_at);
            budgets::ActiveModel::from(&budget).insert(&db_tx).await?;
            budget_access::ActiveModel {
                budget_id: ActiveValue::Set(budget.id.to_string()),
                user_id: ActiveValue::Set(user_id.to_string()),
                role: ActiveValue::Set(AccessLevel::Owner.as_str().to_string()),
            }
            .insert(&db_tx)
            .await?;

            AuditTrail::new(&db_tx, user_id, created_at)
                .record(ActionType::CreateBudget, Some(budget.id), None, None::<&Budget>)
                .await?;

            tracing::info!(budget_id = %budget.id, owner = %user_id, "budget created");
            Ok(budget.id)
        })
    }

    /// Renames or re-describes a budget (editors and owner).
    pub async fn update_budget(&self, cmd: UpdateBudgetCmd) -> ResultEngine<Budget> {
        let name = cmd
            .name
            .as_deref()
            .map(|n| normalize_required_name(n, "budget"))
            .transpose()?;
        with_tx!(self, |db_tx| {
            let before = self
                .require_budget_write(&db_tx, cmd.budget_id, &cmd.user_id)
                .await?;

            let mut after = before.clone();
            if let Some(name) = name {
                after.name = name;
            }
            if let Some(description) = cmd.description.as_deref() {
                after.description = normalize_optional_text(Some(description));
            }

            budgets::ActiveModel::from(&after).update(&db_tx).await?;
            AuditTrail::new(&db_tx, &cmd.user_id, now())
                .record(
                    ActionType::UpdateBudget,
                    Some(before.id),
                    None,
                    Some(&before),
                )
                .await?;

            tracing::info!(budget_id = %after.id, "budget updated");
            Ok(after)
        })
    }

    /// Deletes a budget with its expenses, allocations and memberships
    /// (owner-only).
    ///
    /// Each expense gets a `delete_expense` audit entry and a deleted
    /// revision, so their history survives the budget.
    pub async fn delete_budget(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let budget = self
                .require_budget_owner(&db_tx, budget_id, user_id)
                .await?;

            let models = expenses::Entity::find()
                .filter(expenses::Column::BudgetId.eq(budget_id.to_string()))
                .order_by_asc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            let count = models.len();
            for model in models {
                let expense = Expense::try_from(model)?;
                self.remove_expense(&db_tx, &expense, user_id).await?;
            }

            budget_access::Entity::delete_many()
                .filter(budget_access::Column::BudgetId.eq(budget_id.to_string()))
                .exec(&db_tx)
                .await?;
            AuditTrail::new(&db_tx, user_id, now())
                .record(
                    ActionType::DeleteBudget,
                    Some(budget_id),
                    None,
                    Some(&budget),
                )
                .await?;
            budgets::Entity::delete_by_id(budget_id.to_string())
                .exec(&db_tx)
                .await?;

            tracing::info!(budget_id = %budget_id, expenses = count, "budget deleted");
            Ok(())
        })
    }

    pub async fn budget(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<Budget> {
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await
        })
    }

    /// Budgets the user owns or is a member of, by name.
    pub async fn list_budgets(&self, user_id: &str) -> ResultEngine<Vec<Budget>> {
        with_tx!(self, |db_tx| {
            let mut ids: HashSet<String> = budget_access::Entity::find()
                .filter(budget_access::Column::UserId.eq(user_id.to_string()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|m| m.budget_id)
                .collect();
            let owned = budgets::Entity::find()
                .filter(budgets::Column::OwnerId.eq(user_id.to_string()))
                .all(&db_tx)
                .await?;
            ids.extend(owned.into_iter().map(|m| m.id));

            budgets::Entity::find()
                .filter(budgets::Column::Id.is_in(ids))
                .order_by_asc(budgets::Column::Name)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Budget::try_from)
                .collect()
        })
    }
}
