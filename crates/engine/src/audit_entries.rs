//! Append-only audit log.
//!
//! Every mutating operation on a budget or an expense appends one
//! [`AuditEntry`] holding the serialized state of the object *before* the
//! change. Entries reference budgets and expenses by id only, so they outlive
//! the objects they describe.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_optional_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateBudget,
    UpdateBudget,
    DeleteBudget,
    CreateExpense,
    UpdateExpense,
    DeleteExpense,
    DistributeExpense,
    RecordPayment,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateBudget => "create_budget",
            Self::UpdateBudget => "update_budget",
            Self::DeleteBudget => "delete_budget",
            Self::CreateExpense => "create_expense",
            Self::UpdateExpense => "update_expense",
            Self::DeleteExpense => "delete_expense",
            Self::DistributeExpense => "distribute_expense",
            Self::RecordPayment => "record_payment",
        }
    }
}

impl TryFrom<&str> for ActionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "create_budget" => Ok(Self::CreateBudget),
            "update_budget" => Ok(Self::UpdateBudget),
            "delete_budget" => Ok(Self::DeleteBudget),
            "create_expense" => Ok(Self::CreateExpense),
            "update_expense" => Ok(Self::UpdateExpense),
            "delete_expense" => Ok(Self::DeleteExpense),
            "distribute_expense" => Ok(Self::DistributeExpense),
            "record_payment" => Ok(Self::RecordPayment),
            other => Err(EngineError::AuditCapture(format!(
                "invalid action type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: ActionType,
    pub budget_id: Option<Uuid>,
    pub expense_id: Option<Uuid>,
    /// JSON pre-image; `None` for creations.
    pub object_before: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub action: String,
    pub budget_id: Option<String>,
    pub expense_id: Option<String>,
    pub object_before: Option<String>,
    pub actor: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn append(
        action: ActionType,
        budget_id: Option<Uuid>,
        expense_id: Option<Uuid>,
        object_before: Option<String>,
        actor: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActiveValue::NotSet,
            action: ActiveValue::Set(action.as_str().to_string()),
            budget_id: ActiveValue::Set(budget_id.map(|id| id.to_string())),
            expense_id: ActiveValue::Set(expense_id.map(|id| id.to_string())),
            object_before: ActiveValue::Set(object_before),
            actor: ActiveValue::Set(actor.to_string()),
            created_at: ActiveValue::Set(created_at),
        }
    }
}

impl TryFrom<Model> for AuditEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            action: ActionType::try_from(model.action.as_str())?,
            budget_id: parse_optional_uuid(model.budget_id.as_deref(), "budget")?,
            expense_id: parse_optional_uuid(model.expense_id.as_deref(), "expense")?,
            object_before: model.object_before,
            actor: model.actor,
            created_at: model.created_at,
        })
    }
}
