//! Expense revision log.
//!
//! Each committed change to an expense appends one row holding the state of
//! the expense *after* the change. Revisions are numbered per expense from 1.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ResultEngine,
    util::{parse_optional_uuid, parse_uuid, restore_json},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Added,
    Modified,
    Deleted,
}

impl RevisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl TryFrom<&str> for RevisionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            other => Err(EngineError::AuditCapture(format!(
                "invalid revision kind: {other}"
            ))),
        }
    }
}

/// One entry of an expense history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRevision {
    pub expense_id: Uuid,
    pub revision: i64,
    pub kind: RevisionKind,
    pub budget_id: Option<Uuid>,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
    /// State of the expense as committed by this revision.
    pub expense: Expense,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_revisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub expense_id: String,
    pub revision: i64,
    pub kind: String,
    pub budget_id: Option<String>,
    pub created_by: String,
    pub state: String,
    pub actor: String,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn append(
        expense: &Expense,
        revision: i64,
        kind: RevisionKind,
        state: String,
        actor: &str,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActiveValue::NotSet,
            expense_id: ActiveValue::Set(expense.id.to_string()),
            revision: ActiveValue::Set(revision),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            budget_id: ActiveValue::Set(expense.budget_id.map(|id| id.to_string())),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            state: ActiveValue::Set(state),
            actor: ActiveValue::Set(actor.to_string()),
            recorded_at: ActiveValue::Set(recorded_at),
        }
    }
}

impl TryFrom<Model> for ExpenseRevision {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            revision: model.revision,
            kind: RevisionKind::try_from(model.kind.as_str())?,
            budget_id: parse_optional_uuid(model.budget_id.as_deref(), "budget")?,
            actor: model.actor,
            recorded_at: model.recorded_at,
            expense: restore_json(&model.state, "expense revision")?,
        })
    }
}
