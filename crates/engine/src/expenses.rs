//! Expense primitives.
//!
//! An `Expense` with a `budget_id` is shared among the budget members and can
//! be split into allocations; without one it is a personal expense.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Food,
    Transport,
    Housing,
    Entertainment,
    Health,
    Shopping,
    Utilities,
    Travel,
    Education,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 10] = [
        Self::Food,
        Self::Transport,
        Self::Housing,
        Self::Entertainment,
        Self::Health,
        Self::Shopping,
        Self::Utilities,
        Self::Travel,
        Self::Education,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Housing => "housing",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Shopping => "shopping",
            Self::Utilities => "utilities",
            Self::Travel => "travel",
            Self::Education => "education",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for ExpenseCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| {
                EngineError::InvalidCategory(format!("unknown expense category: {value}"))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: MoneyCents,
    pub category: ExpenseCategory,
    pub spent_on: NaiveDate,
    pub budget_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped by every write to the expense or its allocations.
    pub version: i64,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: String,
        description: Option<String>,
        amount: MoneyCents,
        category: ExpenseCategory,
        spent_on: NaiveDate,
        budget_id: Option<Uuid>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            description,
            amount,
            category,
            spent_on,
            budget_id,
            created_by: created_by.to_string(),
            created_at,
            updated_by: None,
            updated_at: None,
            version: 0,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub category: String,
    pub spent_on: Date,
    pub budget_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTimeUtc>,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Budgets,
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(value: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            title: ActiveValue::Set(value.title.clone()),
            description: ActiveValue::Set(value.description.clone()),
            amount_minor: ActiveValue::Set(value.amount.cents()),
            category: ActiveValue::Set(value.category.as_str().to_string()),
            spent_on: ActiveValue::Set(value.spent_on),
            budget_id: ActiveValue::Set(value.budget_id.map(|id| id.to_string())),
            created_by: ActiveValue::Set(value.created_by.clone()),
            created_at: ActiveValue::Set(value.created_at),
            updated_by: ActiveValue::Set(value.updated_by.clone()),
            updated_at: ActiveValue::Set(value.updated_at),
            version: ActiveValue::Set(value.version),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            title: model.title,
            description: model.description,
            amount: MoneyCents::new(model.amount_minor),
            category: ExpenseCategory::try_from(model.category.as_str())?,
            spent_on: model.spent_on,
            budget_id: parse_optional_uuid(model.budget_id.as_deref(), "budget")?,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_by: model.updated_by,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}
