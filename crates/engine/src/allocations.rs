//! Allocations.
//!
//! An [`Allocation`] is the share of one expense owed by one participant.
//! `amount` always follows from `percentage` and the expense amount, except
//! while an amount change is rescaled (then `amount` and `paid` are scaled by
//! the same ratio).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, Percentage, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub user_id: String,
    pub percentage: Percentage,
    pub amount: MoneyCents,
    pub paid: MoneyCents,
    pub paid_in_full: bool,
    /// `true` when the share came from an equal distribution.
    pub equal_division: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    /// Builds a new, unpaid allocation of `percentage` of `expense_amount`.
    pub fn new(
        expense_id: Uuid,
        user_id: &str,
        percentage: Percentage,
        expense_amount: MoneyCents,
        equal_division: bool,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            expense_id,
            user_id: user_id.to_string(),
            percentage,
            amount: expense_amount.share(percentage)?,
            paid: MoneyCents::ZERO,
            paid_in_full: false,
            equal_division,
            created_by: created_by.to_string(),
            created_at,
        })
    }

    /// Owed amount not yet paid.
    pub fn outstanding(&self) -> MoneyCents {
        self.amount - self.paid
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub percentage_units: i64,
    pub amount_minor: i64,
    pub paid_minor: i64,
    pub paid_in_full: bool,
    pub equal_division: bool,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Allocation> for ActiveModel {
    fn from(value: &Allocation) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            expense_id: ActiveValue::Set(value.expense_id.to_string()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            percentage_units: ActiveValue::Set(value.percentage.units()),
            amount_minor: ActiveValue::Set(value.amount.cents()),
            paid_minor: ActiveValue::Set(value.paid.cents()),
            paid_in_full: ActiveValue::Set(value.paid_in_full),
            equal_division: ActiveValue::Set(value.equal_division),
            created_by: ActiveValue::Set(value.created_by.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Allocation {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "allocation")?,
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            user_id: model.user_id,
            percentage: Percentage::from_units(model.percentage_units),
            amount: MoneyCents::new(model.amount_minor),
            paid: MoneyCents::new(model.paid_minor),
            paid_in_full: model.paid_in_full,
            equal_division: model.equal_division,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
