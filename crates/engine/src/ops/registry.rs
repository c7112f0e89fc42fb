//! Who may see and change a budget.
//!
//! The engine never reads memberships directly: it asks a
//! [`BudgetAccessRegistry`], so the membership store can live elsewhere.
//! [`DbAccessRegistry`] is the default, backed by the `budget_access` table.

use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, budget_access, budgets};

/// Membership role, from most to least privileged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Owner,
    Editor,
    Viewer,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Editor => 2,
            Self::Viewer => 1,
        }
    }

    /// `true` when this role grants at least `required`.
    pub fn covers(self, required: AccessLevel) -> bool {
        self.rank() >= required.rank()
    }

    pub fn can_write(self) -> bool {
        self.covers(Self::Editor)
    }
}

impl TryFrom<&str> for AccessLevel {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(EngineError::InvalidRole(format!(
                "invalid membership role: {other}"
            ))),
        }
    }
}

/// A user taking part in a budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub level: AccessLevel,
}

#[async_trait]
pub trait BudgetAccessRegistry: Send + Sync + Debug {
    /// Role of `user_id` in the budget, `None` when not a member or when the
    /// budget does not exist.
    async fn access_level(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<AccessLevel>>;

    /// Members of the budget, owner first.
    async fn list_participants(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
    ) -> ResultEngine<Vec<Participant>>;

    async fn has_access(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
        level: AccessLevel,
    ) -> ResultEngine<bool> {
        Ok(self
            .access_level(db, budget_id, user_id)
            .await?
            .is_some_and(|granted| granted.covers(level)))
    }
}

/// Memberships stored in `budget_access`; the budget owner always counts as
/// [`AccessLevel::Owner`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DbAccessRegistry;

#[async_trait]
impl BudgetAccessRegistry for DbAccessRegistry {
    async fn access_level(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<AccessLevel>> {
        let Some(budget) = budgets::Entity::find_by_id(budget_id.to_string())
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        if budget.owner_id == user_id {
            return Ok(Some(AccessLevel::Owner));
        }
        let row = budget_access::Entity::find_by_id((budget_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        row.as_ref()
            .map(|m| AccessLevel::try_from(m.role.as_str()))
            .transpose()
    }

    async fn list_participants(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
    ) -> ResultEngine<Vec<Participant>> {
        let Some(budget) = budgets::Entity::find_by_id(budget_id.to_string())
            .one(db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let rows = budget_access::Entity::find()
            .filter(budget_access::Column::BudgetId.eq(budget_id.to_string()))
            .order_by_asc(budget_access::Column::UserId)
            .all(db)
            .await?;

        let mut out = vec![Participant {
            user_id: budget.owner_id.clone(),
            level: AccessLevel::Owner,
        }];
        for row in rows {
            if row.user_id == budget.owner_id {
                continue;
            }
            out.push(Participant {
                level: AccessLevel::try_from(row.role.as_str())?,
                user_id: row.user_id,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered() {
        assert!(AccessLevel::Owner.covers(AccessLevel::Editor));
        assert!(AccessLevel::Editor.covers(AccessLevel::Editor));
        assert!(!AccessLevel::Viewer.covers(AccessLevel::Editor));
        assert!(AccessLevel::Viewer.covers(AccessLevel::Viewer));
        assert!(!AccessLevel::Viewer.can_write());
    }

    #[test]
    fn role_parses_from_storage_name() {
        for level in [AccessLevel::Owner, AccessLevel::Editor, AccessLevel::Viewer] {
            assert_eq!(AccessLevel::try_from(level.as_str()).unwrap(), level);
        }
        assert!(matches!(
            AccessLevel::try_from("admin"),
            Err(EngineError::InvalidRole(_))
        ));
    }
}
