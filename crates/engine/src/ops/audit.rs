//! Audit entries and expense revisions.
//!
//! Both are append-only. Writes happen through [`AuditTrail`] inside the
//! transaction of the mutation they describe, so a failed capture aborts the
//! mutation.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ActionType, AuditEntry, EngineError, Expense, ExpenseRevision, ResultEngine, RevisionKind,
    audit_entries, expense_revisions, util::snapshot_json,
};

use super::{Engine, with_tx};

pub(crate) struct AuditTrail<'a> {
    db: &'a DatabaseTransaction,
    actor: &'a str,
    now: DateTime<Utc>,
}

impl<'a> AuditTrail<'a> {
    pub fn new(db: &'a DatabaseTransaction, actor: &'a str, now: DateTime<Utc>) -> Self {
        Self { db, actor, now }
    }

    /// Appends an audit entry with the serialized state before the change.
    pub async fn record<T: Serialize + ?Sized>(
        &self,
        action: ActionType,
        budget_id: Option<Uuid>,
        expense_id: Option<Uuid>,
        before: Option<&T>,
    ) -> ResultEngine<()> {
        let object_before = before
            .map(|value| snapshot_json(value, action.as_str()))
            .transpose()?;
        audit_entries::ActiveModel::append(
            action,
            budget_id,
            expense_id,
            object_before,
            self.actor,
            self.now,
        )
        .insert(self.db)
        .await?;
        Ok(())
    }

    /// Appends the next revision of `expense` and returns its number.
    pub async fn revision(&self, expense: &Expense, kind: RevisionKind) -> ResultEngine<i64> {
        let last = expense_revisions::Entity::find()
            .filter(expense_revisions::Column::ExpenseId.eq(expense.id.to_string()))
            .order_by_desc(expense_revisions::Column::Revision)
            .one(self.db)
            .await?;
        let revision = last.map_or(1, |m| m.revision + 1);
        let state = snapshot_json(expense, "expense revision")?;
        expense_revisions::ActiveModel::append(expense, revision, kind, state, self.actor, self.now)
            .insert(self.db)
            .await?;
        Ok(revision)
    }
}

/// One page of audit entries, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    /// Pass back to fetch the following page; `None` on the last page.
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AuditCursor {
    after_id: i64,
}

impl AuditCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid audit cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid audit cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid audit cursor".to_string()))
    }
}

impl Engine {
    /// Revision numbers of an expense, ascending. Empty for an expense without
    /// history.
    pub async fn list_revisions(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<Vec<i64>> {
        with_tx!(self, |db_tx| {
            self.require_history_read(&db_tx, expense_id, user_id)
                .await?;
            let rows = expense_revisions::Entity::find()
                .filter(expense_revisions::Column::ExpenseId.eq(expense_id.to_string()))
                .order_by_asc(expense_revisions::Column::Revision)
                .all(&db_tx)
                .await?;
            Ok(rows.into_iter().map(|m| m.revision).collect())
        })
    }

    /// The expense exactly as committed by `revision`.
    pub async fn expense_at_revision(
        &self,
        expense_id: Uuid,
        revision: i64,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_history_read(&db_tx, expense_id, user_id)
                .await?;
            let model = expense_revisions::Entity::find()
                .filter(expense_revisions::Column::ExpenseId.eq(expense_id.to_string()))
                .filter(expense_revisions::Column::Revision.eq(revision))
                .one(&db_tx)
                .await?
                .ok_or_else(|| {
                    EngineError::KeyNotFound(format!("revision {revision} not exists"))
                })?;
            Ok(ExpenseRevision::try_from(model)?.expense)
        })
    }

    /// Full revision records (kind, actor, time and state), ascending.
    pub async fn expense_revisions(
        &self,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<ExpenseRevision>> {
        with_tx!(self, |db_tx| {
            self.require_history_read(&db_tx, expense_id, user_id)
                .await?;
            expense_revisions::Entity::find()
                .filter(expense_revisions::Column::ExpenseId.eq(expense_id.to_string()))
                .order_by_asc(expense_revisions::Column::Revision)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(ExpenseRevision::try_from)
                .collect()
        })
    }

    /// Audit entries of an expense, oldest first.
    pub async fn expense_audit_entries(
        &self,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<AuditEntry>> {
        with_tx!(self, |db_tx| {
            self.require_history_read(&db_tx, expense_id, user_id)
                .await?;
            audit_entries::Entity::find()
                .filter(audit_entries::Column::ExpenseId.eq(expense_id.to_string()))
                .order_by_asc(audit_entries::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(AuditEntry::try_from)
                .collect()
        })
    }

    /// Audit entries of a budget and its expenses, with cursor-based
    /// pagination.
    ///
    /// Pagination is oldest → newer by entry id. `limit` must be positive.
    pub async fn budget_audit_entries(
        &self,
        budget_id: Uuid,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<AuditPage> {
        if limit == 0 {
            return Err(EngineError::InvalidCursor(
                "limit must be greater than 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = audit_entries::Entity::find()
                .filter(audit_entries::Column::BudgetId.eq(budget_id.to_string()))
                .order_by_asc(audit_entries::Column::Id)
                .limit(limit_plus_one);
            if let Some(cursor) = cursor {
                let cursor = AuditCursor::decode(cursor)?;
                query = query.filter(audit_entries::Column::Id.gt(cursor.after_id));
            }

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;
            let entries = rows
                .into_iter()
                .take(limit as usize)
                .map(AuditEntry::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let next_cursor = if has_more {
                entries
                    .last()
                    .map(|e| AuditCursor { after_id: e.id }.encode())
                    .transpose()?
            } else {
                None
            };

            Ok(AuditPage {
                entries,
                next_cursor,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_and_rejects_garbage() {
        let encoded = AuditCursor { after_id: 42 }.encode().unwrap();
        assert_eq!(AuditCursor::decode(&encoded).unwrap().after_id, 42);
        assert!(matches!(
            AuditCursor::decode("not a cursor!"),
            Err(EngineError::InvalidCursor(_))
        ));
    }
}
