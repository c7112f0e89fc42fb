use sea_orm::{ActiveModelTrait, ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, budget_access};

use super::{AccessLevel, Engine, Participant, with_tx};

impl Engine {
    /// Adds or updates a budget member (owner-only).
    ///
    /// `role` is `editor` or `viewer`; a budget has exactly one owner.
    pub async fn upsert_budget_member(
        &self,
        budget_id: Uuid,
        member_username: &str,
        role: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let role = AccessLevel::try_from(role)?;
        if role == AccessLevel::Owner {
            return Err(EngineError::InvalidRole(
                "a budget has a single owner".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let budget = self
                .require_budget_owner(&db_tx, budget_id, user_id)
                .await?;
            if member_username == budget.owner_id {
                return Err(EngineError::InvalidRole(
                    "cannot change the owner role".to_string(),
                ));
            }
            self.require_user_exists(&db_tx, member_username).await?;

            let active = budget_access::ActiveModel {
                budget_id: ActiveValue::Set(budget_id.to_string()),
                user_id: ActiveValue::Set(member_username.to_string()),
                role: ActiveValue::Set(role.as_str().to_string()),
            };

            // Upsert: insert if missing, otherwise update role.
            match budget_access::Entity::find_by_id((
                budget_id.to_string(),
                member_username.to_string(),
            ))
            .one(&db_tx)
            .await?
            {
                Some(_) => {
                    active.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }

            tracing::info!(
                budget_id = %budget_id,
                member = %member_username,
                role = role.as_str(),
                "budget member saved"
            );
            Ok(())
        })
    }

    /// Removes a budget member (owner-only).
    ///
    /// Existing allocations of the member are kept.
    pub async fn remove_budget_member(
        &self,
        budget_id: Uuid,
        member_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let budget = self
                .require_budget_owner(&db_tx, budget_id, user_id)
                .await?;
            if member_username == budget.owner_id {
                return Err(EngineError::InvalidRole(
                    "cannot remove budget owner".to_string(),
                ));
            }

            budget_access::Entity::delete_by_id((
                budget_id.to_string(),
                member_username.to_string(),
            ))
            .exec(&db_tx)
            .await?;

            tracing::info!(budget_id = %budget_id, member = %member_username, "budget member removed");
            Ok(())
        })
    }

    /// Lists budget members, owner first (any member may look).
    pub async fn list_budget_members(
        &self,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Participant>> {
        with_tx!(self, |db_tx| {
            self.require_budget_read(&db_tx, budget_id, user_id).await?;
            self.registry.list_participants(&db_tx, budget_id).await
        })
    }
}
