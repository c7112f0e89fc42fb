use sea_orm::{ActiveModelTrait, ActiveValue, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, users,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a user that budgets and allocations can refer to.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> ResultEngine<()> {
        let username = normalize_required_name(username, "user")?;
        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(format!(
                    "user already exists: {username}"
                )));
            }

            users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                display_name: ActiveValue::Set(normalize_optional_text(display_name)),
                email: ActiveValue::Set(normalize_optional_text(email)),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(username = %username, "user created");
            Ok(())
        })
    }
}
