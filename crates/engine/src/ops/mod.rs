use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod access;
mod allocations;
mod audit;
mod budgets;
mod expenses;
mod ledger;
mod memberships;
mod registry;
mod users;

pub use allocations::Distribution;
pub use audit::AuditPage;
pub use registry::{AccessLevel, BudgetAccessRegistry, DbAccessRegistry, Participant};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// An early return (`?`) drops the transaction, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    registry: Arc<dyn BudgetAccessRegistry>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    registry: Option<Arc<dyn BudgetAccessRegistry>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the membership lookup (defaults to [`DbAccessRegistry`]).
    pub fn registry(mut self, registry: Arc<dyn BudgetAccessRegistry>) -> EngineBuilder {
        self.registry = Some(registry);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(DbAccessRegistry)),
        })
    }
}
