//! Shared-expense allocation engine.
//!
//! The [`Engine`] splits the expenses of a shared budget among its members,
//! keeps those splits consistent when an expense amount changes, and records
//! an append-only history of every change (audit entries and per-expense
//! revisions).
//!
//! Every public operation runs inside one database transaction: either all of
//! its writes (allocations, expense, audit entry, revision) commit together or
//! none do.

pub use allocation_set::{AllocationSet, Share, SplitState};
pub use allocations::Allocation;
pub use audit_entries::{ActionType, AuditEntry};
pub use budgets::Budget;
pub use commands::{
    CreateExpenseCmd, CustomSplitCmd, EqualSplitCmd, PaymentCmd, UpdateBudgetCmd,
    UpdateExpenseCmd,
};
pub use error::{EngineError, ErrorKind};
pub use expense_revisions::{ExpenseRevision, RevisionKind};
pub use expenses::{Expense, ExpenseCategory};
pub use money::MoneyCents;
pub use ops::{
    AccessLevel, AuditPage, BudgetAccessRegistry, DbAccessRegistry, Distribution, Engine,
    EngineBuilder, Participant,
};
pub use percentage::{Percentage, UNITS_PER_PERCENT};

mod allocation_set;
mod allocations;
mod audit_entries;
mod budget_access;
mod budgets;
mod commands;
mod error;
mod expense_revisions;
mod expenses;
mod money;
mod ops;
mod percentage;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
