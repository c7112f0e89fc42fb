//! Command structs for engine operations.
//!
//! These types group parameters for write operations (expenses, splits,
//! payments), keeping call sites readable and avoiding long argument lists.
//! `user_id` is always the acting user, supplied by the caller.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{ExpenseCategory, MoneyCents, Percentage, Share};

/// Create an expense, personal or inside a budget.
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount: MoneyCents,
    pub category: ExpenseCategory,
    pub spent_on: NaiveDate,
    pub budget_id: Option<Uuid>,
}

impl CreateExpenseCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        amount: MoneyCents,
        spent_on: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            amount,
            category: ExpenseCategory::default(),
            spent_on,
            budget_id: None,
        }
    }

    #[must_use]
    pub fn budget(mut self, budget_id: Uuid) -> Self {
        self.budget_id = Some(budget_id);
        self
    }

    #[must_use]
    pub fn category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Patch an expense.
///
/// `None` fields are left unchanged; an empty `description` clears it. When
/// the amount changes, `preserve_allocations` selects between rescaling the
/// existing allocations (default) and discarding them.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub expense_id: Uuid,
    pub user_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<MoneyCents>,
    pub category: Option<ExpenseCategory>,
    pub spent_on: Option<NaiveDate>,
    pub preserve_allocations: bool,
    pub expected_version: Option<i64>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            expense_id,
            user_id: user_id.into(),
            title: None,
            description: None,
            amount: None,
            category: None,
            spent_on: None,
            preserve_allocations: true,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn category(mut self, category: ExpenseCategory) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn spent_on(mut self, spent_on: NaiveDate) -> Self {
        self.spent_on = Some(spent_on);
        self
    }

    #[must_use]
    pub fn discard_allocations(mut self) -> Self {
        self.preserve_allocations = false;
        self
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Split the unallocated part of an expense evenly.
#[derive(Clone, Debug)]
pub struct EqualSplitCmd {
    pub expense_id: Uuid,
    pub user_id: String,
    pub participants: Vec<String>,
    pub expected_version: Option<i64>,
}

impl EqualSplitCmd {
    #[must_use]
    pub fn new<I, S>(expense_id: Uuid, user_id: impl Into<String>, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expense_id,
            user_id: user_id.into(),
            participants: participants.into_iter().map(Into::into).collect(),
            expected_version: None,
        }
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Set explicit shares for some participants. Entries apply in order.
#[derive(Clone, Debug)]
pub struct CustomSplitCmd {
    pub expense_id: Uuid,
    pub user_id: String,
    pub entries: Vec<(String, Share)>,
    pub expected_version: Option<i64>,
}

impl CustomSplitCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            expense_id,
            user_id: user_id.into(),
            entries: Vec::new(),
            expected_version: None,
        }
    }

    #[must_use]
    pub fn entry(mut self, participant: impl Into<String>, share: Share) -> Self {
        self.entries.push((participant.into(), share));
        self
    }

    #[must_use]
    pub fn percent(self, participant: impl Into<String>, percentage: Percentage) -> Self {
        self.entry(participant, Share::Percent(percentage))
    }

    #[must_use]
    pub fn remove(self, participant: impl Into<String>) -> Self {
        self.entry(participant, Share::Remove)
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Record that `participant` paid part of their allocation.
#[derive(Clone, Debug)]
pub struct PaymentCmd {
    pub expense_id: Uuid,
    pub user_id: String,
    pub participant: String,
    pub amount: MoneyCents,
    pub expected_version: Option<i64>,
}

impl PaymentCmd {
    #[must_use]
    pub fn new(
        expense_id: Uuid,
        user_id: impl Into<String>,
        participant: impl Into<String>,
        amount: MoneyCents,
    ) -> Self {
        Self {
            expense_id,
            user_id: user_id.into(),
            participant: participant.into(),
            amount,
            expected_version: None,
        }
    }

    #[must_use]
    pub fn expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Rename or re-describe a budget. An empty `description` clears it.
#[derive(Clone, Debug)]
pub struct UpdateBudgetCmd {
    pub budget_id: Uuid,
    pub user_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateBudgetCmd {
    #[must_use]
    pub fn new(budget_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            budget_id,
            user_id: user_id.into(),
            name: None,
            description: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
