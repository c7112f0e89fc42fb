use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{
    ActionType, Allocation, AllocationSet, CustomSplitCmd, EngineError, EqualSplitCmd, Expense,
    MoneyCents, PaymentCmd, Percentage, ResultEngine, SplitState, UpdateExpenseCmd,
    allocation_set::SplitPlan,
    util::now,
};

use super::{
    Engine,
    audit::AuditTrail,
    ledger::{AllocationLedger, ensure_version},
    with_tx,
};

/// Allocations of one expense after an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub allocations: Vec<Allocation>,
    /// Percentage still unallocated.
    pub remaining: Percentage,
    pub state: SplitState,
    /// Expense version after the operation.
    pub version: i64,
}

impl Distribution {
    fn new(set: AllocationSet, version: i64) -> Self {
        Self {
            remaining: set.remaining(),
            state: set.state(),
            allocations: set.into_items(),
            version,
        }
    }
}

impl Engine {
    /// Splits the unallocated part of a shared expense evenly among the
    /// selected participants.
    pub async fn distribute_equally(&self, cmd: EqualSplitCmd) -> ResultEngine<Distribution> {
        let EqualSplitCmd {
            expense_id,
            user_id,
            participants,
            expected_version,
        } = cmd;
        with_tx!(self, |db_tx| {
            let distribution = self
                .distribute(
                    &db_tx,
                    expense_id,
                    &user_id,
                    expected_version,
                    |set, roster| set.plan_equal(&participants, roster, &user_id, now()),
                )
                .await?;
            tracing::info!(
                expense_id = %expense_id,
                participants = participants.len(),
                "expense split equally"
            );
            Ok(distribution)
        })
    }

    /// Sets explicit percentages for some participants of a shared expense.
    ///
    /// Either every entry is applied or none is.
    pub async fn distribute_custom(&self, cmd: CustomSplitCmd) -> ResultEngine<Distribution> {
        let CustomSplitCmd {
            expense_id,
            user_id,
            entries,
            expected_version,
        } = cmd;
        with_tx!(self, |db_tx| {
            let distribution = self
                .distribute(
                    &db_tx,
                    expense_id,
                    &user_id,
                    expected_version,
                    |set, roster| set.plan_custom(&entries, roster, &user_id, now()),
                )
                .await?;
            tracing::info!(
                expense_id = %expense_id,
                entries = entries.len(),
                remaining = %distribution.remaining,
                "expense split by percentage"
            );
            Ok(distribution)
        })
    }

    /// Changes the amount of an expense from `old_amount` to `new_amount` and
    /// keeps its allocations consistent.
    ///
    /// With `preserve_allocations` every amount and paid amount is scaled by
    /// `new_amount / old_amount` and percentages stay as they are; otherwise
    /// the allocations are deleted. `old_amount` must match the stored amount.
    /// The expense row, its revision and the audit trail are written the same
    /// way [`Engine::update_expense`] writes them.
    pub async fn on_expense_amount_changed(
        &self,
        expense_id: Uuid,
        old_amount: MoneyCents,
        new_amount: MoneyCents,
        preserve_allocations: bool,
        user_id: &str,
    ) -> ResultEngine<Distribution> {
        if !old_amount.is_positive() || !new_amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let expense = self
                .require_expense_write(&db_tx, expense_id, user_id)
                .await?;
            if expense.amount != old_amount {
                return Err(EngineError::ConcurrentModification(format!(
                    "expense {expense_id} amount is {}, not {old_amount}",
                    expense.amount
                )));
            }
            let ledger = AllocationLedger::new(&db_tx);
            if old_amount == new_amount && preserve_allocations {
                let set = ledger.load_set(&expense).await?;
                return Ok(Distribution::new(set, expense.version));
            }

            let mut cmd = UpdateExpenseCmd::new(expense_id, user_id).amount(new_amount);
            if !preserve_allocations {
                cmd = cmd.discard_allocations();
            }
            let after = self
                .apply_expense_update(&db_tx, expense, &cmd, None)
                .await?;
            let next = ledger.load_set(&after).await?;
            tracing::info!(
                expense_id = %expense_id,
                old_amount = %old_amount,
                new_amount = %new_amount,
                preserve_allocations,
                "allocations reconciled"
            );
            Ok(Distribution::new(next, after.version))
        })
    }

    /// Allocations of an expense with the unallocated remainder.
    pub async fn list_allocations(
        &self,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Distribution> {
        with_tx!(self, |db_tx| {
            let expense = self
                .require_expense_read(&db_tx, expense_id, user_id)
                .await?;
            let set = AllocationLedger::new(&db_tx).load_set(&expense).await?;
            Ok(Distribution::new(set, expense.version))
        })
    }

    /// The allocation of one participant, if any.
    pub async fn allocation(
        &self,
        expense_id: Uuid,
        participant: &str,
        user_id: &str,
    ) -> ResultEngine<Option<Allocation>> {
        with_tx!(self, |db_tx| {
            self.require_expense_read(&db_tx, expense_id, user_id)
                .await?;
            AllocationLedger::new(&db_tx)
                .get_by_expense_and_user(expense_id, participant)
                .await
        })
    }

    /// Records a payment against a participant's allocation.
    ///
    /// Participants may record their own payments; recording for someone else
    /// needs write access to the budget.
    pub async fn record_payment(&self, cmd: PaymentCmd) -> ResultEngine<Allocation> {
        let PaymentCmd {
            expense_id,
            user_id,
            participant,
            amount,
            expected_version,
        } = cmd;
        with_tx!(self, |db_tx| {
            let expense = if participant == user_id {
                self.require_expense_read(&db_tx, expense_id, &user_id)
                    .await?
            } else {
                self.require_expense_write(&db_tx, expense_id, &user_id)
                    .await?
            };
            ensure_version(&expense, expected_version)?;

            let ledger = AllocationLedger::new(&db_tx);
            let before = ledger.load_set(&expense).await?;
            let plan = before.plan_payment(&participant, amount)?;

            ledger.claim(&expense, expected_version).await?;
            AuditTrail::new(&db_tx, &user_id, now())
                .record(
                    ActionType::RecordPayment,
                    expense.budget_id,
                    Some(expense.id),
                    before.get(&participant),
                )
                .await?;
            let next = ledger.apply(&before, &plan).await?;
            let allocation = next
                .get(&participant)
                .cloned()
                .ok_or_else(|| EngineError::KeyNotFound(format!("allocation for {participant}")))?;
            tracing::info!(
                expense_id = %expense_id,
                participant = %participant,
                amount = %amount,
                paid_in_full = allocation.paid_in_full,
                "payment recorded"
            );
            Ok(allocation)
        })
    }

    /// Validates, plans and persists a distribution of a shared expense.
    ///
    /// Every check runs before the first write.
    async fn distribute<F>(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
        user_id: &str,
        expected_version: Option<i64>,
        build: F,
    ) -> ResultEngine<Distribution>
    where
        F: FnOnce(&AllocationSet, &HashSet<String>) -> ResultEngine<SplitPlan>,
    {
        let expense = self.require_expense_write(db, expense_id, user_id).await?;
        ensure_version(&expense, expected_version)?;
        let roster = self.roster(db, &expense).await?;

        let ledger = AllocationLedger::new(db);
        let before = ledger.load_set(&expense).await?;
        let plan = build(&before, &roster)?;
        before.with_plan(&plan).check()?;
        tracing::debug!(
            expense_id = %expense_id,
            create = plan.create.len(),
            update = plan.update.len(),
            delete = plan.delete.len(),
            "split planned"
        );

        let version = ledger.claim(&expense, expected_version).await?;
        AuditTrail::new(db, user_id, now())
            .record(
                ActionType::DistributeExpense,
                expense.budget_id,
                Some(expense.id),
                Some(before.items()),
            )
            .await?;
        let next = ledger.apply(&before, &plan).await?;
        Ok(Distribution::new(next, version))
    }

    /// Users an expense may be split among: the members of its budget.
    async fn roster(
        &self,
        db: &DatabaseTransaction,
        expense: &Expense,
    ) -> ResultEngine<HashSet<String>> {
        let budget_id = expense.budget_id.ok_or_else(|| {
            EngineError::InvalidParticipant(format!(
                "expense {} is personal and cannot be split",
                expense.id
            ))
        })?;
        let participants = self.registry.list_participants(db, budget_id).await?;
        Ok(participants.into_iter().map(|p| p.user_id).collect())
    }
}

/// Rescale or discard, depending on the caller's choice.
pub(super) fn amount_change_plan(
    set: &AllocationSet,
    old_amount: MoneyCents,
    new_amount: MoneyCents,
    preserve_allocations: bool,
) -> ResultEngine<SplitPlan> {
    if preserve_allocations {
        set.plan_rescale(old_amount, new_amount)
    } else {
        Ok(set.plan_discard())
    }
}
