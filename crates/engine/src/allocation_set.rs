//! In-memory view of the allocations of one expense.
//!
//! [`AllocationSet`] holds the invariants of a split (one allocation per
//! participant, percentages summing to at most 100%) and computes, without
//! touching the database, the [`SplitPlan`] an operation would apply. The
//! ledger persists a plan only after it has been computed in full, so a
//! rejected request never leaves partial writes behind.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Allocation, EngineError, MoneyCents, Percentage, ResultEngine};

/// How much of an expense is covered by allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitState {
    Unsplit,
    PartiallySplit,
    FullySplit,
}

/// One line of a custom distribution request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Share {
    Percent(Percentage),
    /// Drop the participant's allocation, if any.
    Remove,
}

impl Share {
    /// Parses user input: blank means [`Share::Remove`].
    pub fn parse(raw: &str) -> ResultEngine<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::Remove);
        }
        raw.parse().map(Self::Percent)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationSet {
    expense_id: Uuid,
    expense_amount: MoneyCents,
    items: Vec<Allocation>,
}

/// Writes an operation needs, plus the resulting set.
#[derive(Clone, Debug, Default)]
pub(crate) struct SplitPlan {
    pub create: Vec<Allocation>,
    pub update: Vec<Allocation>,
    pub delete: Vec<Uuid>,
}

impl SplitPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

impl AllocationSet {
    pub fn new(expense_id: Uuid, expense_amount: MoneyCents, items: Vec<Allocation>) -> Self {
        Self {
            expense_id,
            expense_amount,
            items,
        }
    }

    pub fn expense_id(&self) -> Uuid {
        self.expense_id
    }

    pub fn expense_amount(&self) -> MoneyCents {
        self.expense_amount
    }

    pub fn items(&self) -> &[Allocation] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Allocation> {
        self.items
    }

    pub fn get(&self, user_id: &str) -> Option<&Allocation> {
        self.items.iter().find(|a| a.user_id == user_id)
    }

    pub fn total(&self) -> Percentage {
        self.items.iter().map(|a| a.percentage).sum()
    }

    pub fn remaining(&self) -> Percentage {
        self.total().remaining()
    }

    pub fn state(&self) -> SplitState {
        let total = self.total();
        if self.items.is_empty() || total.is_zero() {
            SplitState::Unsplit
        } else if total >= Percentage::HUNDRED {
            SplitState::FullySplit
        } else {
            SplitState::PartiallySplit
        }
    }

    /// Checks the split invariants. Violations are rejected, never clamped.
    pub fn check(&self) -> ResultEngine<()> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.expense_id != self.expense_id {
                return Err(EngineError::InvalidParticipant(format!(
                    "allocation {} belongs to another expense",
                    item.id
                )));
            }
            if !seen.insert(item.user_id.as_str()) {
                return Err(EngineError::InvalidParticipant(format!(
                    "duplicate allocation for {}",
                    item.user_id
                )));
            }
            if !item.percentage.is_positive() {
                return Err(EngineError::InvalidPercentage(format!(
                    "percentage for {} must be greater than 0",
                    item.user_id
                )));
            }
            if item.paid < MoneyCents::ZERO || item.paid > item.amount {
                return Err(EngineError::InvalidAmount(format!(
                    "{} paid {} of an allocation of {}",
                    item.user_id, item.paid, item.amount
                )));
            }
        }
        let total = self.total();
        if total > Percentage::HUNDRED {
            return Err(EngineError::PercentageOverflow {
                remaining: total.remaining(),
            });
        }
        Ok(())
    }

    /// Applies `plan` to a copy of the set.
    pub(crate) fn with_plan(&self, plan: &SplitPlan) -> AllocationSet {
        let mut items: Vec<Allocation> = self
            .items
            .iter()
            .filter(|a| !plan.delete.contains(&a.id))
            .map(|a| {
                plan.update
                    .iter()
                    .find(|u| u.id == a.id)
                    .cloned()
                    .unwrap_or_else(|| a.clone())
            })
            .collect();
        items.extend(plan.create.iter().cloned());
        AllocationSet::new(self.expense_id, self.expense_amount, items)
    }

    /// Splits the unallocated percentage evenly among `selected`.
    ///
    /// `roster` is the set of budget participants; a selected user must be in
    /// it and must not hold an allocation yet.
    pub(crate) fn plan_equal(
        &self,
        selected: &[String],
        roster: &HashSet<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<SplitPlan> {
        let remaining = self.remaining();
        if !remaining.is_positive() {
            return Err(EngineError::AlreadyFullyAllocated);
        }
        if selected.is_empty() {
            return Err(EngineError::NoParticipantsSelected);
        }

        let mut seen = HashSet::with_capacity(selected.len());
        for user_id in selected {
            if !seen.insert(user_id.as_str()) {
                return Err(EngineError::InvalidParticipant(format!(
                    "{user_id} selected twice"
                )));
            }
            if !roster.contains(user_id) {
                return Err(EngineError::InvalidParticipant(format!(
                    "{user_id} is not a budget participant"
                )));
            }
            if self.get(user_id).is_some() {
                return Err(EngineError::InvalidParticipant(format!(
                    "{user_id} already has an allocation"
                )));
            }
        }

        let shares = remaining.split_evenly(selected.len());
        let create = selected
            .iter()
            .zip(shares)
            .map(|(user_id, share)| {
                Allocation::new(
                    self.expense_id,
                    user_id,
                    share,
                    self.expense_amount,
                    true,
                    actor,
                    now,
                )
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(SplitPlan {
            create,
            ..Default::default()
        })
    }

    /// Sets explicit percentages (or removals) for the listed participants.
    ///
    /// Entries are applied in order on top of the allocations of participants
    /// the request does not mention; the running total must stay within 100%.
    pub(crate) fn plan_custom(
        &self,
        entries: &[(String, Share)],
        roster: &HashSet<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<SplitPlan> {
        let mut mentioned = HashSet::with_capacity(entries.len());
        for (user_id, _) in entries {
            if !mentioned.insert(user_id.as_str()) {
                return Err(EngineError::InvalidParticipant(format!(
                    "{user_id} listed twice"
                )));
            }
        }

        let mut running: Percentage = self
            .items
            .iter()
            .filter(|a| !mentioned.contains(a.user_id.as_str()))
            .map(|a| a.percentage)
            .sum();

        let mut plan = SplitPlan::default();
        for (user_id, share) in entries {
            let existing = self.get(user_id);
            let percentage = match share {
                Share::Remove => {
                    if let Some(allocation) = existing {
                        plan.delete.push(allocation.id);
                    }
                    continue;
                }
                Share::Percent(p) => *p,
            };

            if !roster.contains(user_id) {
                return Err(EngineError::InvalidParticipant(format!(
                    "{user_id} is not a budget participant"
                )));
            }
            if !percentage.is_positive() {
                return Err(EngineError::InvalidPercentage(
                    "percentage must be greater than 0".to_string(),
                ));
            }
            running = running.checked_add(percentage).ok_or_else(|| {
                EngineError::InvalidPercentage("percentage too large".to_string())
            })?;
            if running > Percentage::HUNDRED {
                return Err(EngineError::PercentageOverflow {
                    remaining: running.remaining(),
                });
            }

            match existing {
                Some(allocation) => {
                    let mut updated = allocation.clone();
                    updated.percentage = percentage;
                    updated.amount = self.expense_amount.share(percentage)?;
                    if updated.paid > updated.amount {
                        return Err(EngineError::InvalidAmount(format!(
                            "{user_id} already paid {}, more than the new share of {}",
                            updated.paid, updated.amount
                        )));
                    }
                    updated.equal_division = false;
                    refresh_paid_flag(&mut updated);
                    plan.update.push(updated);
                }
                None => plan.create.push(Allocation::new(
                    self.expense_id,
                    user_id,
                    percentage,
                    self.expense_amount,
                    false,
                    actor,
                    now,
                )?),
            }
        }

        Ok(plan)
    }

    /// Scales every `amount` and `paid` by `new_amount / old_amount`.
    ///
    /// Percentages are left untouched.
    pub(crate) fn plan_rescale(
        &self,
        old_amount: MoneyCents,
        new_amount: MoneyCents,
    ) -> ResultEngine<SplitPlan> {
        if old_amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "old amount must not be 0".to_string(),
            ));
        }
        if old_amount == new_amount {
            return Ok(SplitPlan::default());
        }
        let update = self
            .items
            .iter()
            .map(|a| {
                let mut scaled = a.clone();
                scaled.amount = a.amount.rescale(old_amount, new_amount)?;
                scaled.paid = a.paid.rescale(old_amount, new_amount)?;
                Ok(scaled)
            })
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(SplitPlan {
            update,
            ..Default::default()
        })
    }

    /// Drops every allocation.
    pub(crate) fn plan_discard(&self) -> SplitPlan {
        SplitPlan {
            delete: self.items.iter().map(|a| a.id).collect(),
            ..Default::default()
        }
    }

    /// Adds `amount` to the paid part of `user_id`'s allocation.
    pub(crate) fn plan_payment(&self, user_id: &str, amount: MoneyCents) -> ResultEngine<SplitPlan> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "payment must be > 0".to_string(),
            ));
        }
        let allocation = self.get(user_id).ok_or_else(|| {
            EngineError::KeyNotFound(format!("allocation for {user_id}"))
        })?;
        let paid = allocation
            .paid
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidAmount("payment too large".to_string()))?;
        if paid > allocation.amount {
            return Err(EngineError::InvalidAmount(format!(
                "payment exceeds outstanding amount {}",
                allocation.outstanding()
            )));
        }
        let mut updated = allocation.clone();
        updated.paid = paid;
        refresh_paid_flag(&mut updated);
        Ok(SplitPlan {
            update: vec![updated],
            ..Default::default()
        })
    }
}

fn refresh_paid_flag(allocation: &mut Allocation) {
    allocation.paid_in_full = allocation.paid.is_positive() && allocation.paid >= allocation.amount;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(users: &[&str]) -> HashSet<String> {
        users.iter().map(|u| u.to_string()).collect()
    }

    fn names(users: &[&str]) -> Vec<String> {
        users.iter().map(|u| u.to_string()).collect()
    }

    fn empty_set(amount_cents: i64) -> AllocationSet {
        AllocationSet::new(Uuid::new_v4(), MoneyCents::new(amount_cents), Vec::new())
    }

    fn applied(set: &AllocationSet, plan: &SplitPlan) -> AllocationSet {
        let next = set.with_plan(plan);
        next.check().unwrap();
        next
    }

    #[test]
    fn equal_split_of_hundred_euros() {
        let set = empty_set(100_00);
        let plan = set
            .plan_equal(&names(&["alice", "bob"]), &roster(&["alice", "bob"]), "alice", Utc::now())
            .unwrap();
        let next = applied(&set, &plan);

        assert_eq!(next.items().len(), 2);
        for item in next.items() {
            assert_eq!(item.percentage, Percentage::from_percent(50));
            assert_eq!(item.amount, MoneyCents::new(50_00));
            assert!(item.equal_division);
            assert_eq!(item.paid, MoneyCents::ZERO);
        }
        assert_eq!(next.state(), SplitState::FullySplit);
        assert_eq!(next.remaining(), Percentage::ZERO);
    }

    #[test]
    fn equal_split_only_spreads_remaining() {
        let set = empty_set(90_00);
        let first = set
            .plan_custom(
                &[("alice".to_string(), Share::Percent(Percentage::from_percent(40)))],
                &roster(&["alice", "bob", "carol", "dave"]),
                "alice",
                Utc::now(),
            )
            .unwrap();
        let set = applied(&set, &first);
        assert_eq!(set.state(), SplitState::PartiallySplit);

        let plan = set
            .plan_equal(
                &names(&["bob", "carol", "dave"]),
                &roster(&["alice", "bob", "carol", "dave"]),
                "alice",
                Utc::now(),
            )
            .unwrap();
        let new_total: Percentage = plan.create.iter().map(|a| a.percentage).sum();
        assert_eq!(new_total, Percentage::from_percent(60));
        for item in &plan.create {
            assert_eq!(item.percentage, Percentage::from_percent(20));
            assert_eq!(item.amount, MoneyCents::new(18_00));
        }
    }

    #[test]
    fn equal_split_rejects_bad_requests() {
        let set = empty_set(10_00);
        let everyone = roster(&["alice", "bob"]);

        let err = set.plan_equal(&[], &everyone, "alice", Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::NoParticipantsSelected);

        let err = set
            .plan_equal(&names(&["mallory"]), &everyone, "alice", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParticipant(_)));

        let err = set
            .plan_equal(&names(&["bob", "bob"]), &everyone, "alice", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParticipant(_)));

        let full = applied(
            &set,
            &set.plan_equal(&names(&["alice"]), &everyone, "alice", Utc::now())
                .unwrap(),
        );
        let err = full
            .plan_equal(&names(&["bob"]), &everyone, "alice", Utc::now())
            .unwrap_err();
        assert_eq!(err, EngineError::AlreadyFullyAllocated);
    }

    #[test]
    fn equal_split_rejects_participant_with_allocation() {
        let everyone = roster(&["alice", "bob"]);
        let set = empty_set(10_00);
        let set = applied(
            &set,
            &set.plan_custom(
                &[("alice".to_string(), Share::Percent(Percentage::from_percent(10)))],
                &everyone,
                "alice",
                Utc::now(),
            )
            .unwrap(),
        );
        let err = set
            .plan_equal(&names(&["alice", "bob"]), &everyone, "alice", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParticipant(_)));
    }

    #[test]
    fn custom_split_overflow_reports_remaining() {
        let set = empty_set(100_00);
        let err = set
            .plan_custom(
                &[
                    ("alice".to_string(), Share::Percent(Percentage::from_percent(60))),
                    ("bob".to_string(), Share::Percent(Percentage::from_percent(50))),
                ],
                &roster(&["alice", "bob"]),
                "alice",
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PercentageOverflow {
                remaining: Percentage::from_percent(-10)
            }
        );
    }

    #[test]
    fn custom_split_counts_unmentioned_allocations() {
        let everyone = roster(&["alice", "bob", "carol"]);
        let set = empty_set(100_00);
        let set = applied(
            &set,
            &set.plan_custom(
                &[("carol".to_string(), Share::Percent(Percentage::from_percent(30)))],
                &everyone,
                "alice",
                Utc::now(),
            )
            .unwrap(),
        );

        let err = set
            .plan_custom(
                &[
                    ("alice".to_string(), Share::Percent(Percentage::from_percent(60))),
                    ("bob".to_string(), Share::Percent(Percentage::from_percent(20))),
                ],
                &everyone,
                "alice",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::PercentageOverflow { .. }));
    }

    #[test]
    fn custom_split_updates_in_place_and_removes() {
        let everyone = roster(&["alice", "bob"]);
        let set = empty_set(200_00);
        let set = applied(
            &set,
            &set.plan_equal(&names(&["alice", "bob"]), &everyone, "alice", Utc::now())
                .unwrap(),
        );
        let alice_id = set.get("alice").unwrap().id;

        let entries = [
            ("alice".to_string(), Share::Percent(Percentage::from_percent(70))),
            ("bob".to_string(), Share::Remove),
        ];
        let plan = set.plan_custom(&entries, &everyone, "alice", Utc::now()).unwrap();
        assert!(plan.create.is_empty());
        assert_eq!(plan.update.len(), 1);
        assert_eq!(plan.delete.len(), 1);
        let next = applied(&set, &plan);

        let alice = next.get("alice").unwrap();
        assert_eq!(alice.id, alice_id);
        assert_eq!(alice.amount, MoneyCents::new(140_00));
        assert!(!alice.equal_division);
        assert!(next.get("bob").is_none());
        assert_eq!(next.remaining(), Percentage::from_percent(30));

        // Same request again: same final set.
        let again = next.plan_custom(&entries, &everyone, "alice", Utc::now()).unwrap();
        assert_eq!(applied(&next, &again), next);
    }

    #[test]
    fn custom_split_rejects_non_positive() {
        let set = empty_set(10_00);
        let err = set
            .plan_custom(
                &[("alice".to_string(), Share::Percent(Percentage::ZERO))],
                &roster(&["alice"]),
                "alice",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPercentage(_)));
        assert!(matches!(Share::parse("abc"), Err(EngineError::InvalidPercentage(_))));
        assert_eq!(Share::parse("  ").unwrap(), Share::Remove);
    }

    #[test]
    fn rescale_keeps_shares() {
        let everyone = roster(&["alice", "bob"]);
        let set = empty_set(100_00);
        let mut set = applied(
            &set,
            &set.plan_equal(&names(&["alice", "bob"]), &everyone, "alice", Utc::now())
                .unwrap(),
        );
        set = applied(&set, &set.plan_payment("bob", MoneyCents::new(20_00)).unwrap());

        let plan = set
            .plan_rescale(MoneyCents::new(100_00), MoneyCents::new(150_00))
            .unwrap();
        let next = applied(&set, &plan);
        for item in next.items() {
            assert_eq!(item.percentage, Percentage::from_percent(50));
            assert_eq!(item.amount, MoneyCents::new(75_00));
        }
        assert_eq!(next.get("bob").unwrap().paid, MoneyCents::new(30_00));

        assert!(set.plan_rescale(MoneyCents::new(5), MoneyCents::new(5)).unwrap().is_empty());
        assert!(set.plan_rescale(MoneyCents::ZERO, MoneyCents::new(5)).is_err());
    }

    #[test]
    fn payment_marks_paid_in_full() {
        let everyone = roster(&["alice"]);
        let set = empty_set(30_00);
        let set = applied(
            &set,
            &set.plan_equal(&names(&["alice"]), &everyone, "alice", Utc::now())
                .unwrap(),
        );
        let err = set.plan_payment("alice", MoneyCents::new(31_00)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        let next = applied(&set, &set.plan_payment("alice", MoneyCents::new(30_00)).unwrap());
        assert!(next.get("alice").unwrap().paid_in_full);
    }

    #[test]
    fn custom_split_cannot_drop_share_below_paid() {
        let everyone = roster(&["alice", "bob"]);
        let set = empty_set(100_00);
        let mut set = applied(
            &set,
            &set.plan_equal(&names(&["alice", "bob"]), &everyone, "alice", Utc::now())
                .unwrap(),
        );
        set = applied(&set, &set.plan_payment("bob", MoneyCents::new(50_00)).unwrap());

        let err = set
            .plan_custom(
                &[("bob".to_string(), Share::Percent(Percentage::from_percent(10)))],
                &everyone,
                "alice",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        // Raising the share keeps the payment and clears the settled flag.
        assert!(set.get("bob").unwrap().paid_in_full);
        let plan = set
            .plan_custom(
                &[
                    ("alice".to_string(), Share::Remove),
                    ("bob".to_string(), Share::Percent(Percentage::from_percent(80))),
                ],
                &everyone,
                "alice",
                Utc::now(),
            )
            .unwrap();
        let next = applied(&set, &plan);
        let bob = next.get("bob").unwrap();
        assert_eq!(bob.amount, MoneyCents::new(80_00));
        assert_eq!(bob.paid, MoneyCents::new(50_00));
        assert!(!bob.paid_in_full);
    }

    #[test]
    fn check_rejects_paid_above_amount() {
        let expense_id = Uuid::new_v4();
        let amount = MoneyCents::new(10_00);
        let mut item = Allocation::new(
            expense_id,
            "alice",
            Percentage::from_percent(50),
            amount,
            false,
            "alice",
            Utc::now(),
        )
        .unwrap();
        item.paid = MoneyCents::new(6_00);
        let set = AllocationSet::new(expense_id, amount, vec![item]);
        assert!(matches!(set.check(), Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn check_rejects_overfull_set() {
        let expense_id = Uuid::new_v4();
        let amount = MoneyCents::new(10_00);
        let items = ["alice", "bob"]
            .into_iter()
            .map(|u| {
                Allocation::new(expense_id, u, Percentage::from_percent(60), amount, false, u, Utc::now())
                    .unwrap()
            })
            .collect();
        let set = AllocationSet::new(expense_id, amount, items);
        assert!(matches!(set.check(), Err(EngineError::PercentageOverflow { .. })));
    }
}
