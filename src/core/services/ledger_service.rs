//! Reads and appends to a student's journal.

use uuid::Uuid;

use crate::{
    core::{
        balance::{BalanceCalculator, BalanceReport},
        context::LedgerContext,
        journal::JournalCursor,
    },
    currency::Money,
    errors::LedgerError,
    ledger::{ChangeSet, LedgerEntry, PendingEntry, StudentStatus},
};

use super::{require_student, ServiceResult};

pub struct LedgerService;

impl LedgerService {
    /// Entries ordered by date, then insertion order.
    pub fn entries(ctx: &LedgerContext, student_id: Uuid) -> ServiceResult<Vec<LedgerEntry>> {
        require_student(ctx, student_id)?;
        let mut entries = ctx.store.entries_for(student_id)?;
        BalanceCalculator::order(&mut entries);
        Ok(entries)
    }

    /// Replays and audits the journal.
    pub fn balance(ctx: &LedgerContext, student_id: Uuid) -> ServiceResult<BalanceReport> {
        let entries = Self::entries(ctx, student_id)?;
        BalanceCalculator::verify(student_id, &entries, ctx.settings.balance_tolerance())
    }

    pub fn current_balance(ctx: &LedgerContext, student_id: Uuid) -> ServiceResult<Money> {
        Ok(Self::balance(ctx, student_id)?.current)
    }

    /// Appends one entry under the student's lease.
    pub fn post(
        ctx: &LedgerContext,
        student_id: Uuid,
        pending: PendingEntry,
    ) -> ServiceResult<LedgerEntry> {
        let _lease = ctx.locks.acquire(student_id)?;
        let student = require_student(ctx, student_id)?;
        if student.status == StudentStatus::Settling {
            return Err(LedgerError::StudentNotActive(student_id));
        }
        let entries = ctx.store.entries_for(student_id)?;
        let (mut cursor, _) =
            JournalCursor::open(student_id, &entries, ctx.settings.balance_tolerance())?;
        let entry = cursor.stage(pending, ctx.clock.today(), ctx.clock.now())?;
        ctx.store.apply(ChangeSet::new().entry(entry.clone()))?;
        tracing::info!(
            student = %student_id,
            seq = entry.seq,
            kind = entry.kind.label(),
            source = entry.source.label(),
            amount = %entry.amount,
            balance = %entry.balance_after,
            "ledger entry posted"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BillingSettings,
        core::clock::FixedClock,
        ledger::{AdjustmentKind, EntrySource, FeeSchedule, HostelBook, Student},
        storage::MemoryStore,
    };
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn context_with_student() -> (LedgerContext, Uuid) {
        let student = Student::new(
            "Bikash",
            FeeSchedule::new(Money::from_major(5000), Money::ZERO, Money::ZERO),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let id = student.id;
        let mut book = HostelBook::new("Ledger Service");
        book.apply(ChangeSet::new().student(student)).unwrap();
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()));
        let ctx = LedgerContext::with_clock(
            Arc::new(MemoryStore::from_book(book)),
            BillingSettings::default(),
            clock,
        );
        (ctx, id)
    }

    fn refund(amount: i64) -> PendingEntry {
        PendingEntry::credit(
            Money::from_major(amount),
            "Mess refund",
            EntrySource::Adjustment {
                kind: AdjustmentKind::Refund,
            },
        )
    }

    #[test]
    fn post_updates_running_balance() {
        let (ctx, id) = context_with_student();
        let debit = PendingEntry::debit(
            Money::from_major(1000),
            "Damage charge",
            EntrySource::Adjustment {
                kind: AdjustmentKind::Deduction,
            },
        );
        LedgerService::post(&ctx, id, debit).unwrap();
        let entry = LedgerService::post(&ctx, id, refund(400)).unwrap();
        assert_eq!(entry.seq, 2);
        assert_eq!(entry.balance_after, Money::from_major(600));
        assert_eq!(
            LedgerService::current_balance(&ctx, id).unwrap(),
            Money::from_major(600)
        );
    }

    #[test]
    fn post_rejects_unknown_student() {
        let (ctx, _) = context_with_student();
        let err = LedgerService::post(&ctx, Uuid::new_v4(), refund(10)).unwrap_err();
        assert!(matches!(err, LedgerError::StudentNotFound(_)));
    }

    #[test]
    fn negative_amount_posts_nothing() {
        let (ctx, id) = context_with_student();
        let err = LedgerService::post(&ctx, id, refund(-5)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert!(LedgerService::entries(&ctx, id).unwrap().is_empty());
    }
}
