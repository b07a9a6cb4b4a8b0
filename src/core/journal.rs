//! Stages sequenced, balanced entries on top of a student's audited journal.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    currency::Money,
    errors::LedgerError,
    ledger::{LedgerEntry, PendingEntry},
};

use super::balance::{BalanceCalculator, BalanceReport};

#[derive(Debug, Clone)]
pub struct JournalCursor {
    student_id: Uuid,
    seq: u64,
    balance: Money,
    last_date: Option<NaiveDate>,
}

impl JournalCursor {
    /// Audits `entries` and positions the cursor after the last one.
    pub fn open(
        student_id: Uuid,
        entries: &[LedgerEntry],
        tolerance: Money,
    ) -> Result<(Self, BalanceReport), LedgerError> {
        let report = BalanceCalculator::verify(student_id, entries, tolerance)?;
        let cursor = Self {
            student_id,
            seq: entries.len() as u64,
            balance: report.current,
            last_date: entries.iter().map(|entry| entry.date).max(),
        };
        Ok((cursor, report))
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Entries never land before the journal's latest date.
    pub fn posting_date(&self, requested: NaiveDate) -> NaiveDate {
        match self.last_date {
            Some(last) if last > requested => last,
            _ => requested,
        }
    }

    pub fn stage(
        &mut self,
        pending: PendingEntry,
        date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        if !pending.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} amount must be greater than zero, got {}",
                pending.kind.label(),
                pending.amount
            )));
        }
        let date = self.posting_date(date);
        let balance_after = self
            .balance
            .checked_add(pending.signed_amount())
            .ok_or_else(|| {
                LedgerError::InvalidAmount(format!(
                    "{} of {} would overflow the balance of {}",
                    pending.kind.label(),
                    pending.amount,
                    self.balance
                ))
            })?;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            student_id: self.student_id,
            seq: self.seq + 1,
            date,
            kind: pending.kind,
            amount: pending.amount,
            description: pending.description,
            source: pending.source,
            balance_after,
            created_at,
        };
        self.seq = entry.seq;
        self.balance = balance_after;
        self.last_date = Some(date);
        Ok(entry)
    }
}
