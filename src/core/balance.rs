//! Recomputes running balances and audits recorded ones.

use uuid::Uuid;

use crate::{currency::Money, errors::LedgerError, ledger::LedgerEntry};

/// Outcome of replaying a student's journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    /// Running balance after each entry, in journal order.
    pub running: Vec<Money>,
    pub current: Money,
    pub total_debits: Money,
    pub total_credits: Money,
}

impl BalanceReport {
    pub fn entry_count(&self) -> usize {
        self.running.len()
    }

    pub fn owes(&self) -> bool {
        self.current.is_positive()
    }
}

pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Sorts entries by date, then by insertion order.
    pub fn order(entries: &mut [LedgerEntry]) {
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)));
    }

    /// Replays `entries` as given, ignoring the balances they carry.
    pub fn replay(entries: &[LedgerEntry]) -> Result<BalanceReport, LedgerError> {
        let mut running = Vec::with_capacity(entries.len());
        let mut current = Money::ZERO;
        let mut total_debits = Money::ZERO;
        let mut total_credits = Money::ZERO;
        for entry in entries {
            let overflow = || {
                LedgerError::InvalidAmount(format!(
                    "entry #{} overflows the running totals",
                    entry.seq
                ))
            };
            if entry.is_debit() {
                total_debits = total_debits.checked_add(entry.amount).ok_or_else(overflow)?;
            } else {
                total_credits = total_credits.checked_add(entry.amount).ok_or_else(overflow)?;
            }
            current = current
                .checked_add(entry.signed_amount())
                .ok_or_else(overflow)?;
            running.push(current);
        }
        Ok(BalanceReport {
            running,
            current,
            total_debits,
            total_credits,
        })
    }

    /// Replays `entries` and checks every recorded `balance_after` and sequence number.
    pub fn verify(
        student_id: Uuid,
        entries: &[LedgerEntry],
        tolerance: Money,
    ) -> Result<BalanceReport, LedgerError> {
        let report = Self::replay(entries)?;
        for (index, (entry, expected)) in entries.iter().zip(&report.running).enumerate() {
            let expected_seq = index as u64 + 1;
            if entry.student_id != student_id || entry.seq != expected_seq {
                return Err(LedgerError::BrokenSequence {
                    student_id,
                    expected: expected_seq,
                    found: entry.seq,
                });
            }
            if entry.balance_after.distance(*expected) > tolerance {
                tracing::error!(
                    student = %student_id,
                    seq = entry.seq,
                    recorded = %entry.balance_after,
                    expected = %expected,
                    "ledger audit failed"
                );
                return Err(LedgerError::InconsistentLedger {
                    student_id,
                    seq: entry.seq,
                    expected: *expected,
                    recorded: entry.balance_after,
                });
            }
        }
        Ok(report)
    }
}
