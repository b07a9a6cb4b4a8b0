use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    core::{balance::BalanceCalculator, context::LedgerContext},
    currency::Money,
    errors::LedgerError,
    ledger::{Invoice, LedgerEntry, Payment, Student, StudentStatus},
};

use super::{require_student, ServiceResult};

/// Inclusive date range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl StatementWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, LedgerError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(LedgerError::Validation(format!(
                    "statement window {from} to {to} is empty"
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    fn is_before(&self, date: NaiveDate) -> bool {
        self.from.is_some_and(|from| date < from)
    }
}

/// Read-only snapshot of a student's account, ready for export.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub student: Student,
    pub window: StatementWindow,
    pub opening_balance: Money,
    pub entries: Vec<LedgerEntry>,
    pub closing_balance: Money,
    pub total_debits: Money,
    pub total_credits: Money,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutstandingBalance {
    pub student_id: Uuid,
    pub name: String,
    pub status: StudentStatus,
    pub room: Option<String>,
    pub balance: Money,
    pub open_invoices: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditIssue {
    pub student_id: Uuid,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub checked: usize,
    pub entries: usize,
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct SummaryService;

impl SummaryService {
    pub fn statement(
        ctx: &LedgerContext,
        student_id: Uuid,
        window: StatementWindow,
    ) -> ServiceResult<Statement> {
        let student = require_student(ctx, student_id)?;
        let mut entries = ctx.store.entries_for(student_id)?;
        BalanceCalculator::order(&mut entries);
        BalanceCalculator::verify(student_id, &entries, ctx.settings.balance_tolerance())?;

        let opening_balance = entries
            .iter()
            .filter(|entry| window.is_before(entry.date))
            .last()
            .map(|entry| entry.balance_after)
            .unwrap_or(Money::ZERO);
        let in_window: Vec<LedgerEntry> = entries
            .into_iter()
            .filter(|entry| window.contains(entry.date))
            .collect();
        let closing_balance = in_window
            .last()
            .map(|entry| entry.balance_after)
            .unwrap_or(opening_balance);
        let total_debits = in_window
            .iter()
            .filter(|entry| entry.is_debit())
            .map(|entry| entry.amount)
            .sum();
        let total_credits = in_window
            .iter()
            .filter(|entry| entry.is_credit())
            .map(|entry| entry.amount)
            .sum();
        let invoices = ctx
            .store
            .invoices_for(student_id)?
            .into_iter()
            .filter(|invoice| window.contains(invoice.issued_on))
            .collect();
        let payments = ctx
            .store
            .payments_for(student_id)?
            .into_iter()
            .filter(|payment| window.contains(payment.date))
            .collect();

        Ok(Statement {
            student,
            window,
            opening_balance,
            entries: in_window,
            closing_balance,
            total_debits,
            total_credits,
            invoices,
            payments,
        })
    }

    /// Every student's current balance, largest amount owed first.
    ///
    /// Fails with the first inconsistent journal; run [`SummaryService::audit_all`]
    /// to list them all.
    pub fn outstanding(ctx: &LedgerContext) -> ServiceResult<Vec<OutstandingBalance>> {
        let tolerance = ctx.settings.balance_tolerance();
        let rooms = ctx.store.rooms()?;
        let mut rows = Vec::new();
        for student in ctx.store.students()? {
            let mut entries = ctx.store.entries_for(student.id)?;
            BalanceCalculator::order(&mut entries);
            let balance = BalanceCalculator::verify(student.id, &entries, tolerance)?.current;
            let open_invoices = ctx
                .store
                .invoices_for(student.id)?
                .iter()
                .filter(|invoice| invoice.is_open())
                .count();
            let room = student.room_id.and_then(|room_id| {
                rooms
                    .iter()
                    .find(|room| room.id == room_id)
                    .map(|room| room.number.clone())
            });
            rows.push(OutstandingBalance {
                student_id: student.id,
                name: student.name,
                status: student.status,
                room,
                balance,
                open_invoices,
            });
        }
        rows.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.name.cmp(&b.name)));
        Ok(rows)
    }

    /// Verifies every student's journal and collects the failures.
    pub fn audit_all(ctx: &LedgerContext) -> ServiceResult<AuditReport> {
        let tolerance = ctx.settings.balance_tolerance();
        let mut report = AuditReport::default();
        for student in ctx.store.students()? {
            let mut entries = ctx.store.entries_for(student.id)?;
            BalanceCalculator::order(&mut entries);
            report.checked += 1;
            report.entries += entries.len();
            if let Err(err) = BalanceCalculator::verify(student.id, &entries, tolerance) {
                report.issues.push(AuditIssue {
                    student_id: student.id,
                    name: student.name,
                    message: err.to_string(),
                });
            }
        }
        if report.is_clean() {
            tracing::info!(students = report.checked, entries = report.entries, "audit clean");
        } else {
            tracing::error!(issues = report.issues.len(), "audit found inconsistent ledgers");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = StatementWindow::new(Some(day(1)), Some(day(31))).unwrap();
        assert!(window.contains(day(1)));
        assert!(window.contains(day(31)));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(StatementWindow::default().contains(day(15)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(StatementWindow::new(Some(day(10)), Some(day(2))).is_err());
    }
}
