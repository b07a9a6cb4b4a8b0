//! Monthly invoice generation.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    config::DuplicatePolicy,
    core::{context::LedgerContext, journal::JournalCursor},
    currency::Money,
    errors::LedgerError,
    ledger::{
        BillingMonth, ChangeSet, EntrySource, Invoice, InvoiceLineItem, InvoiceReference,
        InvoiceStatus, PendingEntry, Student, StudentStatus,
    },
};

use super::{require_student, ServiceResult};

#[derive(Debug, Clone)]
pub struct InvoiceRunRequest {
    pub month: BillingMonth,
    /// Restricts the run to these students. `None` bills every active student.
    pub student_ids: Option<Vec<Uuid>>,
}

impl InvoiceRunRequest {
    pub fn for_month(month: BillingMonth) -> Self {
        Self {
            month,
            student_ids: None,
        }
    }

    pub fn only(mut self, student_ids: Vec<Uuid>) -> Self {
        self.student_ids = Some(student_ids);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyInvoiced(InvoiceReference),
    NotActive(StudentStatus),
    NotCheckedIn(NaiveDate),
    NothingToBill,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyInvoiced(reference) => write!(f, "already invoiced as {reference}"),
            SkipReason::NotActive(status) => write!(f, "student is {status:?}"),
            SkipReason::NotCheckedIn(date) => write!(f, "checks in on {date}"),
            SkipReason::NothingToBill => f.write_str("no charges for the month"),
        }
    }
}

#[derive(Debug)]
pub enum InvoiceOutcome {
    Created(Invoice),
    Skipped(SkipReason),
    Failed(LedgerError),
}

#[derive(Debug)]
pub struct StudentInvoiceResult {
    pub student_id: Uuid,
    pub outcome: InvoiceOutcome,
}

/// Result of one invoicing run: one outcome per student, in request order.
#[derive(Debug)]
pub struct InvoiceBatch {
    pub month: BillingMonth,
    pub results: Vec<StudentInvoiceResult>,
}

impl InvoiceBatch {
    pub fn created(&self) -> usize {
        self.count(|outcome| matches!(outcome, InvoiceOutcome::Created(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, InvoiceOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, InvoiceOutcome::Failed(_)))
    }

    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.results.iter().filter_map(|result| match &result.outcome {
            InvoiceOutcome::Created(invoice) => Some(invoice),
            _ => None,
        })
    }

    pub fn total_billed(&self) -> Money {
        self.invoices().map(|invoice| invoice.total).sum()
    }

    fn count(&self, predicate: impl Fn(&InvoiceOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }
}

pub struct InvoiceService;

impl InvoiceService {
    /// Bills every requested student for `request.month`. Per-student failures are
    /// reported in the batch and never abort it.
    pub fn generate_monthly(
        ctx: &LedgerContext,
        request: &InvoiceRunRequest,
    ) -> ServiceResult<InvoiceBatch> {
        let month = request.month;
        let student_ids = match &request.student_ids {
            Some(ids) => ids.clone(),
            None => ctx
                .store
                .students()?
                .into_iter()
                .filter(|student| student.status == StudentStatus::Active)
                .map(|student| student.id)
                .collect(),
        };

        let workers = ctx.settings.batch_workers.clamp(1, student_ids.len().max(1));
        tracing::info!(%month, students = student_ids.len(), workers, "invoice run started");

        let next = AtomicUsize::new(0);
        let (next, ids) = (&next, &student_ids);
        let mut indexed: Vec<(usize, StudentInvoiceResult)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(&student_id) = ids.get(index) else {
                                break;
                            };
                            let outcome = Self::invoice_student(ctx, student_id, month);
                            done.push((index, StudentInvoiceResult { student_id, outcome }));
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(done) => done,
                    Err(_) => {
                        tracing::error!(%month, "invoice worker panicked");
                        Vec::new()
                    }
                })
                .collect()
        });
        indexed.sort_by_key(|(index, _)| *index);

        let batch = InvoiceBatch {
            month,
            results: indexed.into_iter().map(|(_, result)| result).collect(),
        };
        tracing::info!(
            %month,
            created = batch.created(),
            skipped = batch.skipped(),
            failed = batch.failed(),
            "invoice run finished"
        );
        Ok(batch)
    }

    /// Line items for one student's month, prorated when they checked in mid-month.
    pub fn compute_charges(
        student: &Student,
        month: BillingMonth,
        prorate: bool,
    ) -> Vec<InvoiceLineItem> {
        let billed_days = if prorate && month.contains(student.check_in_date) {
            let occupied = (month.last_day() - student.check_in_date).num_days() + 1;
            occupied.clamp(0, month.days() as i64) as u32
        } else {
            month.days()
        };
        let fees = student.fees;
        [
            ("Room rent", fees.base_monthly_fee),
            ("Laundry", fees.laundry_fee),
            ("Food", fees.food_fee),
        ]
        .into_iter()
        .map(|(label, amount)| InvoiceLineItem::new(label, amount.prorate(billed_days, month.days())))
        .filter(|item| item.amount.is_positive())
        .collect()
    }

    fn invoice_student(ctx: &LedgerContext, student_id: Uuid, month: BillingMonth) -> InvoiceOutcome {
        match Self::try_invoice_student(ctx, student_id, month) {
            Ok(InvoiceOutcome::Skipped(reason)) => {
                tracing::info!(student = %student_id, %month, %reason, "invoice skipped");
                InvoiceOutcome::Skipped(reason)
            }
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(student = %student_id, %month, error = %err, "invoice failed");
                InvoiceOutcome::Failed(err)
            }
        }
    }

    fn try_invoice_student(
        ctx: &LedgerContext,
        student_id: Uuid,
        month: BillingMonth,
    ) -> ServiceResult<InvoiceOutcome> {
        let _lease = ctx.locks.acquire(student_id)?;
        let student = require_student(ctx, student_id)?;
        if student.status != StudentStatus::Active {
            return Ok(InvoiceOutcome::Skipped(SkipReason::NotActive(student.status)));
        }
        if student.check_in_date > month.last_day() {
            return Ok(InvoiceOutcome::Skipped(SkipReason::NotCheckedIn(
                student.check_in_date,
            )));
        }
        if let Some(existing) = ctx.store.invoice_for(student_id, month)? {
            return match ctx.settings.duplicate_policy {
                DuplicatePolicy::Skip => Ok(InvoiceOutcome::Skipped(SkipReason::AlreadyInvoiced(
                    existing.reference,
                ))),
                DuplicatePolicy::Fail => Err(LedgerError::DuplicateInvoice {
                    student_id,
                    month,
                    reference: existing.reference.to_string(),
                }),
            };
        }

        let line_items =
            Self::compute_charges(&student, month, ctx.settings.prorate_partial_months);
        let total: Money = line_items.iter().map(|item| item.amount).sum();
        if !total.is_positive() {
            return Ok(InvoiceOutcome::Skipped(SkipReason::NothingToBill));
        }

        let entries = ctx.store.entries_for(student_id)?;
        let (mut cursor, _) =
            JournalCursor::open(student_id, &entries, ctx.settings.balance_tolerance())?;
        let prepaid = -cursor.balance();

        let sequence = ctx.store.next_invoice_sequence(month)?;
        let reference = InvoiceReference::new(month, sequence)?;
        let entry = cursor.stage(
            PendingEntry::debit(
                total,
                format!("Invoice {reference} for {month}"),
                EntrySource::Invoice { reference },
            ),
            ctx.clock.today(),
            ctx.clock.now(),
        )?;

        let mut invoice = Invoice {
            reference,
            student_id,
            month,
            line_items,
            total,
            amount_paid: Money::ZERO,
            status: InvoiceStatus::Unpaid,
            due_date: month.day_clamped(ctx.settings.due_day),
            issued_on: entry.date,
            entry_id: entry.id,
        };
        if prepaid.is_positive() {
            invoice.allocate(prepaid);
        }

        ctx.store
            .apply(ChangeSet::new().entry(entry).invoice(invoice.clone()))?;
        tracing::info!(
            student = %student_id,
            %reference,
            total = %invoice.total,
            due = %invoice.due_date,
            "invoice created"
        );
        Ok(InvoiceOutcome::Created(invoice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FeeSchedule;

    fn student(check_in: NaiveDate) -> Student {
        Student::new(
            "Asha",
            FeeSchedule::new(
                Money::from_major(5000),
                Money::from_major(300),
                Money::from_major(700),
            ),
            check_in,
        )
    }

    #[test]
    fn full_month_bills_every_fee() {
        let month = BillingMonth::new(2024, 1).unwrap();
        let items = InvoiceService::compute_charges(&student(month.first_day()), month, true);
        let total: Money = items.iter().map(|item| item.amount).sum();
        assert_eq!(items.len(), 3);
        assert_eq!(total, Money::from_major(6000));
    }

    #[test]
    fn mid_month_check_in_is_prorated() {
        let month = BillingMonth::new(2024, 4).unwrap();
        let check_in = NaiveDate::from_ymd_opt(2024, 4, 16).unwrap();
        let items = InvoiceService::compute_charges(&student(check_in), month, true);
        assert_eq!(items[0].amount, Money::from_major(2500));
        assert_eq!(items[1].amount, Money::from_major(150));
        assert_eq!(items[2].amount, Money::from_major(350));

        let unprorated = InvoiceService::compute_charges(&student(check_in), month, false);
        assert_eq!(unprorated[0].amount, Money::from_major(5000));
    }

    #[test]
    fn zero_fees_are_left_off_the_invoice() {
        let month = BillingMonth::new(2024, 1).unwrap();
        let mut s = student(month.first_day());
        s.fees.laundry_fee = Money::ZERO;
        let items = InvoiceService::compute_charges(&s, month, true);
        assert!(items.iter().all(|item| item.label != "Laundry"));
    }
}
