//! Checkout settlement: `active -> settling -> checked_out`.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    core::{context::LedgerContext, journal::JournalCursor},
    currency::Money,
    errors::LedgerError,
    ledger::{
        AdjustmentKind, ChangeSet, EntrySource, LedgerEntry, PendingEntry, Student, StudentStatus,
    },
};

use super::{allocate_credit, require_student, InvoiceAllocation, ServiceResult};

/// A refund (credit) or deduction (debit) made at checkout.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub amount: Money,
    pub reason: String,
}

impl Adjustment {
    pub fn refund(amount: Money, reason: impl Into<String>) -> Self {
        Self {
            kind: AdjustmentKind::Refund,
            amount,
            reason: reason.into(),
        }
    }

    pub fn deduction(amount: Money, reason: impl Into<String>) -> Self {
        Self {
            kind: AdjustmentKind::Deduction,
            amount,
            reason: reason.into(),
        }
    }

    fn to_pending(&self) -> PendingEntry {
        let source = EntrySource::Adjustment { kind: self.kind };
        match self.kind {
            AdjustmentKind::Refund => {
                PendingEntry::credit(self.amount, format!("Refund: {}", self.reason), source)
            }
            AdjustmentKind::Deduction => {
                PendingEntry::debit(self.amount, format!("Deduction: {}", self.reason), source)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub student_id: Uuid,
    pub adjustments: Vec<Adjustment>,
    /// Posts a final settlement entry that brings the balance to zero.
    pub clear_room: bool,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

impl CheckoutRequest {
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            adjustments: Vec::new(),
            clear_room: false,
            date: None,
        }
    }

    pub fn adjust(mut self, adjustment: Adjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }

    pub fn clearing(mut self) -> Self {
        self.clear_room = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSummary {
    pub student_id: Uuid,
    pub opening_balance: Money,
    pub entries: Vec<LedgerEntry>,
    pub final_balance: Money,
    /// Credits from refunds and settlement applied to open invoices.
    pub allocations: Vec<InvoiceAllocation>,
    pub released_room: Option<Uuid>,
    pub checkout_date: NaiveDate,
}

pub struct CheckoutService;

impl CheckoutService {
    pub fn checkout(ctx: &LedgerContext, request: CheckoutRequest) -> ServiceResult<CheckoutSummary> {
        for adjustment in &request.adjustments {
            if !adjustment.amount.is_positive() {
                return Err(LedgerError::InvalidAmount(format!(
                    "adjustment amount must be greater than zero, got {}",
                    adjustment.amount
                )));
            }
        }

        let student_id = request.student_id;
        let _lease = ctx.locks.acquire(student_id)?;
        let student = require_student(ctx, student_id)?;
        if student.status != StudentStatus::Active {
            return Err(LedgerError::StudentNotActive(student_id));
        }

        // Settling lives only under the lease; the store sees the student go
        // straight from active to checked out.
        let mut settling = student;
        settling.status = StudentStatus::Settling;
        tracing::info!(student = %student_id, "checkout started");

        match Self::settle(ctx, settling, &request) {
            Ok(summary) => {
                tracing::info!(
                    student = %student_id,
                    opening = %summary.opening_balance,
                    closing = %summary.final_balance,
                    entries = summary.entries.len(),
                    invoices = summary.allocations.len(),
                    "checkout complete"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!(student = %student_id, error = %err, "checkout failed, student stays active");
                Err(LedgerError::SettlementFailed {
                    student_id,
                    reason: err.to_string(),
                })
            }
        }
    }

    fn settle(
        ctx: &LedgerContext,
        mut student: Student,
        request: &CheckoutRequest,
    ) -> ServiceResult<CheckoutSummary> {
        let entries = ctx.store.entries_for(student.id)?;
        let (mut cursor, report) =
            JournalCursor::open(student.id, &entries, ctx.settings.balance_tolerance())?;
        let date = request.date.unwrap_or_else(|| ctx.clock.today());
        let now = ctx.clock.now();

        let mut staged = Vec::new();
        for adjustment in &request.adjustments {
            staged.push(cursor.stage(adjustment.to_pending(), date, now)?);
        }
        if request.clear_room {
            let outstanding = cursor.balance();
            let settlement = if outstanding.is_positive() {
                Some(PendingEntry::credit(
                    outstanding,
                    "Checkout settlement",
                    EntrySource::Settlement,
                ))
            } else if outstanding.is_negative() {
                Some(PendingEntry::debit(
                    outstanding.abs(),
                    "Checkout settlement",
                    EntrySource::Settlement,
                ))
            } else {
                None
            };
            if let Some(pending) = settlement {
                staged.push(cursor.stage(pending, date, now)?);
            }
            if !cursor.balance().is_zero() {
                return Err(LedgerError::Validation(format!(
                    "settlement left a balance of {}",
                    cursor.balance()
                )));
            }
        }

        let checkout_date = cursor.posting_date(date);
        let released_room = student.room_id.take();
        let room = match released_room {
            Some(room_id) => {
                let mut room = ctx
                    .store
                    .room(room_id)?
                    .ok_or_else(|| LedgerError::RoomNotFound(room_id.to_string()))?;
                room.release(student.id);
                Some(room)
            }
            None => None,
        };
        student.status = StudentStatus::CheckedOut;
        student.checkout_date = Some(checkout_date);

        let credited = staged
            .iter()
            .filter(|entry| entry.is_credit())
            .try_fold(Money::ZERO, |total, entry| total.checked_add(entry.amount))
            .ok_or_else(|| LedgerError::InvalidAmount("checkout credits overflow".into()))?;
        let (invoices, allocations) = allocate_credit(ctx.store.invoices_for(student.id)?, credited);

        let mut changes = ChangeSet::new();
        for entry in &staged {
            changes = changes.entry(entry.clone());
        }
        for invoice in invoices {
            changes = changes.invoice(invoice);
        }
        changes = changes.student(student.clone());
        if let Some(room) = room {
            changes = changes.room(room);
        }
        ctx.store.apply(changes)?;

        Ok(CheckoutSummary {
            student_id: student.id,
            opening_balance: report.current,
            final_balance: cursor.balance(),
            entries: staged,
            allocations,
            released_room,
            checkout_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BillingSettings,
        core::clock::FixedClock,
        ledger::{
            BillingMonth, FeeSchedule, HostelBook, Invoice, InvoiceLineItem, InvoiceReference,
            InvoiceStatus, Room,
        },
        storage::MemoryStore,
    };
    use std::sync::Arc;

    fn context() -> (LedgerContext, Uuid, Uuid) {
        let mut room = Room::new("204", 2);
        let student = Student::new(
            "Gita",
            FeeSchedule::new(Money::from_major(5000), Money::ZERO, Money::ZERO),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .with_room(room.id);
        room.occupy(student.id);
        let ids = (student.id, room.id);
        let mut book = HostelBook::new("Checkout");
        book.apply(ChangeSet::new().student(student).room(room)).unwrap();
        let ctx = LedgerContext::with_clock(
            Arc::new(MemoryStore::from_book(book)),
            BillingSettings::default(),
            Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())),
        );
        (ctx, ids.0, ids.1)
    }

    #[test]
    fn deduction_and_clear_room_settle_to_zero() {
        let (ctx, id, room_id) = context();
        let summary = CheckoutService::checkout(
            &ctx,
            CheckoutRequest::new(id)
                .adjust(Adjustment::deduction(Money::from_major(800), "Broken window"))
                .clearing(),
        )
        .unwrap();
        assert_eq!(summary.final_balance, Money::ZERO);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[1].source, EntrySource::Settlement);
        assert_eq!(summary.released_room, Some(room_id));

        let student = ctx.store.student(id).unwrap().unwrap();
        assert_eq!(student.status, StudentStatus::CheckedOut);
        assert_eq!(student.room_id, None);
        assert!(ctx.store.room(room_id).unwrap().unwrap().is_vacant());
    }

    #[test]
    fn without_clear_room_the_balance_is_left_for_collection() {
        let (ctx, id, _) = context();
        let summary = CheckoutService::checkout(
            &ctx,
            CheckoutRequest::new(id).adjust(Adjustment::deduction(Money::from_major(300), "Keys")),
        )
        .unwrap();
        assert_eq!(summary.final_balance, Money::from_major(300));
    }

    #[test]
    fn second_checkout_is_rejected() {
        let (ctx, id, _) = context();
        CheckoutService::checkout(&ctx, CheckoutRequest::new(id).clearing()).unwrap();
        let err = CheckoutService::checkout(&ctx, CheckoutRequest::new(id)).unwrap_err();
        assert!(matches!(err, LedgerError::StudentNotActive(_)));
    }

    #[test]
    fn clearing_checkout_closes_open_invoices() {
        let (ctx, id, _) = context();
        let january = BillingMonth::new(2024, 1).unwrap();
        let mut invoice = Invoice {
            reference: InvoiceReference::new(january, 1).unwrap(),
            student_id: id,
            month: january,
            line_items: vec![InvoiceLineItem::new("Room rent", Money::from_major(5000))],
            total: Money::from_major(5000),
            amount_paid: Money::ZERO,
            status: InvoiceStatus::Unpaid,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            issued_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            entry_id: Uuid::nil(),
        };
        let (mut cursor, _) = JournalCursor::open(id, &[], Money::ZERO).unwrap();
        let entry = cursor
            .stage(
                PendingEntry::debit(
                    invoice.total,
                    "January",
                    EntrySource::Invoice {
                        reference: invoice.reference,
                    },
                ),
                invoice.issued_on,
                chrono::Utc::now(),
            )
            .unwrap();
        invoice.entry_id = entry.id;
        ctx.store
            .apply(ChangeSet::new().entry(entry).invoice(invoice))
            .unwrap();

        let summary = CheckoutService::checkout(&ctx, CheckoutRequest::new(id).clearing()).unwrap();
        assert_eq!(summary.allocations.len(), 1);
        let invoices = ctx.store.invoices_for(id).unwrap();
        assert_eq!(invoices[0].status, InvoiceStatus::Paid);
        assert!(invoices.iter().all(|invoice| !invoice.is_open()));
    }

    #[test]
    fn missing_room_reverts_student_to_active() {
        let (ctx, id, _) = context();
        let mut student = ctx.store.student(id).unwrap().unwrap();
        student.room_id = Some(Uuid::new_v4());
        ctx.store.apply(ChangeSet::new().student(student)).unwrap();

        let err = CheckoutService::checkout(
            &ctx,
            CheckoutRequest::new(id).adjust(Adjustment::refund(Money::from_major(100), "Deposit")),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::SettlementFailed { .. }));
        let student = ctx.store.student(id).unwrap().unwrap();
        assert_eq!(student.status, StudentStatus::Active);
        assert!(ctx.store.entries_for(id).unwrap().is_empty());
    }
}
