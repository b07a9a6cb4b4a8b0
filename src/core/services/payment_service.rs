//! Records payments as credit entries and settles open invoices oldest first.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    core::{context::LedgerContext, journal::JournalCursor},
    currency::Money,
    errors::LedgerError,
    ledger::{ChangeSet, EntrySource, LedgerEntry, Payment, PaymentMethod, PendingEntry, StudentStatus},
};

use super::{allocate_credit, require_student, InvoiceAllocation, ServiceResult};

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub student_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl PaymentRequest {
    pub fn new(student_id: Uuid, amount: Money, method: PaymentMethod) -> Self {
        Self {
            student_id,
            amount,
            method,
            date: None,
            note: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub entry: LedgerEntry,
    pub allocations: Vec<InvoiceAllocation>,
}

impl PaymentReceipt {
    pub fn balance(&self) -> Money {
        self.entry.balance_after
    }

    /// Part of the payment not absorbed by open invoices.
    pub fn unallocated(&self) -> Money {
        self.payment.amount - self.allocations.iter().map(|a| a.amount).sum::<Money>()
    }
}

pub struct PaymentService;

impl PaymentService {
    pub fn record(ctx: &LedgerContext, request: PaymentRequest) -> ServiceResult<PaymentReceipt> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "payment amount must be greater than zero, got {}",
                request.amount
            )));
        }
        let student_id = request.student_id;
        let _lease = ctx.locks.acquire(student_id)?;
        let student = require_student(ctx, student_id)?;
        if student.status == StudentStatus::Settling {
            return Err(LedgerError::StudentNotActive(student_id));
        }

        let entries = ctx.store.entries_for(student_id)?;
        let (mut cursor, _) =
            JournalCursor::open(student_id, &entries, ctx.settings.balance_tolerance())?;
        let date = request.date.unwrap_or_else(|| ctx.clock.today());
        let payment_id = Uuid::new_v4();
        let description = match &request.note {
            Some(note) => format!("Payment ({}) {}", request.method, note),
            None => format!("Payment ({})", request.method),
        };
        let entry = cursor.stage(
            PendingEntry::credit(request.amount, description, EntrySource::Payment { payment_id }),
            date,
            ctx.clock.now(),
        )?;
        let payment = Payment {
            id: payment_id,
            student_id,
            amount: request.amount,
            method: request.method,
            date,
            note: request.note,
            entry_id: entry.id,
        };

        let (invoices, allocations) =
            allocate_credit(ctx.store.invoices_for(student_id)?, request.amount);
        let mut changes = ChangeSet::new().entry(entry.clone()).payment(payment.clone());
        for invoice in invoices {
            changes = changes.invoice(invoice);
        }
        ctx.store.apply(changes)?;

        tracing::info!(
            student = %student_id,
            payment = %payment_id,
            amount = %payment.amount,
            method = %payment.method,
            invoices = allocations.len(),
            balance = %entry.balance_after,
            "payment recorded"
        );
        Ok(PaymentReceipt {
            payment,
            entry,
            allocations,
        })
    }
}
