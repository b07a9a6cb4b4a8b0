pub mod checkout_service;
pub mod discount_service;
pub mod invoice_service;
pub mod ledger_service;
pub mod payment_service;
pub mod roster_service;
pub mod summary_service;

pub use checkout_service::{Adjustment, CheckoutRequest, CheckoutService, CheckoutSummary};
pub use discount_service::{DiscountApplication, DiscountRequest, DiscountService};
pub use invoice_service::{
    InvoiceBatch, InvoiceOutcome, InvoiceRunRequest, InvoiceService, SkipReason,
    StudentInvoiceResult,
};
pub use ledger_service::LedgerService;
pub use payment_service::{PaymentReceipt, PaymentRequest, PaymentService};
pub use roster_service::{EnrollRequest, RosterService};
pub use summary_service::{
    AuditIssue, AuditReport, OutstandingBalance, Statement, StatementWindow, SummaryService,
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    core::context::LedgerContext,
    currency::Money,
    errors::LedgerError,
    ledger::{Invoice, InvoiceReference, Student},
};

pub type ServiceResult<T> = Result<T, LedgerError>;

/// Portion of a credit applied to one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceAllocation {
    pub reference: InvoiceReference,
    pub amount: Money,
}

pub(crate) fn require_student(ctx: &LedgerContext, id: Uuid) -> ServiceResult<Student> {
    ctx.store
        .student(id)?
        .ok_or_else(|| LedgerError::StudentNotFound(id.to_string()))
}

/// Spreads `amount` over the oldest open invoices first. Returns the invoices that changed.
pub(crate) fn allocate_credit(
    mut invoices: Vec<Invoice>,
    amount: Money,
) -> (Vec<Invoice>, Vec<InvoiceAllocation>) {
    invoices.retain(Invoice::is_open);
    invoices.sort_by(|a, b| {
        a.month
            .cmp(&b.month)
            .then(a.issued_on.cmp(&b.issued_on))
            .then(a.reference.cmp(&b.reference))
    });

    let mut remaining = amount;
    let mut touched = Vec::new();
    let mut allocations = Vec::new();
    for mut invoice in invoices {
        if !remaining.is_positive() {
            break;
        }
        let used = invoice.allocate(remaining);
        if used.is_positive() {
            remaining -= used;
            allocations.push(InvoiceAllocation {
                reference: invoice.reference,
                amount: used,
            });
            touched.push(invoice);
        }
    }
    (touched, allocations)
}
