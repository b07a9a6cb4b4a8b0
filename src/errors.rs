use thiserror::Error;
use uuid::Uuid;

use crate::{currency::Money, ledger::BillingMonth};

/// Error type that captures ledger, billing, and persistence failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "Inconsistent ledger for student {student_id}: entry #{seq} records balance {recorded} but running total is {expected}"
    )]
    InconsistentLedger {
        student_id: Uuid,
        seq: u64,
        expected: Money,
        recorded: Money,
    },
    #[error("Broken ledger sequence for student {student_id}: expected entry #{expected}, found #{found}")]
    BrokenSequence {
        student_id: Uuid,
        expected: u64,
        found: u64,
    },
    #[error("Student {student_id} already has invoice {reference} for {month}")]
    DuplicateInvoice {
        student_id: Uuid,
        month: BillingMonth,
        reference: String,
    },
    #[error("Discount {discount_id} expired on {valid_to}")]
    ExpiredDiscount {
        discount_id: Uuid,
        valid_to: chrono::NaiveDate,
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),
    #[error("Checkout of student {student_id} failed: {reason}")]
    SettlementFailed { student_id: Uuid, reason: String },
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("Discount not found: {0}")]
    DiscountNotFound(Uuid),
    #[error("Student {0} is not active")]
    StudentNotActive(Uuid),
    #[error("Room {0} is full")]
    RoomFull(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invoice sequence exhausted for {0}")]
    SequenceExhausted(BillingMonth),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LedgerError {
    /// Audit failures block further postings for the affected student.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::InconsistentLedger { .. } | LedgerError::BrokenSequence { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
