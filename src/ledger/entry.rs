use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Money;

use super::month::InvoiceReference;

/// Direction of a posting against a student's account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Amount owed by the student.
    Debit,
    /// Amount paid or waived.
    Credit,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Debit => "debit",
            EntryKind::Credit => "credit",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Refund,
    Deduction,
}

/// Records what produced a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntrySource {
    Invoice { reference: InvoiceReference },
    Payment { payment_id: Uuid },
    Discount { discount_id: Uuid },
    Adjustment { kind: AdjustmentKind },
    Settlement,
}

impl EntrySource {
    pub fn label(&self) -> &'static str {
        match self {
            EntrySource::Invoice { .. } => "invoice",
            EntrySource::Payment { .. } => "payment",
            EntrySource::Discount { .. } => "discount",
            EntrySource::Adjustment { .. } => "adjustment",
            EntrySource::Settlement => "settlement",
        }
    }
}

/// One immutable debit or credit posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub student_id: Uuid,
    pub seq: u64,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
    pub source: EntrySource,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Positive for debits, negative for credits.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            EntryKind::Debit => self.amount,
            EntryKind::Credit => -self.amount,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.kind == EntryKind::Debit
    }

    pub fn is_credit(&self) -> bool {
        self.kind == EntryKind::Credit
    }
}

/// An entry that has not been sequenced or balanced yet.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
    pub source: EntrySource,
}

impl PendingEntry {
    pub fn debit(amount: Money, description: impl Into<String>, source: EntrySource) -> Self {
        Self {
            kind: EntryKind::Debit,
            amount,
            description: description.into(),
            source,
        }
    }

    pub fn credit(amount: Money, description: impl Into<String>, source: EntrySource) -> Self {
        Self {
            kind: EntryKind::Credit,
            amount,
            description: description.into(),
            source,
        }
    }

    pub fn signed_amount(&self) -> Money {
        match self.kind {
            EntryKind::Debit => self.amount,
            EntryKind::Credit => -self.amount,
        }
    }
}
