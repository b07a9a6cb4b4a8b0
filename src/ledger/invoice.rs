use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Money;

use super::month::{BillingMonth, InvoiceReference};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceLineItem {
    pub label: String,
    pub amount: Money,
}

impl InvoiceLineItem {
    pub fn new(label: impl Into<String>, amount: Money) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub reference: InvoiceReference,
    pub student_id: Uuid,
    pub month: BillingMonth,
    pub line_items: Vec<InvoiceLineItem>,
    pub total: Money,
    #[serde(default)]
    pub amount_paid: Money,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub issued_on: NaiveDate,
    /// The debit entry this invoice produced.
    pub entry_id: Uuid,
}

impl Invoice {
    pub fn outstanding(&self) -> Money {
        self.total - self.amount_paid
    }

    pub fn is_open(&self) -> bool {
        self.status != InvoiceStatus::Paid
    }

    /// Applies up to `available` towards this invoice and returns what was used.
    pub fn allocate(&mut self, available: Money) -> Money {
        let used = available.min(self.outstanding());
        if !used.is_positive() {
            return Money::ZERO;
        }
        self.amount_paid += used;
        self.status = if self.outstanding().is_zero() {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };
        used
    }
}
