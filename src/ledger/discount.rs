use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{currency::Money, errors::LedgerError};

const FULL_PERCENT_BASIS_POINTS: i64 = 10_000;

/// How much a discount is worth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountValue {
    Fixed {
        amount: Money,
    },
    /// Percentage in basis points (`1_000` = 10%).
    Percentage {
        basis_points: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_amount: Option<Money>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_amount: Option<Money>,
    },
}

impl DiscountValue {
    pub fn fixed(amount: Money) -> Self {
        DiscountValue::Fixed { amount }
    }

    /// Whole-number percentage; values above 100 still fail [`DiscountValue::validate`].
    pub fn percent(percent: u8) -> Self {
        DiscountValue::Percentage {
            basis_points: i64::from(percent) * 100,
            max_amount: None,
            base_amount: None,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        match self {
            DiscountValue::Fixed { amount } => {
                if !amount.is_positive() {
                    return Err(LedgerError::InvalidAmount(format!(
                        "discount amount must be greater than zero, got {amount}"
                    )));
                }
            }
            DiscountValue::Percentage {
                basis_points,
                max_amount,
                base_amount,
            } => {
                if !(0..=FULL_PERCENT_BASIS_POINTS).contains(basis_points) {
                    return Err(LedgerError::InvalidDiscount(format!(
                        "percentage must be within 0..=100, got {}",
                        *basis_points as f64 / 100.0
                    )));
                }
                if max_amount.is_some_and(Money::is_negative) {
                    return Err(LedgerError::InvalidDiscount(
                        "max amount cannot be negative".into(),
                    ));
                }
                if base_amount.is_some_and(Money::is_negative) {
                    return Err(LedgerError::InvalidDiscount(
                        "base amount cannot be negative".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Credit produced by this discount; `default_base` is used when no base amount is set.
    pub fn credit_amount(&self, default_base: Money) -> Money {
        match self {
            DiscountValue::Fixed { amount } => *amount,
            DiscountValue::Percentage {
                basis_points,
                max_amount,
                base_amount,
            } => {
                let base = base_amount.unwrap_or(default_base);
                let computed = base.apply_basis_points(*basis_points);
                match max_amount {
                    Some(cap) => computed.min(*cap),
                    None => computed,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Discount {
    pub id: Uuid,
    pub student_id: Uuid,
    pub value: DiscountValue,
    pub reason: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub applied_by: String,
    /// Set once the discount has been posted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_entry: Option<Uuid>,
}

impl Discount {
    pub fn is_applied(&self) -> bool {
        self.applied_entry.is_some()
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        date > self.valid_to
    }

    pub fn is_pending_on(&self, date: NaiveDate) -> bool {
        date < self.valid_from
    }
}
