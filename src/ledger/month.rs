use std::{fmt, str::FromStr};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

const REFERENCE_PREFIX: &str = "BL";
pub const MAX_SEQUENCE: u32 = 999_999;

/// A calendar month that invoices are issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(LedgerError::Validation(format!(
                "{year}-{month} is not a valid billing month"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    /// Returns the `day`-th of the month, clamped to the month's length.
    pub fn day_clamped(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, day).unwrap_or_else(|| self.first_day())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> BillingMonth {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::Validation(format!("`{raw}` is not a YYYY-MM month"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        BillingMonth::new(year, month)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(value: BillingMonth) -> Self {
        value.to_string()
    }
}

/// Invoice reference of the form `BL-YYYY-MM-NNNNNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceReference {
    month: BillingMonth,
    sequence: u32,
}

impl InvoiceReference {
    pub fn new(month: BillingMonth, sequence: u32) -> Result<Self, LedgerError> {
        if sequence == 0 {
            return Err(LedgerError::Validation(
                "invoice sequence starts at 1".into(),
            ));
        }
        if sequence > MAX_SEQUENCE {
            return Err(LedgerError::SequenceExhausted(month));
        }
        Ok(Self { month, sequence })
    }

    pub fn month(&self) -> BillingMonth {
        self.month
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for InvoiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:04}-{:02}-{:06}",
            REFERENCE_PREFIX,
            self.month.year(),
            self.month.month(),
            self.sequence
        )
    }
}

impl FromStr for InvoiceReference {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::Validation(format!("`{raw}` is not an invoice reference"));
        let parts: Vec<&str> = raw.trim().split('-').collect();
        let [prefix, year, month, sequence] = parts.as_slice() else {
            return Err(invalid());
        };
        if *prefix != REFERENCE_PREFIX || month.len() != 2 || sequence.len() != 6 {
            return Err(invalid());
        }
        let month: BillingMonth = format!("{year}-{month}").parse().map_err(|_| invalid())?;
        let sequence = sequence.parse().map_err(|_| invalid())?;
        InvoiceReference::new(month, sequence)
    }
}

impl TryFrom<String> for InvoiceReference {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceReference> for String {
    fn from(value: InvoiceReference) -> Self {
        value.to_string()
    }
}
