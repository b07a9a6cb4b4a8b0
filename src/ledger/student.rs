use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    Active,
    /// Checkout is in progress; no other postings are accepted.
    Settling,
    CheckedOut,
}

/// Recurring monthly charges billed to a student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeeSchedule {
    pub base_monthly_fee: Money,
    #[serde(default)]
    pub laundry_fee: Money,
    #[serde(default)]
    pub food_fee: Money,
}

impl FeeSchedule {
    pub fn new(base_monthly_fee: Money, laundry_fee: Money, food_fee: Money) -> Self {
        Self {
            base_monthly_fee,
            laundry_fee,
            food_fee,
        }
    }

    pub fn total(&self) -> Money {
        self.base_monthly_fee + self.laundry_fee + self.food_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub room_id: Option<Uuid>,
    pub fees: FeeSchedule,
    #[serde(default)]
    pub status: StudentStatus,
    pub check_in_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_date: Option<NaiveDate>,
}

impl Student {
    pub fn new(name: impl Into<String>, fees: FeeSchedule, check_in_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            room_id: None,
            fees,
            status: StudentStatus::Active,
            check_in_date,
            checkout_date: None,
        }
    }

    pub fn with_room(mut self, room_id: Uuid) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}
