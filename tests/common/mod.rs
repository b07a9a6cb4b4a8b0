#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use hostel_ledger::{
    config::BillingSettings,
    core::{
        context::LedgerContext,
        services::{EnrollRequest, RosterService},
        FixedClock,
    },
    currency::Money,
    ledger::{FeeSchedule, HostelBook, Student},
    storage::{JsonStore, LedgerStore, MemoryStore},
};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn major(amount: i64) -> Money {
    Money::from_major(amount)
}

/// A billing context over an in-memory book with a clock pinned to `today`.
pub struct Harness {
    pub ctx: LedgerContext,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(today: NaiveDate) -> Self {
        Self::with_settings(today, BillingSettings::default())
    }

    pub fn with_settings(today: NaiveDate, settings: BillingSettings) -> Self {
        Self::over_store(Arc::new(MemoryStore::new("Test Hostel")), today, settings)
    }

    pub fn with_book(book: HostelBook, today: NaiveDate) -> Self {
        Self::over_store(
            Arc::new(MemoryStore::from_book(book)),
            today,
            BillingSettings::default(),
        )
    }

    pub fn over_store(
        store: Arc<dyn LedgerStore>,
        today: NaiveDate,
        settings: BillingSettings,
    ) -> Self {
        let clock = Arc::new(FixedClock::on(today));
        let ctx = LedgerContext::with_clock(store, settings, clock.clone());
        Self { ctx, clock }
    }

    /// Enrolls a student on the 5000/300/700 fee schedule.
    pub fn standard_student(&self, name: &str, check_in: NaiveDate) -> Student {
        self.enroll(name, FeeSchedule::new(major(5000), major(300), major(700)), check_in)
    }

    pub fn enroll(&self, name: &str, fees: FeeSchedule, check_in: NaiveDate) -> Student {
        RosterService::enroll(&self.ctx, EnrollRequest::new(name, fees).checked_in(check_in))
            .expect("enroll student")
    }
}

/// A fresh directory that outlives the test body.
pub fn temp_root() -> std::path::PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn json_store(name: &str) -> (Arc<JsonStore>, std::path::PathBuf) {
    let root = temp_root();
    let store = JsonStore::open(&root, name).expect("open json store");
    (Arc::new(store), root)
}
