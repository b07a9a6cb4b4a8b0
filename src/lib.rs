#![doc(test(attr(deny(warnings))))]

//! Hostel Ledger keeps an append-only billing journal per student: monthly
//! invoices, payments, discounts and checkout settlement, with running balances
//! that are audited on every write.

pub mod cli;
pub mod config;
pub mod core;
pub mod currency;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "hostel ledger tracing initialized");
    });
}
