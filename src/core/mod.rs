//! Billing core: balance auditing, per-student locking and the services built on them.

pub mod balance;
pub mod clock;
pub mod context;
pub mod journal;
pub mod locks;
pub mod services;
pub mod utils;

pub use balance::{BalanceCalculator, BalanceReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::LedgerContext;
pub use journal::JournalCursor;
pub use locks::{StudentLease, StudentLocks};
