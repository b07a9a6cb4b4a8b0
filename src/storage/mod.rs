pub mod json_backend;
pub mod memory;

use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::{
    errors::LedgerError,
    ledger::{
        BillingMonth, ChangeSet, Discount, HostelBook, Invoice, LedgerEntry, Payment, Room,
        Student,
    },
};

pub type Result<T> = std::result::Result<T, LedgerError>;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Abstraction over persistence backends holding a hostel's roster and journal.
///
/// Every `apply` is atomic: readers observe either none or all of a change set.
pub trait LedgerStore: Send + Sync {
    fn student(&self, id: Uuid) -> Result<Option<Student>>;
    fn students(&self) -> Result<Vec<Student>>;
    fn room(&self, id: Uuid) -> Result<Option<Room>>;
    fn rooms(&self) -> Result<Vec<Room>>;
    /// Entries for `student_id` ordered by date, then insertion order.
    fn entries_for(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>>;
    fn invoice_for(&self, student_id: Uuid, month: BillingMonth) -> Result<Option<Invoice>>;
    fn invoices_for(&self, student_id: Uuid) -> Result<Vec<Invoice>>;
    fn discount(&self, id: Uuid) -> Result<Option<Discount>>;
    fn payments_for(&self, student_id: Uuid) -> Result<Vec<Payment>>;
    /// Increments and returns the month's invoice counter.
    fn next_invoice_sequence(&self, month: BillingMonth) -> Result<u32>;
    fn apply(&self, changes: ChangeSet) -> Result<()>;
    /// Read-only copy of the whole book, for export and reporting.
    fn snapshot(&self) -> Result<HostelBook>;
}

/// A book behind a lock whose acquisition is bounded by a timeout.
pub(crate) struct SharedBook {
    inner: RwLock<HostelBook>,
    timeout: Duration,
}

impl SharedBook {
    pub(crate) fn new(book: HostelBook, timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(book),
            timeout,
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, HostelBook>> {
        self.inner
            .try_read_for(self.timeout)
            .ok_or_else(|| LedgerError::Timeout("store read lock".into()))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, HostelBook>> {
        self.inner
            .try_write_for(self.timeout)
            .ok_or_else(|| LedgerError::Timeout("store write lock".into()))
    }
}

pub use json_backend::{BackupInfo, JsonStore};
pub use memory::MemoryStore;
