use std::time::Duration;

use uuid::Uuid;

use crate::ledger::{
    BillingMonth, ChangeSet, Discount, HostelBook, Invoice, LedgerEntry, Payment, Room, Student,
};

use super::{LedgerStore, Result, SharedBook, DEFAULT_LOCK_TIMEOUT};

/// Volatile store used by tests and short-lived sessions.
pub struct MemoryStore {
    book: SharedBook,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_book(HostelBook::new(name))
    }

    pub fn from_book(book: HostelBook) -> Self {
        Self::with_timeout(book, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(mut book: HostelBook, timeout: Duration) -> Self {
        book.recover_interrupted_checkouts();
        Self {
            book: SharedBook::new(book, timeout),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("Hostel")
    }
}

impl LedgerStore for MemoryStore {
    fn student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.book.read()?.student(id).cloned())
    }

    fn students(&self) -> Result<Vec<Student>> {
        Ok(self.book.read()?.students.clone())
    }

    fn room(&self, id: Uuid) -> Result<Option<Room>> {
        Ok(self.book.read()?.room(id).cloned())
    }

    fn rooms(&self) -> Result<Vec<Room>> {
        Ok(self.book.read()?.rooms.clone())
    }

    fn entries_for(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>> {
        Ok(self.book.read()?.entries_for(student_id))
    }

    fn invoice_for(&self, student_id: Uuid, month: BillingMonth) -> Result<Option<Invoice>> {
        Ok(self.book.read()?.invoice_for(student_id, month).cloned())
    }

    fn invoices_for(&self, student_id: Uuid) -> Result<Vec<Invoice>> {
        Ok(self.book.read()?.invoices_for(student_id))
    }

    fn discount(&self, id: Uuid) -> Result<Option<Discount>> {
        Ok(self.book.read()?.discount(id).cloned())
    }

    fn payments_for(&self, student_id: Uuid) -> Result<Vec<Payment>> {
        Ok(self.book.read()?.payments_for(student_id))
    }

    fn next_invoice_sequence(&self, month: BillingMonth) -> Result<u32> {
        self.book.write()?.next_invoice_sequence(month)
    }

    fn apply(&self, changes: ChangeSet) -> Result<()> {
        self.book.write()?.apply(changes)
    }

    fn snapshot(&self) -> Result<HostelBook> {
        Ok(self.book.read()?.clone())
    }
}
