//! Hostel billing domain models and persistence-friendly types.

pub mod book;
pub mod discount;
pub mod entry;
pub mod invoice;
pub mod month;
pub mod payment;
pub mod room;
pub mod student;

pub use book::{ChangeSet, HostelBook, CURRENT_SCHEMA_VERSION};
pub use discount::{Discount, DiscountValue};
pub use entry::{AdjustmentKind, EntryKind, EntrySource, LedgerEntry, PendingEntry};
pub use invoice::{Invoice, InvoiceLineItem, InvoiceStatus};
pub use month::{BillingMonth, InvoiceReference};
pub use payment::{Payment, PaymentMethod};
pub use room::Room;
pub use student::{FeeSchedule, Student, StudentStatus};
