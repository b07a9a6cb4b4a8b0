use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{currency::Money, errors::LedgerError};

use super::{
    discount::Discount,
    entry::LedgerEntry,
    invoice::Invoice,
    month::{BillingMonth, MAX_SEQUENCE},
    payment::Payment,
    room::Room,
    student::{Student, StudentStatus},
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Everything a single write commits. Applied all-or-nothing, in field order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub entries: Vec<LedgerEntry>,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub discounts: Vec<Discount>,
    pub students: Vec<Student>,
    pub rooms: Vec<Room>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn invoice(mut self, invoice: Invoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    pub fn payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn discount(mut self, discount: Discount) -> Self {
        self.discounts.push(discount);
        self
    }

    pub fn student(mut self, student: Student) -> Self {
        self.students.push(student);
        self
    }

    pub fn room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.invoices.is_empty()
            && self.payments.is_empty()
            && self.discounts.is_empty()
            && self.students.is_empty()
            && self.rooms.is_empty()
    }
}

/// Persisted snapshot of a hostel's roster and billing journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostelBook {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
    #[serde(default)]
    pub invoice_counters: BTreeMap<BillingMonth, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "HostelBook::schema_version_default")]
    pub schema_version: u8,
}

impl HostelBook {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rooms: Vec::new(),
            students: Vec::new(),
            entries: Vec::new(),
            invoices: Vec::new(),
            payments: Vec::new(),
            discounts: Vec::new(),
            invoice_counters: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn room(&self, id: Uuid) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    pub fn discount(&self, id: Uuid) -> Option<&Discount> {
        self.discounts.iter().find(|discount| discount.id == id)
    }

    /// Entries for one student in posting order.
    pub fn entries_for(&self, student_id: Uuid) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.student_id == student_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)));
        entries
    }

    pub fn invoice_for(&self, student_id: Uuid, month: BillingMonth) -> Option<&Invoice> {
        self.invoices
            .iter()
            .find(|invoice| invoice.student_id == student_id && invoice.month == month)
    }

    pub fn invoices_for(&self, student_id: Uuid) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|invoice| invoice.student_id == student_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.month.cmp(&b.month).then(a.reference.cmp(&b.reference)));
        invoices
    }

    pub fn payments_for(&self, student_id: Uuid) -> Vec<Payment> {
        self.payments
            .iter()
            .filter(|payment| payment.student_id == student_id)
            .cloned()
            .collect()
    }

    pub fn discounts_for(&self, student_id: Uuid) -> Vec<Discount> {
        self.discounts
            .iter()
            .filter(|discount| discount.student_id == student_id)
            .cloned()
            .collect()
    }

    /// Reserves the next reference number for `month`. Numbers are never handed out twice.
    pub fn next_invoice_sequence(&mut self, month: BillingMonth) -> Result<u32, LedgerError> {
        let current = self.invoice_counters.get(&month).copied().unwrap_or(0);
        if current >= MAX_SEQUENCE {
            return Err(LedgerError::SequenceExhausted(month));
        }
        let next = current + 1;
        self.invoice_counters.insert(month, next);
        self.touch();
        Ok(next)
    }

    /// Checks that a change set can be applied without breaking the journal.
    pub fn validate(&self, changes: &ChangeSet) -> Result<(), LedgerError> {
        let known_students: HashSet<Uuid> = self
            .students
            .iter()
            .map(|student| student.id)
            .chain(changes.students.iter().map(|student| student.id))
            .collect();
        let existing_ids: HashSet<Uuid> = self.entries.iter().map(|entry| entry.id).collect();
        let mut tails: HashMap<Uuid, (u64, Money)> = HashMap::new();
        let mut staged_ids = HashSet::new();

        for entry in &changes.entries {
            if !known_students.contains(&entry.student_id) {
                return Err(LedgerError::StudentNotFound(entry.student_id.to_string()));
            }
            if existing_ids.contains(&entry.id) || !staged_ids.insert(entry.id) {
                return Err(LedgerError::Conflict(format!(
                    "ledger entry {} already exists",
                    entry.id
                )));
            }
            let (last_seq, last_balance) = match tails.get(&entry.student_id) {
                Some(tail) => *tail,
                None => self.tail_of(entry.student_id),
            };
            if entry.seq != last_seq + 1 {
                return Err(LedgerError::Conflict(format!(
                    "entry #{} for student {} does not follow #{}",
                    entry.seq, entry.student_id, last_seq
                )));
            }
            let expected = last_balance.checked_add(entry.signed_amount()).ok_or_else(|| {
                LedgerError::InvalidAmount(format!(
                    "entry #{} for student {} overflows the running balance",
                    entry.seq, entry.student_id
                ))
            })?;
            if entry.balance_after != expected {
                return Err(LedgerError::Conflict(format!(
                    "entry #{} for student {} carries balance {} but {} was expected",
                    entry.seq, entry.student_id, entry.balance_after, expected
                )));
            }
            tails.insert(entry.student_id, (entry.seq, entry.balance_after));
        }

        for invoice in &changes.invoices {
            if let Some(existing) = self.invoice_for(invoice.student_id, invoice.month) {
                if existing.reference != invoice.reference {
                    return Err(LedgerError::DuplicateInvoice {
                        student_id: invoice.student_id,
                        month: invoice.month,
                        reference: existing.reference.to_string(),
                    });
                }
            }
        }

        for room in &changes.rooms {
            if room.occupants.len() as u32 > room.capacity {
                return Err(LedgerError::RoomFull(room.number.clone()));
            }
        }
        Ok(())
    }

    /// Applies a change set after validation.
    pub fn apply(&mut self, changes: ChangeSet) -> Result<(), LedgerError> {
        self.validate(&changes)?;
        let ChangeSet {
            entries,
            invoices,
            payments,
            discounts,
            students,
            rooms,
        } = changes;

        self.entries.extend(entries);
        for invoice in invoices {
            upsert(&mut self.invoices, invoice, |a, b| a.reference == b.reference);
        }
        for payment in payments {
            upsert(&mut self.payments, payment, |a, b| a.id == b.id);
        }
        for discount in discounts {
            upsert(&mut self.discounts, discount, |a, b| a.id == b.id);
        }
        for student in students {
            upsert(&mut self.students, student, |a, b| a.id == b.id);
        }
        for room in rooms {
            upsert(&mut self.rooms, room, |a, b| a.id == b.id);
        }
        self.touch();
        Ok(())
    }

    fn tail_of(&self, student_id: Uuid) -> (u64, Money) {
        self.entries
            .iter()
            .filter(|entry| entry.student_id == student_id)
            .max_by_key(|entry| entry.seq)
            .map(|entry| (entry.seq, entry.balance_after))
            .unwrap_or((0, Money::ZERO))
    }

    /// Returns students left in `Settling` by an interrupted checkout to `Active`.
    pub fn recover_interrupted_checkouts(&mut self) -> Vec<Uuid> {
        let mut recovered = Vec::new();
        for student in &mut self.students {
            if student.status == StudentStatus::Settling {
                student.status = StudentStatus::Active;
                recovered.push(student.id);
            }
        }
        if !recovered.is_empty() {
            self.touch();
        }
        recovered
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    match items.iter_mut().find(|existing| same(&**existing, &item)) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}
