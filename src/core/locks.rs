//! Single-writer-per-student lease registry.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::errors::LedgerError;

/// Grants at most one lease per student. Different students never contend.
#[derive(Debug)]
pub struct StudentLocks {
    held: Mutex<HashSet<Uuid>>,
    released: Condvar,
    timeout: Duration,
}

impl StudentLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Blocks until the student's lease is free or the timeout elapses.
    pub fn acquire(&self, student_id: Uuid) -> Result<StudentLease<'_>, LedgerError> {
        let deadline = Instant::now() + self.timeout;
        let mut held = self.held.lock();
        while held.contains(&student_id) {
            let waited = self.released.wait_until(&mut held, deadline);
            if waited.timed_out() && held.contains(&student_id) {
                tracing::warn!(student = %student_id, "ledger lock wait timed out");
                return Err(LedgerError::Timeout(format!(
                    "ledger lock for student {student_id}"
                )));
            }
        }
        held.insert(student_id);
        Ok(StudentLease {
            locks: self,
            student_id,
        })
    }

    pub fn is_held(&self, student_id: Uuid) -> bool {
        self.held.lock().contains(&student_id)
    }
}

/// Exclusive right to post to one student's ledger. Released on drop.
#[derive(Debug)]
pub struct StudentLease<'a> {
    locks: &'a StudentLocks,
    student_id: Uuid,
}

impl StudentLease<'_> {
    pub fn student_id(&self) -> Uuid {
        self.student_id
    }
}

impl Drop for StudentLease<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock();
        held.remove(&self.student_id);
        drop(held);
        self.locks.released.notify_all();
    }
}
