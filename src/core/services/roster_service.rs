//! Rooms, enrollment and room assignment.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    core::context::LedgerContext,
    errors::LedgerError,
    ledger::{ChangeSet, FeeSchedule, Room, Student, StudentStatus},
};

use super::{require_student, ServiceResult};

#[derive(Debug, Clone)]
pub struct EnrollRequest {
    pub name: String,
    pub fees: FeeSchedule,
    /// Defaults to today.
    pub check_in_date: Option<NaiveDate>,
    pub room_id: Option<Uuid>,
}

impl EnrollRequest {
    pub fn new(name: impl Into<String>, fees: FeeSchedule) -> Self {
        Self {
            name: name.into(),
            fees,
            check_in_date: None,
            room_id: None,
        }
    }

    pub fn checked_in(mut self, date: NaiveDate) -> Self {
        self.check_in_date = Some(date);
        self
    }

    pub fn in_room(mut self, room_id: Uuid) -> Self {
        self.room_id = Some(room_id);
        self
    }
}

pub struct RosterService;

impl RosterService {
    pub fn add_room(ctx: &LedgerContext, number: &str, capacity: u32) -> ServiceResult<Room> {
        let number = number.trim();
        if number.is_empty() {
            return Err(LedgerError::Validation("room number is required".into()));
        }
        if capacity == 0 {
            return Err(LedgerError::Validation(format!(
                "room {number} needs a capacity of at least 1"
            )));
        }
        if Self::find_room(ctx, number)?.is_some() {
            return Err(LedgerError::Validation(format!("room {number} already exists")));
        }
        let room = Room::new(number, capacity);
        ctx.store.apply(ChangeSet::new().room(room.clone()))?;
        tracing::info!(room = %room.number, capacity, "room added");
        Ok(room)
    }

    pub fn enroll(ctx: &LedgerContext, request: EnrollRequest) -> ServiceResult<Student> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("student name is required".into()));
        }
        let fees = request.fees;
        for (label, amount) in [
            ("base monthly fee", fees.base_monthly_fee),
            ("laundry fee", fees.laundry_fee),
            ("food fee", fees.food_fee),
        ] {
            if amount.is_negative() {
                return Err(LedgerError::InvalidAmount(format!(
                    "{label} cannot be negative, got {amount}"
                )));
            }
        }
        if fees
            .base_monthly_fee
            .checked_add(fees.laundry_fee)
            .and_then(|subtotal| subtotal.checked_add(fees.food_fee))
            .is_none()
        {
            return Err(LedgerError::InvalidAmount(
                "monthly fees are too large to total".into(),
            ));
        }

        let check_in = request.check_in_date.unwrap_or_else(|| ctx.clock.today());
        let mut student = Student::new(name, fees, check_in);
        let mut changes = ChangeSet::new();
        if let Some(room_id) = request.room_id {
            let mut room = Self::require_room(ctx, room_id)?;
            if !room.occupy(student.id) {
                return Err(LedgerError::RoomFull(room.number));
            }
            student = student.with_room(room_id);
            changes = changes.room(room);
        }
        ctx.store.apply(changes.student(student.clone()))?;
        tracing::info!(student = %student.id, name = %student.name, check_in = %check_in, "student enrolled");
        Ok(student)
    }

    /// Moves an active student into `room_id`, releasing their previous room.
    pub fn assign_room(ctx: &LedgerContext, student_id: Uuid, room_id: Uuid) -> ServiceResult<Student> {
        let _lease = ctx.locks.acquire(student_id)?;
        let mut student = require_student(ctx, student_id)?;
        if student.status != StudentStatus::Active {
            return Err(LedgerError::StudentNotActive(student_id));
        }
        if student.room_id == Some(room_id) {
            return Ok(student);
        }

        let mut target = Self::require_room(ctx, room_id)?;
        if !target.occupy(student_id) {
            return Err(LedgerError::RoomFull(target.number));
        }
        let mut changes = ChangeSet::new();
        if let Some(previous_id) = student.room_id {
            if let Some(mut previous) = ctx.store.room(previous_id)? {
                previous.release(student_id);
                changes = changes.room(previous);
            }
        }
        student.room_id = Some(room_id);
        ctx.store
            .apply(changes.room(target.clone()).student(student.clone()))?;
        tracing::info!(student = %student_id, room = %target.number, "room assigned");
        Ok(student)
    }

    pub fn find_room(ctx: &LedgerContext, number: &str) -> ServiceResult<Option<Room>> {
        let number = number.trim();
        Ok(ctx
            .store
            .rooms()?
            .into_iter()
            .find(|room| room.number.eq_ignore_ascii_case(number)))
    }

    /// Resolves a student by id or by case-insensitive name. Ambiguous names fail.
    pub fn find_student(ctx: &LedgerContext, query: &str) -> ServiceResult<Student> {
        let query = query.trim();
        if let Ok(id) = Uuid::parse_str(query) {
            return require_student(ctx, id);
        }
        let mut matches: Vec<Student> = ctx
            .store
            .students()?
            .into_iter()
            .filter(|student| student.name.eq_ignore_ascii_case(query))
            .collect();
        match matches.len() {
            0 => Err(LedgerError::StudentNotFound(query.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(LedgerError::Validation(format!(
                "{n} students are named `{query}`; use the student id"
            ))),
        }
    }

    fn require_room(ctx: &LedgerContext, room_id: Uuid) -> ServiceResult<Room> {
        ctx.store
            .room(room_id)?
            .ok_or_else(|| LedgerError::RoomNotFound(room_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::BillingSettings, currency::Money, storage::MemoryStore};
    use std::sync::Arc;

    fn context() -> LedgerContext {
        LedgerContext::new(Arc::new(MemoryStore::new("Roster")), BillingSettings::default())
    }

    fn fees() -> FeeSchedule {
        FeeSchedule::new(Money::from_major(5000), Money::from_major(300), Money::ZERO)
    }

    #[test]
    fn room_numbers_are_unique() {
        let ctx = context();
        RosterService::add_room(&ctx, "101", 2).unwrap();
        assert!(RosterService::add_room(&ctx, " 101 ", 3).is_err());
        assert!(RosterService::add_room(&ctx, "102", 0).is_err());
    }

    #[test]
    fn enroll_respects_room_capacity() {
        let ctx = context();
        let room = RosterService::add_room(&ctx, "S1", 1).unwrap();
        RosterService::enroll(&ctx, EnrollRequest::new("Hari", fees()).in_room(room.id)).unwrap();
        let err = RosterService::enroll(&ctx, EnrollRequest::new("Shyam", fees()).in_room(room.id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RoomFull(_)));
        assert_eq!(ctx.store.students().unwrap().len(), 1);
    }

    #[test]
    fn negative_fees_are_rejected() {
        let ctx = context();
        let mut bad = fees();
        bad.food_fee = Money::from_major(-1);
        assert!(matches!(
            RosterService::enroll(&ctx, EnrollRequest::new("Hari", bad)),
            Err(LedgerError::InvalidAmount(_))
        ));

        let mut huge = fees();
        huge.base_monthly_fee = Money::from_minor(i64::MAX);
        assert!(matches!(
            RosterService::enroll(&ctx, EnrollRequest::new("Hari", huge)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn assign_moves_between_rooms() {
        let ctx = context();
        let first = RosterService::add_room(&ctx, "A", 1).unwrap();
        let second = RosterService::add_room(&ctx, "B", 1).unwrap();
        let student =
            RosterService::enroll(&ctx, EnrollRequest::new("Maya", fees()).in_room(first.id)).unwrap();
        let moved = RosterService::assign_room(&ctx, student.id, second.id).unwrap();
        assert_eq!(moved.room_id, Some(second.id));
        assert!(ctx.store.room(first.id).unwrap().unwrap().is_vacant());
        assert_eq!(ctx.store.room(second.id).unwrap().unwrap().occupants, vec![student.id]);
    }

    #[test]
    fn find_student_by_name_or_id() {
        let ctx = context();
        let student = RosterService::enroll(&ctx, EnrollRequest::new("Maya", fees())).unwrap();
        assert_eq!(RosterService::find_student(&ctx, "maya").unwrap().id, student.id);
        assert_eq!(
            RosterService::find_student(&ctx, &student.id.to_string()).unwrap().id,
            student.id
        );
        assert!(RosterService::find_student(&ctx, "nobody").is_err());
    }
}
