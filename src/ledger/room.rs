use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: Uuid,
    pub number: String,
    pub capacity: u32,
    #[serde(default)]
    pub occupants: Vec<Uuid>,
}

impl Room {
    pub fn new(number: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            capacity,
            occupants: Vec::new(),
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn has_space(&self) -> bool {
        (self.occupants.len() as u32) < self.capacity
    }

    pub fn occupy(&mut self, student_id: Uuid) -> bool {
        if self.occupants.contains(&student_id) {
            return true;
        }
        if !self.has_space() {
            return false;
        }
        self.occupants.push(student_id);
        true
    }

    pub fn release(&mut self, student_id: Uuid) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|id| *id != student_id);
        self.occupants.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_respects_capacity() {
        let mut room = Room::new("101", 1);
        let first = Uuid::new_v4();
        assert!(room.occupy(first));
        assert!(room.occupy(first), "re-occupying is a no-op");
        assert!(!room.occupy(Uuid::new_v4()));
        assert!(room.release(first));
        assert!(room.is_vacant());
        assert!(!room.release(first));
    }
}
