use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::UserId;

pub type BoardId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(title: String, members: Vec<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            members,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rename(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    pub fn add_member(&mut self, user: UserId) {
        if !self.members.contains(&user) {
            self.members.push(user);
            self.updated_at = Utc::now();
        }
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let user = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let board = Board::new("Roadmap".to_string(), vec![user]);
        assert!(board.is_member(user));
        assert!(!board.is_member(stranger));
    }

    #[test]
    fn test_add_member_deduplicates() {
        let user = Uuid::new_v4();
        let mut board = Board::new("Roadmap".to_string(), vec![]);
        board.add_member(user);
        board.add_member(user);
        assert_eq!(board.members.len(), 1);
    }
}
