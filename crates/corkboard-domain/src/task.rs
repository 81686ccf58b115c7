use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::BoardId;

pub type TaskId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author: String, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            body,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    pub comments: Vec<Comment>,
    pub labels: Vec<String>,
    pub assignees: Vec<UserId>,
    pub author: String,
    pub creator_id: UserId,
    pub board_id: BoardId,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(board_id: BoardId, title: String, author: String, creator_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description: String::new(),
            deadline: None,
            comments: Vec::new(),
            labels: Vec::new(),
            assignees: Vec::new(),
            author,
            creator_id,
            board_id,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    pub fn update_description(&mut self, description: String) {
        self.description = description;
        self.updated_at = Utc::now();
    }

    pub fn set_deadline(&mut self, deadline: Option<DateTime<Utc>>) {
        self.deadline = deadline;
        self.updated_at = Utc::now();
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = archived;
        self.updated_at = Utc::now();
    }

    pub fn add_comment(&mut self, author: String, body: String) {
        self.comments.push(Comment::new(author, body));
        self.updated_at = Utc::now();
    }

    pub fn add_label(&mut self, label: String) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
            self.updated_at = Utc::now();
        }
    }

    pub fn assign(&mut self, user: UserId) {
        if !self.assignees.contains(&user) {
            self.assignees.push(user);
            self.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_unarchived() {
        let task = Task::new(
            Uuid::new_v4(),
            "Write docs".to_string(),
            "alice".to_string(),
            Uuid::new_v4(),
        );
        assert!(!task.archived);
        assert!(task.comments.is_empty());
        assert_eq!(task.description, "");
    }

    #[test]
    fn test_add_label_deduplicates() {
        let mut task = Task::new(
            Uuid::new_v4(),
            "Write docs".to_string(),
            "alice".to_string(),
            Uuid::new_v4(),
        );
        task.add_label("urgent".to_string());
        task.add_label("urgent".to_string());
        assert_eq!(task.labels.len(), 1);
    }

    #[test]
    fn test_comments_keep_insertion_order() {
        let mut task = Task::new(
            Uuid::new_v4(),
            "Write docs".to_string(),
            "alice".to_string(),
            Uuid::new_v4(),
        );
        task.add_comment("alice".to_string(), "first".to_string());
        task.add_comment("bob".to_string(), "second".to_string());
        assert_eq!(task.comments[0].body, "first");
        assert_eq!(task.comments[1].body, "second");
    }
}
