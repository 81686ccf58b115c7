use corkboard_domain::{BoardId, BoardView, Column, ColumnId, Task, TaskId};
use serde::{Deserialize, Serialize};

/// Where a task sits: the column and the position within its sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Slot {
    pub column: ColumnId,
    pub index: i64,
}

/// Every request a client can issue, one variant per operation, each with
/// its own field set. Deserialization is the validation boundary: a payload
/// that does not match a variant exactly is rejected before any handler
/// sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientRequest {
    JoinBoard {
        board_id: BoardId,
    },
    LeaveBoard {
        board_id: BoardId,
    },
    AddTask {
        board_id: BoardId,
        column_id: ColumnId,
        title: String,
    },
    MoveTask {
        board_id: BoardId,
        task_id: TaskId,
        source: Slot,
        dest: Slot,
    },
    AddList {
        board_id: BoardId,
        title: String,
    },
    MoveList {
        board_id: BoardId,
        from_index: i64,
        to_index: i64,
    },
    RenameList {
        board_id: BoardId,
        column_index: usize,
        title: String,
    },
    RenameBoard {
        board_id: BoardId,
        title: String,
    },
    ArchiveTask {
        board_id: BoardId,
        task_id: TaskId,
        column_id: ColumnId,
    },
    DeleteTask {
        board_id: BoardId,
        task_id: TaskId,
    },
    ArchiveColumn {
        board_id: BoardId,
        column_id: ColumnId,
    },
    DeleteList {
        board_id: BoardId,
        column_index: i64,
    },
}

impl ClientRequest {
    pub fn board_id(&self) -> BoardId {
        match self {
            Self::JoinBoard { board_id }
            | Self::LeaveBoard { board_id }
            | Self::AddTask { board_id, .. }
            | Self::MoveTask { board_id, .. }
            | Self::AddList { board_id, .. }
            | Self::MoveList { board_id, .. }
            | Self::RenameList { board_id, .. }
            | Self::RenameBoard { board_id, .. }
            | Self::ArchiveTask { board_id, .. }
            | Self::DeleteTask { board_id, .. }
            | Self::ArchiveColumn { board_id, .. }
            | Self::DeleteList { board_id, .. } => *board_id,
        }
    }
}

/// Wire wrapper pairing a request with its correlation id, so a connection
/// can keep several requests in flight and match acknowledgements to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub request_id: Option<u64>,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// Everything the server sends down a connection: acknowledgements and
/// request-local errors for the originating connection, and the room-scoped
/// broadcast events. An ack means "accepted for processing", not "durably
/// persisted".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Ack {
        request_id: Option<u64>,
    },
    Error {
        request_id: Option<u64>,
        reason: String,
    },
    TaskAdded {
        task: Task,
        column_id: ColumnId,
    },
    LayoutUpdated {
        layout: BoardView,
    },
    ListAdded {
        column: Column,
    },
    ListRenamed {
        column_index: usize,
        title: String,
    },
    BoardRenamed {
        title: String,
    },
    TaskArchived {
        task_id: TaskId,
        column_id: ColumnId,
    },
    TaskDeleted {
        task_id: TaskId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_parse_add_task_with_request_id() {
        let board = Uuid::new_v4();
        let column = Uuid::new_v4();
        let json = format!(
            r#"{{"request_id": 7, "type": "add-task", "board_id": "{}", "column_id": "{}", "title": "Ship it"}}"#,
            board, column
        );
        let envelope: ClientEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.request_id, Some(7));
        match envelope.request {
            ClientRequest::AddTask {
                board_id,
                column_id,
                title,
            } => {
                assert_eq!(board_id, board);
                assert_eq!(column_id, column);
                assert_eq!(title, "Ship it");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_request_id_is_optional() {
        let json = format!(
            r#"{{"type": "join-board", "board_id": "{}"}}"#,
            Uuid::new_v4()
        );
        let envelope: ClientEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.request_id, None);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = format!(
            r#"{{"type": "drop-all-tables", "board_id": "{}"}}"#,
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<ClientEnvelope>(&json).is_err());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = format!(r#"{{"type": "add-task", "board_id": "{}"}}"#, Uuid::new_v4());
        assert!(serde_json::from_str::<ClientEnvelope>(&json).is_err());
    }

    #[test]
    fn test_server_event_tags_match_wire_names() {
        let message = ServerMessage::TaskDeleted {
            task_id: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "task-deleted");

        let message = ServerMessage::BoardRenamed {
            title: "Q3 plan".to_string(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "board-renamed");
    }
}
