use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CorkboardError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("User {user} is not a member of board {board}")]
    NotAMember { user: Uuid, board: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Revision conflict on board {board}: expected {expected}, found {found}")]
    RevisionConflict {
        board: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
