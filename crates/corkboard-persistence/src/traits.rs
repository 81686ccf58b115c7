use async_trait::async_trait;
use corkboard_core::CorkboardResult;
use corkboard_domain::{Board, BoardId, BoardLayout, BoardView, Column, ColumnId, Task, TaskId};
use serde::{Deserialize, Serialize};

/// A layout document paired with the store revision it was read at. The
/// revision advances on every write to the document, including atomic field
/// operations, so a compare-and-swap replace detects any interleaved change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedLayout {
    pub layout: BoardLayout,
    pub revision: u64,
}

/// The durable store the sync engine writes through.
///
/// Two classes of operation, deliberately kept apart:
///
/// - Atomic field operations mutate one field of one document in a single
///   step and commute with each other regardless of arrival order. Stale
///   identifiers and out-of-range positions degrade to clamps or no-ops,
///   mirroring the ordering model.
/// - Whole-document operations replace the full layout from an in-memory
///   copy. `replace_layout` is unconditional last-write-wins and can discard
///   concurrent writes; callers that cannot tolerate that must go through
///   `replace_layout_if`, which fails with `RevisionConflict` when the
///   document has moved on since the `load_layout` read.
#[async_trait]
pub trait BoardStore: Send + Sync {
    // Board documents
    async fn get_board(&self, board: BoardId) -> CorkboardResult<Option<Board>>;
    async fn set_board_title(&self, board: BoardId, title: &str) -> CorkboardResult<()>;

    // Task documents
    async fn get_task(&self, task: TaskId) -> CorkboardResult<Option<Task>>;
    async fn insert_task_doc(&self, task: &Task) -> CorkboardResult<()>;
    async fn delete_task_doc(&self, task: TaskId) -> CorkboardResult<()>;
    /// Multi-key bulk flag update. Returns how many documents changed.
    async fn set_tasks_archived(&self, tasks: &[TaskId], archived: bool) -> CorkboardResult<usize>;

    // Atomic field operations on the layout document
    /// Positional insert, clamped; `None` appends.
    async fn push_task(
        &self,
        board: BoardId,
        column: ColumnId,
        task: TaskId,
        position: Option<i64>,
    ) -> CorkboardResult<()>;
    /// Idempotent positional remove.
    async fn pull_task(&self, board: BoardId, column: ColumnId, task: TaskId)
        -> CorkboardResult<()>;
    /// Compound move covering same-column and cross-column in one step;
    /// removal precedes index interpretation.
    async fn move_task(
        &self,
        board: BoardId,
        from: ColumnId,
        to: ColumnId,
        task: TaskId,
        position: i64,
    ) -> CorkboardResult<()>;
    /// Compound pull-from-column + push-to-bucket in one step. Returns
    /// whether the task actually moved; a task that was not in that column
    /// is left wherever it is, so the caller knows no flag flip is owed.
    async fn archive_task(
        &self,
        board: BoardId,
        column: ColumnId,
        task: TaskId,
    ) -> CorkboardResult<bool>;
    async fn push_column(&self, board: BoardId, column: Column) -> CorkboardResult<()>;
    async fn set_column_title(
        &self,
        board: BoardId,
        column_index: usize,
        title: &str,
    ) -> CorkboardResult<()>;
    async fn push_archived(&self, board: BoardId, task: TaskId) -> CorkboardResult<()>;
    async fn pull_archived(&self, board: BoardId, task: TaskId) -> CorkboardResult<()>;

    // Whole-document operations
    async fn load_layout(&self, board: BoardId) -> CorkboardResult<VersionedLayout>;
    /// Unconditional replace. Last write wins; unsafe when the in-memory copy
    /// is stale.
    async fn replace_layout(&self, board: BoardId, layout: BoardLayout) -> CorkboardResult<u64>;
    /// Replace only if the document is still at `expected_revision`.
    async fn replace_layout_if(
        &self,
        board: BoardId,
        layout: BoardLayout,
        expected_revision: u64,
    ) -> CorkboardResult<u64>;

    // Resolved read path
    /// The layout with task ids expanded to full documents, for broadcast
    /// payloads and reconciliation.
    async fn resolve_layout(&self, board: BoardId) -> CorkboardResult<BoardView>;
}
