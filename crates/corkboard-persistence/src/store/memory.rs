use crate::store::snapshot;
use crate::traits::{BoardStore, VersionedLayout};
use async_trait::async_trait;
use corkboard_core::{CorkboardError, CorkboardResult};
use corkboard_domain::{
    Board, BoardId, BoardLayout, BoardView, Column, ColumnId, Task, TaskId, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    boards: HashMap<BoardId, Board>,
    layouts: HashMap<BoardId, VersionedLayout>,
    tasks: HashMap<TaskId, Task>,
}

/// In-memory document store. All documents live behind one async RwLock, so
/// each `BoardStore` call is a single atomic step against the full state and
/// the atomic-field-operation contract holds by construction. Every write to
/// a layout document bumps its revision.
///
/// With a snapshot path configured, the full state is re-serialized and
/// written atomically after each mutation, and `restore` reloads it at boot.
#[derive(Clone)]
pub struct MemoryBoardStore {
    state: Arc<RwLock<StoreState>>,
    snapshot_path: Option<PathBuf>,
    instance_id: Uuid,
}

impl MemoryBoardStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            snapshot_path: None,
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            snapshot_path: Some(path.into()),
            instance_id: Uuid::new_v4(),
        }
    }

    /// Load a previously written snapshot; an absent file yields an empty
    /// store that will snapshot to the same path.
    pub async fn restore(path: impl Into<PathBuf>) -> CorkboardResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::with_snapshot(path));
        }
        let (state, metadata) = snapshot::read_snapshot::<StoreState>(&path).await?;
        tracing::info!(
            "Restored {} boards and {} tasks from {} (saved at {})",
            state.boards.len(),
            state.tasks.len(),
            path.display(),
            metadata.saved_at
        );
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(path),
            instance_id: Uuid::new_v4(),
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// All board documents, for startup logging and bootstrap tooling.
    pub async fn list_boards(&self) -> Vec<Board> {
        let state = self.state.read().await;
        state.boards.values().cloned().collect()
    }

    /// Create a board document together with its empty layout.
    pub async fn create_board(&self, title: &str, members: Vec<UserId>) -> CorkboardResult<Board> {
        let board = Board::new(title.to_string(), members);
        let mut state = self.state.write().await;
        state.layouts.insert(
            board.id,
            VersionedLayout {
                layout: BoardLayout::new(board.id),
                revision: 0,
            },
        );
        state.boards.insert(board.id, board.clone());
        self.flush(&state).await?;
        Ok(board)
    }

    async fn flush(&self, state: &StoreState) -> CorkboardResult<()> {
        if let Some(path) = &self.snapshot_path {
            snapshot::write_snapshot(path, self.instance_id, state).await?;
        }
        Ok(())
    }

    fn layout_mut<'a>(
        state: &'a mut StoreState,
        board: BoardId,
    ) -> CorkboardResult<&'a mut VersionedLayout> {
        state
            .layouts
            .get_mut(&board)
            .ok_or_else(|| CorkboardError::NotFound(format!("layout for board {}", board)))
    }
}

impl Default for MemoryBoardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BoardStore for MemoryBoardStore {
    async fn get_board(&self, board: BoardId) -> CorkboardResult<Option<Board>> {
        let state = self.state.read().await;
        Ok(state.boards.get(&board).cloned())
    }

    async fn set_board_title(&self, board: BoardId, title: &str) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        match state.boards.get_mut(&board) {
            Some(doc) => doc.rename(title.to_string()),
            None => return Err(CorkboardError::NotFound(format!("board {}", board))),
        }
        self.flush(&state).await
    }

    async fn get_task(&self, task: TaskId) -> CorkboardResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&task).cloned())
    }

    async fn insert_task_doc(&self, task: &Task) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        state.tasks.insert(task.id, task.clone());
        self.flush(&state).await
    }

    async fn delete_task_doc(&self, task: TaskId) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        state.tasks.remove(&task);
        self.flush(&state).await
    }

    async fn set_tasks_archived(&self, tasks: &[TaskId], archived: bool) -> CorkboardResult<usize> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for id in tasks {
            if let Some(task) = state.tasks.get_mut(id) {
                task.set_archived(archived);
                updated += 1;
            }
        }
        self.flush(&state).await?;
        Ok(updated)
    }

    async fn push_task(
        &self,
        board: BoardId,
        column: ColumnId,
        task: TaskId,
        position: Option<i64>,
    ) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if let Some(len) = versioned.layout.column(column).map(|c| c.tasks.len()) {
            let position = position.unwrap_or(len as i64);
            versioned.layout.insert_task(column, position, task);
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn pull_task(
        &self,
        board: BoardId,
        column: ColumnId,
        task: TaskId,
    ) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if versioned.layout.remove_task(column, task) {
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn move_task(
        &self,
        board: BoardId,
        from: ColumnId,
        to: ColumnId,
        task: TaskId,
        position: i64,
    ) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if versioned.layout.move_task(from, to, position, task) {
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn archive_task(
        &self,
        board: BoardId,
        column: ColumnId,
        task: TaskId,
    ) -> CorkboardResult<bool> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        let moved = versioned.layout.archive_task(column, task);
        if moved {
            versioned.revision += 1;
        }
        self.flush(&state).await?;
        Ok(moved)
    }

    async fn push_column(&self, board: BoardId, column: Column) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        versioned.layout.columns.push(column);
        versioned.revision += 1;
        self.flush(&state).await
    }

    async fn set_column_title(
        &self,
        board: BoardId,
        column_index: usize,
        title: &str,
    ) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if let Some(column) = versioned.layout.columns.get_mut(column_index) {
            column.title = title.to_string();
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn push_archived(&self, board: BoardId, task: TaskId) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if !versioned.layout.archived.contains(&task) {
            versioned.layout.archived.push(task);
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn pull_archived(&self, board: BoardId, task: TaskId) -> CorkboardResult<()> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if versioned.layout.delete_archived_task(task) {
            versioned.revision += 1;
        }
        self.flush(&state).await
    }

    async fn load_layout(&self, board: BoardId) -> CorkboardResult<VersionedLayout> {
        let state = self.state.read().await;
        state
            .layouts
            .get(&board)
            .cloned()
            .ok_or_else(|| CorkboardError::NotFound(format!("layout for board {}", board)))
    }

    async fn replace_layout(&self, board: BoardId, layout: BoardLayout) -> CorkboardResult<u64> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        versioned.layout = layout;
        versioned.revision += 1;
        let revision = versioned.revision;
        self.flush(&state).await?;
        Ok(revision)
    }

    async fn replace_layout_if(
        &self,
        board: BoardId,
        layout: BoardLayout,
        expected_revision: u64,
    ) -> CorkboardResult<u64> {
        let mut state = self.state.write().await;
        let versioned = Self::layout_mut(&mut state, board)?;
        if versioned.revision != expected_revision {
            return Err(CorkboardError::RevisionConflict {
                board,
                expected: expected_revision,
                found: versioned.revision,
            });
        }
        versioned.layout = layout;
        versioned.revision += 1;
        let revision = versioned.revision;
        self.flush(&state).await?;
        Ok(revision)
    }

    async fn resolve_layout(&self, board: BoardId) -> CorkboardResult<BoardView> {
        let state = self.state.read().await;
        let versioned = state
            .layouts
            .get(&board)
            .ok_or_else(|| CorkboardError::NotFound(format!("layout for board {}", board)))?;
        Ok(BoardView::resolve(&versioned.layout, |id| {
            state.tasks.get(&id).cloned()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixture {
        store: MemoryBoardStore,
        board: BoardId,
        col_a: ColumnId,
        col_b: ColumnId,
    }

    /// Board with two columns; `tasks` are inserted as documents and appended
    /// to column A in order.
    async fn fixture_with_tasks(tasks: &[TaskId]) -> Fixture {
        let store = MemoryBoardStore::new();
        let board = store.create_board("Test", vec![]).await.unwrap().id;
        let col_a = Column::new("A".to_string());
        let col_b = Column::new("B".to_string());
        let (a, b) = (col_a.id, col_b.id);
        store.push_column(board, col_a).await.unwrap();
        store.push_column(board, col_b).await.unwrap();
        for id in tasks {
            let mut task = Task::new(board, format!("task {}", id), "alice".to_string(), *id);
            task.id = *id;
            store.insert_task_doc(&task).await.unwrap();
            store.push_task(board, a, *id, None).await.unwrap();
        }
        Fixture {
            store,
            board,
            col_a: a,
            col_b: b,
        }
    }

    #[tokio::test]
    async fn test_push_task_appends_without_position() {
        let t = [Uuid::new_v4(), Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        let layout = f.store.load_layout(f.board).await.unwrap().layout;
        assert_eq!(layout.column(f.col_a).unwrap().tasks, t.to_vec());
    }

    #[tokio::test]
    async fn test_push_task_positional_insert() {
        let t = [Uuid::new_v4(), Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        let extra = Uuid::new_v4();
        f.store
            .push_task(f.board, f.col_a, extra, Some(1))
            .await
            .unwrap();
        let layout = f.store.load_layout(f.board).await.unwrap().layout;
        assert_eq!(layout.column(f.col_a).unwrap().tasks, vec![t[0], extra, t[1]]);
    }

    #[tokio::test]
    async fn test_pull_task_is_idempotent() {
        let t = [Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        f.store.pull_task(f.board, f.col_a, t[0]).await.unwrap();
        let rev_after_first = f.store.load_layout(f.board).await.unwrap().revision;
        f.store.pull_task(f.board, f.col_a, t[0]).await.unwrap();
        let after_second = f.store.load_layout(f.board).await.unwrap();
        // A no-op pull neither mutates nor bumps the revision.
        assert_eq!(after_second.revision, rev_after_first);
        assert!(after_second.layout.column(f.col_a).unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_move_task_same_column() {
        let t = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        f.store
            .move_task(f.board, f.col_a, f.col_a, t[0], 2)
            .await
            .unwrap();
        let layout = f.store.load_layout(f.board).await.unwrap().layout;
        assert_eq!(layout.column(f.col_a).unwrap().tasks, vec![t[1], t[2], t[0]]);
    }

    #[tokio::test]
    async fn test_independent_atomic_ops_commute() {
        // add-task into column B and archive of an unrelated task from
        // column A must yield the same layout in either order.
        let t = [Uuid::new_v4(), Uuid::new_v4()];
        let new_task = Uuid::new_v4();

        let run = |first_add: bool| async move {
            let f = fixture_with_tasks(&t).await;
            if first_add {
                f.store.push_task(f.board, f.col_b, new_task, None).await.unwrap();
                f.store.pull_task(f.board, f.col_a, t[0]).await.unwrap();
                f.store.push_archived(f.board, t[0]).await.unwrap();
            } else {
                f.store.pull_task(f.board, f.col_a, t[0]).await.unwrap();
                f.store.push_archived(f.board, t[0]).await.unwrap();
                f.store.push_task(f.board, f.col_b, new_task, None).await.unwrap();
            }
            let layout = f.store.load_layout(f.board).await.unwrap().layout;
            (
                layout.column(f.col_a).unwrap().tasks.clone(),
                layout.column(f.col_b).unwrap().tasks.clone(),
                layout.archived.clone(),
            )
        };

        assert_eq!(run(true).await, run(false).await);
    }

    #[tokio::test]
    async fn test_replace_layout_if_succeeds_at_expected_revision() {
        let f = fixture_with_tasks(&[]).await;
        let versioned = f.store.load_layout(f.board).await.unwrap();
        let mut layout = versioned.layout;
        layout.move_column(0, 1);
        let new_revision = f
            .store
            .replace_layout_if(f.board, layout, versioned.revision)
            .await
            .unwrap();
        assert_eq!(new_revision, versioned.revision + 1);
    }

    #[tokio::test]
    async fn test_replace_layout_if_detects_interleaved_atomic_op() {
        let f = fixture_with_tasks(&[]).await;
        let versioned = f.store.load_layout(f.board).await.unwrap();

        // Another handler slips in an atomic write between read and replace.
        f.store
            .push_task(f.board, f.col_b, Uuid::new_v4(), None)
            .await
            .unwrap();

        let mut layout = versioned.layout;
        layout.move_column(0, 1);
        let err = f
            .store
            .replace_layout_if(f.board, layout, versioned.revision)
            .await
            .unwrap_err();
        assert!(matches!(err, CorkboardError::RevisionConflict { .. }));
    }

    #[tokio::test]
    async fn test_unconditional_replace_loses_concurrent_add() {
        // The lost-update failure mode: two handlers read the same layout,
        // each adds a task in memory, both replace the whole document. The
        // second replace silently discards the first add.
        let f = fixture_with_tasks(&[]).await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let read_one = f.store.load_layout(f.board).await.unwrap();
        let read_two = f.store.load_layout(f.board).await.unwrap();

        let mut layout_one = read_one.layout;
        layout_one.insert_task(f.col_a, 0, first);
        f.store.replace_layout(f.board, layout_one).await.unwrap();

        let mut layout_two = read_two.layout;
        layout_two.insert_task(f.col_a, 0, second);
        f.store.replace_layout(f.board, layout_two).await.unwrap();

        let final_layout = f.store.load_layout(f.board).await.unwrap().layout;
        let tasks = &final_layout.column(f.col_a).unwrap().tasks;
        assert!(tasks.contains(&second));
        assert!(!tasks.contains(&first), "first add should have been lost");
    }

    #[tokio::test]
    async fn test_set_tasks_archived_bulk() {
        let t = [Uuid::new_v4(), Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        let missing = Uuid::new_v4();
        let updated = f
            .store
            .set_tasks_archived(&[t[0], t[1], missing], true)
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert!(f.store.get_task(t[0]).await.unwrap().unwrap().archived);
        assert!(f.store.get_task(t[1]).await.unwrap().unwrap().archived);
    }

    #[tokio::test]
    async fn test_resolve_layout_expands_task_documents() {
        let t = [Uuid::new_v4()];
        let f = fixture_with_tasks(&t).await;
        let view = f.store.resolve_layout(f.board).await.unwrap();
        assert_eq!(view.columns.len(), 2);
        assert_eq!(view.columns[0].tasks.len(), 1);
        assert_eq!(view.columns[0].tasks[0].id, t[0]);
        assert!(view.archived.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_restore_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corkboard.json");
        let t = Uuid::new_v4();

        let board_id;
        let col_id;
        {
            let store = MemoryBoardStore::with_snapshot(&path);
            let board = store.create_board("Persisted", vec![]).await.unwrap();
            board_id = board.id;
            let column = Column::new("Backlog".to_string());
            col_id = column.id;
            store.push_column(board_id, column).await.unwrap();
            let mut task = Task::new(board_id, "carry over".to_string(), "alice".to_string(), t);
            task.id = t;
            store.insert_task_doc(&task).await.unwrap();
            store.push_task(board_id, col_id, t, None).await.unwrap();
        }

        let restored = MemoryBoardStore::restore(&path).await.unwrap();
        let board = restored.get_board(board_id).await.unwrap().unwrap();
        assert_eq!(board.title, "Persisted");
        let layout = restored.load_layout(board_id).await.unwrap().layout;
        assert_eq!(layout.column(col_id).unwrap().tasks, vec![t]);
        assert_eq!(restored.get_task(t).await.unwrap().unwrap().title, "carry over");
    }
}
