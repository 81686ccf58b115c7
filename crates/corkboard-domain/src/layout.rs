use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::BoardId;
use crate::task::TaskId;

pub type ColumnId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub tasks: Vec<TaskId>,
}

impl Column {
    pub fn new(title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            tasks: Vec::new(),
        }
    }
}

/// The ordered-columns-of-ordered-tasks document for one board, plus the
/// archived bucket. Order in `columns` and in each column's `tasks` is the
/// single source of truth; there is no separate rank field.
///
/// Invariant: a task id lives in at most one column's sequence or in
/// `archived`, never in both and never twice. Every mutator below preserves
/// this; requests naming stale ids or out-of-range indices degrade to clamps
/// or silent no-ops rather than errors, so clients with slightly outdated
/// state cannot corrupt the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub board_id: BoardId,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub archived: Vec<TaskId>,
}

impl BoardLayout {
    pub fn new(board_id: BoardId) -> Self {
        Self {
            board_id,
            columns: Vec::new(),
            archived: Vec::new(),
        }
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn contains_task(&self, task: TaskId) -> bool {
        self.archived.contains(&task) || self.columns.iter().any(|c| c.tasks.contains(&task))
    }

    fn clamp_index(position: i64, len: usize) -> usize {
        position.clamp(0, len as i64) as usize
    }

    /// Insert `task` into the named column at `position`, clamped to
    /// `[0, len]`. Returns false when the column id is unknown.
    pub fn insert_task(&mut self, column: ColumnId, position: i64, task: TaskId) -> bool {
        match self.column_mut(column) {
            Some(col) => {
                let index = Self::clamp_index(position, col.tasks.len());
                col.tasks.insert(index, task);
                true
            }
            None => false,
        }
    }

    /// Remove the first occurrence of `task` from the named column.
    /// Idempotent: absent task (or unknown column) is a no-op, so a removal
    /// racing with a prior removal converges to the same state.
    pub fn remove_task(&mut self, column: ColumnId, task: TaskId) -> bool {
        match self.column_mut(column) {
            Some(col) => match col.tasks.iter().position(|t| *t == task) {
                Some(index) => {
                    col.tasks.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Move `task` out of `from` and into `to` at `to_index`. Removal happens
    /// first, so for a same-column move the target index is interpreted
    /// against the post-removal sequence. A task that is not actually in
    /// `from` is left untouched wherever it is.
    pub fn move_task(&mut self, from: ColumnId, to: ColumnId, to_index: i64, task: TaskId) -> bool {
        if self.column(to).is_none() {
            return false;
        }
        if !self.remove_task(from, task) {
            return false;
        }
        self.insert_task(to, to_index, task)
    }

    /// Extract the column at `from_index` and reinsert it at `to_index`,
    /// both clamped. No-op on an empty layout.
    pub fn move_column(&mut self, from_index: i64, to_index: i64) {
        if self.columns.is_empty() {
            return;
        }
        let last = self.columns.len() as i64 - 1;
        let from = from_index.clamp(0, last) as usize;
        let column = self.columns.remove(from);
        let to = Self::clamp_index(to_index, self.columns.len());
        self.columns.insert(to, column);
    }

    /// Remove `task` from the named column and append it to the archived
    /// bucket. Returns true when the task was actually moved, in which case
    /// the caller owes a flag flip on the task document. A task that was not
    /// in that column is left alone so the bucket can never hold a duplicate.
    pub fn archive_task(&mut self, column: ColumnId, task: TaskId) -> bool {
        if !self.remove_task(column, task) {
            return false;
        }
        self.archived.push(task);
        true
    }

    /// Drain the entire sequence of the named column into the archived
    /// bucket, preserving order. Returns the drained ids for the bulk flag
    /// update on the task documents.
    pub fn archive_all(&mut self, column: ColumnId) -> Vec<TaskId> {
        let drained: Vec<TaskId> = match self.column_mut(column) {
            Some(col) => col.tasks.drain(..).collect(),
            None => Vec::new(),
        };
        self.archived.extend(drained.iter().copied());
        drained
    }

    /// Evacuate the column at `index` into the archived bucket, then remove
    /// the column itself. Out-of-range index is a silent no-op. Returns the
    /// evacuated ids.
    pub fn delete_column(&mut self, index: i64) -> Vec<TaskId> {
        if index < 0 || index as usize >= self.columns.len() {
            return Vec::new();
        }
        let column_id = self.columns[index as usize].id;
        let drained = self.archive_all(column_id);
        self.columns.remove(index as usize);
        drained
    }

    /// Remove `task` from the archived bucket only. No-op if absent.
    pub fn delete_archived_task(&mut self, task: TaskId) -> bool {
        match self.archived.iter().position(|t| *t == task) {
            Some(index) => {
                self.archived.remove(index);
                true
            }
            None => false,
        }
    }
}
