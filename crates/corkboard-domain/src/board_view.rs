use serde::{Deserialize, Serialize};

use crate::board::BoardId;
use crate::layout::{BoardLayout, ColumnId};
use crate::task::{Task, TaskId};

/// A column with its task ids expanded to full task documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    pub id: ColumnId,
    pub title: String,
    pub tasks: Vec<Task>,
}

/// The fully resolved layout broadcast to room members: columns and the
/// archived bucket with ids expanded to task documents. Ids whose document
/// cannot be found are dropped rather than failing the whole resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub board_id: BoardId,
    pub columns: Vec<ColumnView>,
    pub archived: Vec<Task>,
}

impl BoardView {
    pub fn resolve<F>(layout: &BoardLayout, lookup: F) -> Self
    where
        F: Fn(TaskId) -> Option<Task>,
    {
        let columns = layout
            .columns
            .iter()
            .map(|column| ColumnView {
                id: column.id,
                title: column.title.clone(),
                tasks: column.tasks.iter().filter_map(|id| lookup(*id)).collect(),
            })
            .collect();
        let archived = layout.archived.iter().filter_map(|id| lookup(*id)).collect();
        Self {
            board_id: layout.board_id,
            columns,
            archived,
        }
    }
}
