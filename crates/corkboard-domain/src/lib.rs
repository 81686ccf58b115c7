pub mod board;
pub mod board_view;
pub mod layout;
pub mod task;

pub use board::{Board, BoardId};
pub use board_view::{BoardView, ColumnView};
pub use layout::{BoardLayout, Column, ColumnId};
pub use task::{Comment, Task, TaskId, UserId};
