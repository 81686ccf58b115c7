use crate::dispatcher::Dispatcher;
use crate::gatekeeper::Gatekeeper;
use crate::protocol::{ClientEnvelope, ClientRequest, ServerMessage, Slot};
use crate::room::ConnectionId;
use corkboard_core::{CorkboardError, CorkboardResult};
use corkboard_domain::{BoardId, BoardLayout, BoardView, Column, ColumnId, Task, TaskId};
use corkboard_persistence::BoardStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Bound on CAS retries for replace-class durable applies. Exhaustion is a
/// persistence failure, reported through the reconciliation path like any
/// other.
const MAX_REPLACE_ATTEMPTS: u32 = 8;

/// One handler per client mutation. Every mutation runs the same two-stage
/// pipeline:
///
/// 1. compute-and-broadcast: derive the new ordering from the freshest read,
///    fan the delta out to the rest of the room, and ack the requester where
///    the operation calls for it. Nothing in this stage waits on durable
///    persistence.
/// 2. durable apply: spawned off the connection's event loop. Atomic-class
///    operations go through single-field store ops that commute; the three
///    replace-class operations (move-list, archive-column, delete-list) go
///    through a revision-checked replace with bounded retry, recomputing
///    against a fresh read on each conflict. A failed apply is logged and
///    answered with a corrective layout-updated broadcast to the whole room,
///    never with a crash of the connection handler.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn BoardStore>,
    gatekeeper: Arc<Gatekeeper>,
    dispatcher: Dispatcher,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn BoardStore>,
        gatekeeper: Arc<Gatekeeper>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            gatekeeper,
            dispatcher,
        }
    }

    pub async fn handle(&self, conn: ConnectionId, envelope: ClientEnvelope) {
        let request_id = envelope.request_id;
        match envelope.request {
            ClientRequest::JoinBoard { board_id } => {
                if let Err(err) = self.gatekeeper.join_board(conn, board_id).await {
                    // Refusals stay local to the requester; the room never
                    // hears about them.
                    tracing::debug!(conn, %board_id, error = %err, "join refused");
                    self.dispatcher.error(conn, request_id, err.to_string());
                }
            }
            ClientRequest::LeaveBoard { board_id } => {
                self.gatekeeper.leave_board(conn, board_id);
            }
            request => {
                let board_id = request.board_id();
                if self.gatekeeper.joined_board(conn) != Some(board_id) {
                    tracing::debug!(conn, %board_id, "mutation outside joined room refused");
                    self.dispatcher
                        .error(conn, request_id, "not joined to this board");
                    return;
                }
                if let Err(err) = self.apply(conn, request_id, request).await {
                    tracing::warn!(conn, %board_id, error = %err, "mutation rejected");
                    self.dispatcher.error(conn, request_id, err.to_string());
                }
            }
        }
    }

    async fn apply(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        request: ClientRequest,
    ) -> CorkboardResult<()> {
        match request {
            ClientRequest::AddTask {
                board_id,
                column_id,
                title,
            } => self.add_task(conn, request_id, board_id, column_id, title).await,
            ClientRequest::MoveTask {
                board_id,
                task_id,
                source,
                dest,
            } => self.move_task(conn, board_id, task_id, source, dest).await,
            ClientRequest::AddList { board_id, title } => {
                self.add_list(conn, request_id, board_id, title).await
            }
            ClientRequest::MoveList {
                board_id,
                from_index,
                to_index,
            } => self.move_list(conn, board_id, from_index, to_index).await,
            ClientRequest::RenameList {
                board_id,
                column_index,
                title,
            } => {
                self.rename_list(conn, request_id, board_id, column_index, title)
                    .await
            }
            ClientRequest::RenameBoard { board_id, title } => {
                self.rename_board(conn, request_id, board_id, title).await
            }
            ClientRequest::ArchiveTask {
                board_id,
                task_id,
                column_id,
            } => self.archive_task(conn, board_id, task_id, column_id).await,
            ClientRequest::DeleteTask { board_id, task_id } => {
                self.delete_task(conn, request_id, board_id, task_id).await
            }
            ClientRequest::ArchiveColumn {
                board_id,
                column_id,
            } => self.archive_column(conn, board_id, column_id).await,
            ClientRequest::DeleteList {
                board_id,
                column_index,
            } => self.delete_list(conn, board_id, column_index).await,
            // Room management is handled before dispatch.
            ClientRequest::JoinBoard { .. } | ClientRequest::LeaveBoard { .. } => Ok(()),
        }
    }

    async fn add_task(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        board: BoardId,
        column: ColumnId,
        title: String,
    ) -> CorkboardResult<()> {
        let user = self
            .gatekeeper
            .user(conn)
            .ok_or_else(|| CorkboardError::Unauthenticated("unknown connection".to_string()))?;
        let task = Task::new(board, title, user.username, user.id);

        self.dispatcher.broadcast_to_others(
            board,
            conn,
            ServerMessage::TaskAdded {
                task: task.clone(),
                column_id: column,
            },
        );
        self.dispatcher.ack(conn, request_id);

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "add-task", async move {
            store.insert_task_doc(&task).await?;
            store.push_task(board, column, task.id, None).await
        });
        Ok(())
    }

    async fn move_task(
        &self,
        conn: ConnectionId,
        board: BoardId,
        task_id: TaskId,
        source: Slot,
        dest: Slot,
    ) -> CorkboardResult<()> {
        let versioned = self.store.load_layout(board).await?;
        let mut layout = versioned.layout;
        layout.move_task(source.column, dest.column, dest.index, task_id);
        let view = self.resolve_view(&layout).await?;
        self.dispatcher
            .broadcast_to_others(board, conn, ServerMessage::LayoutUpdated { layout: view });

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "move-task", async move {
            store
                .move_task(board, source.column, dest.column, task_id, dest.index)
                .await
        });
        Ok(())
    }

    async fn add_list(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        board: BoardId,
        title: String,
    ) -> CorkboardResult<()> {
        let column = Column::new(title);
        self.dispatcher.broadcast_to_others(
            board,
            conn,
            ServerMessage::ListAdded {
                column: column.clone(),
            },
        );
        self.dispatcher.ack(conn, request_id);

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "add-list", async move {
            store.push_column(board, column).await
        });
        Ok(())
    }

    async fn move_list(
        &self,
        conn: ConnectionId,
        board: BoardId,
        from_index: i64,
        to_index: i64,
    ) -> CorkboardResult<()> {
        let versioned = self.store.load_layout(board).await?;
        let mut layout = versioned.layout;
        layout.move_column(from_index, to_index);
        let view = self.resolve_view(&layout).await?;
        self.dispatcher
            .broadcast_to_others(board, conn, ServerMessage::LayoutUpdated { layout: view });

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "move-list", async move {
            Self::replace_with_retry(store, board, move |layout| {
                layout.move_column(from_index, to_index)
            })
            .await
        });
        Ok(())
    }

    async fn rename_list(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        board: BoardId,
        column_index: usize,
        title: String,
    ) -> CorkboardResult<()> {
        self.dispatcher.ack(conn, request_id);
        self.dispatcher.broadcast_to_others(
            board,
            conn,
            ServerMessage::ListRenamed {
                column_index,
                title: title.clone(),
            },
        );

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "rename-list", async move {
            store.set_column_title(board, column_index, &title).await
        });
        Ok(())
    }

    async fn rename_board(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        board: BoardId,
        title: String,
    ) -> CorkboardResult<()> {
        self.dispatcher.ack(conn, request_id);
        self.dispatcher.broadcast_to_others(
            board,
            conn,
            ServerMessage::BoardRenamed {
                title: title.clone(),
            },
        );

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "rename-board", async move {
            store.set_board_title(board, &title).await
        });
        Ok(())
    }

    async fn archive_task(
        &self,
        conn: ConnectionId,
        board: BoardId,
        task_id: TaskId,
        column_id: ColumnId,
    ) -> CorkboardResult<()> {
        self.dispatcher.broadcast_to_others(
            board,
            conn,
            ServerMessage::TaskArchived { task_id, column_id },
        );

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "archive-task", async move {
            if store.archive_task(board, column_id, task_id).await? {
                store.set_tasks_archived(&[task_id], true).await?;
            }
            Ok(())
        });
        Ok(())
    }

    async fn delete_task(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        board: BoardId,
        task_id: TaskId,
    ) -> CorkboardResult<()> {
        self.dispatcher.ack(conn, request_id);
        self.dispatcher
            .broadcast_to_others(board, conn, ServerMessage::TaskDeleted { task_id });

        // Removal is scoped to exactly the named id in the archived bucket.
        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "delete-task", async move {
            store.pull_archived(board, task_id).await?;
            store.delete_task_doc(task_id).await
        });
        Ok(())
    }

    async fn archive_column(
        &self,
        conn: ConnectionId,
        board: BoardId,
        column_id: ColumnId,
    ) -> CorkboardResult<()> {
        let versioned = self.store.load_layout(board).await?;
        let mut layout = versioned.layout;
        layout.archive_all(column_id);
        let mut view = self.resolve_view(&layout).await?;
        for task in view.archived.iter_mut() {
            task.archived = true;
        }
        self.dispatcher
            .broadcast_to_others(board, conn, ServerMessage::LayoutUpdated { layout: view });

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "archive-column", async move {
            let drained = Self::replace_with_retry(Arc::clone(&store), board, move |layout| {
                layout.archive_all(column_id)
            })
            .await?;
            store.set_tasks_archived(&drained, true).await?;
            Ok(())
        });
        Ok(())
    }

    async fn delete_list(
        &self,
        conn: ConnectionId,
        board: BoardId,
        column_index: i64,
    ) -> CorkboardResult<()> {
        let versioned = self.store.load_layout(board).await?;
        let mut layout = versioned.layout;
        layout.delete_column(column_index);
        let mut view = self.resolve_view(&layout).await?;
        for task in view.archived.iter_mut() {
            task.archived = true;
        }
        self.dispatcher
            .broadcast_to_others(board, conn, ServerMessage::LayoutUpdated { layout: view });

        let store = Arc::clone(&self.store);
        self.spawn_durable(board, "delete-list", async move {
            let drained = Self::replace_with_retry(Arc::clone(&store), board, move |layout| {
                layout.delete_column(column_index)
            })
            .await?;
            store.set_tasks_archived(&drained, true).await?;
            Ok(())
        });
        Ok(())
    }

    /// Expand a computed layout's task ids into full documents for a
    /// broadcast payload.
    async fn resolve_view(&self, layout: &BoardLayout) -> CorkboardResult<BoardView> {
        let ids: Vec<TaskId> = layout
            .columns
            .iter()
            .flat_map(|c| c.tasks.iter().copied())
            .chain(layout.archived.iter().copied())
            .collect();
        let mut docs = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.store.get_task(id).await? {
                docs.insert(id, task);
            }
        }
        Ok(BoardView::resolve(layout, |id| docs.get(&id).cloned()))
    }

    /// Durable apply for replace-class mutations: recompute against a fresh
    /// read and replace under a revision check, retrying while other writers
    /// interleave.
    async fn replace_with_retry<T, F>(
        store: Arc<dyn BoardStore>,
        board: BoardId,
        mutate: F,
    ) -> CorkboardResult<T>
    where
        F: Fn(&mut BoardLayout) -> T,
    {
        for attempt in 1..=MAX_REPLACE_ATTEMPTS {
            let versioned = store.load_layout(board).await?;
            let mut layout = versioned.layout;
            let output = mutate(&mut layout);
            match store
                .replace_layout_if(board, layout, versioned.revision)
                .await
            {
                Ok(_) => return Ok(output),
                Err(CorkboardError::RevisionConflict { .. }) => {
                    tracing::debug!(%board, attempt, "layout replace conflicted, retrying against fresh read");
                }
                Err(err) => return Err(err),
            }
        }
        Err(CorkboardError::Persistence(format!(
            "layout replace for board {} still conflicted after {} attempts",
            board, MAX_REPLACE_ATTEMPTS
        )))
    }

    /// Stage two of the pipeline. Runs the durable apply off the connection
    /// event loop; on failure, logs and re-broadcasts the authoritative
    /// resolved layout to the whole room so diverged clients converge again.
    fn spawn_durable<F>(&self, board: BoardId, op: &'static str, fut: F)
    where
        F: Future<Output = CorkboardResult<()>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(err) = fut.await {
                tracing::error!(%board, op, error = %err, "durable apply failed after optimistic broadcast");
                match store.resolve_layout(board).await {
                    Ok(view) => {
                        dispatcher.broadcast_to_room(board, ServerMessage::LayoutUpdated {
                            layout: view,
                        });
                    }
                    Err(read_err) => {
                        tracing::error!(%board, error = %read_err, "could not re-read layout for reconciliation");
                    }
                }
            }
        });
    }
}
