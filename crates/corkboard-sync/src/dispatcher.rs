use crate::protocol::ServerMessage;
use crate::room::{ConnectionId, RoomRegistry};
use corkboard_domain::BoardId;
use std::sync::Arc;

/// Delivery side of the engine: room-scoped fan-out for computed deltas and
/// connection-scoped acks/errors.
#[derive(Clone)]
pub struct Dispatcher {
    rooms: Arc<RoomRegistry>,
}

impl Dispatcher {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }

    /// Optimistic broadcast to everyone else in the board's room.
    pub fn broadcast_to_others(
        &self,
        board: BoardId,
        origin: ConnectionId,
        message: ServerMessage,
    ) -> usize {
        let delivered = self.rooms.broadcast_to_others(board, origin, &message);
        tracing::debug!(%board, origin, delivered, "broadcast to room");
        delivered
    }

    /// Reconciliation broadcast to the whole room, origin included.
    pub fn broadcast_to_room(&self, board: BoardId, message: ServerMessage) -> usize {
        let delivered = self.rooms.broadcast_to_room(board, &message);
        tracing::debug!(%board, delivered, "broadcast to full room");
        delivered
    }

    /// "Accepted for processing" back to the requester.
    pub fn ack(&self, conn: ConnectionId, request_id: Option<u64>) {
        self.rooms.send_to(conn, ServerMessage::Ack { request_id });
    }

    /// Request-local failure; only the requester learns of it.
    pub fn error(&self, conn: ConnectionId, request_id: Option<u64>, reason: impl Into<String>) {
        self.rooms.send_to(
            conn,
            ServerMessage::Error {
                request_id,
                reason: reason.into(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[test]
    fn test_ack_reaches_only_origin() {
        let rooms = Arc::new(RoomRegistry::new());
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        rooms.register(1, tx1);
        rooms.register(2, tx2);
        let board = Uuid::new_v4();
        rooms.join(1, board);
        rooms.join(2, board);

        let dispatcher = Dispatcher::new(rooms);
        dispatcher.ack(1, Some(3));

        assert!(matches!(
            rx1.try_recv(),
            Ok(ServerMessage::Ack { request_id: Some(3) })
        ));
        assert!(rx2.try_recv().is_err());
    }
}
