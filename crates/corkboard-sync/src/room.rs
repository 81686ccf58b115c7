use crate::protocol::ServerMessage;
use corkboard_domain::BoardId;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

pub type ConnectionId = u64;

#[derive(Default)]
struct Rooms {
    /// Outbound channel for every admitted connection, roomed or not.
    senders: HashMap<ConnectionId, UnboundedSender<ServerMessage>>,
    /// Broadcast group per board.
    rooms: HashMap<BoardId, Vec<ConnectionId>>,
    /// Which room a connection currently sits in. One board at a time.
    joined: HashMap<ConnectionId, BoardId>,
}

/// Owned registry of board rooms and connection channels. Join and leave are
/// the only mutators of room membership; the lock is never held across an
/// await (sends go through unbounded channels and cannot block).
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<Rooms>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: ConnectionId, sender: UnboundedSender<ServerMessage>) {
        self.inner.write().senders.insert(conn, sender);
    }

    /// Remove a connection from its room (if any) and drop its channel.
    pub fn unregister(&self, conn: ConnectionId) {
        let mut rooms = self.inner.write();
        Self::detach(&mut rooms, conn);
        rooms.senders.remove(&conn);
    }

    /// Put the connection in the board's room. Joining while in another room
    /// leaves that room implicitly; joining the current room is a no-op.
    pub fn join(&self, conn: ConnectionId, board: BoardId) {
        let mut rooms = self.inner.write();
        if rooms.joined.get(&conn) == Some(&board) {
            return;
        }
        Self::detach(&mut rooms, conn);
        rooms.rooms.entry(board).or_default().push(conn);
        rooms.joined.insert(conn, board);
    }

    /// Idempotent removal from the named board's room.
    pub fn leave(&self, conn: ConnectionId, board: BoardId) {
        let mut rooms = self.inner.write();
        if rooms.joined.get(&conn) == Some(&board) {
            Self::detach(&mut rooms, conn);
        }
    }

    pub fn joined_board(&self, conn: ConnectionId) -> Option<BoardId> {
        self.inner.read().joined.get(&conn).copied()
    }

    pub fn room_size(&self, board: BoardId) -> usize {
        self.inner
            .read()
            .rooms
            .get(&board)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Send to one connection. False when the connection is gone.
    pub fn send_to(&self, conn: ConnectionId, message: ServerMessage) -> bool {
        let rooms = self.inner.read();
        match rooms.senders.get(&conn) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Deliver to every member of the board's room except `origin`. Dead
    /// receivers are pruned. Returns how many connections received it.
    pub fn broadcast_to_others(
        &self,
        board: BoardId,
        origin: ConnectionId,
        message: &ServerMessage,
    ) -> usize {
        self.broadcast_filtered(board, Some(origin), message)
    }

    /// Deliver to every member of the board's room, origin included.
    pub fn broadcast_to_room(&self, board: BoardId, message: &ServerMessage) -> usize {
        self.broadcast_filtered(board, None, message)
    }

    fn broadcast_filtered(
        &self,
        board: BoardId,
        skip: Option<ConnectionId>,
        message: &ServerMessage,
    ) -> usize {
        let mut rooms = self.inner.write();
        let members = match rooms.rooms.get(&board) {
            Some(members) => members.clone(),
            None => return 0,
        };
        let mut delivered = 0;
        let mut dead = Vec::new();
        for conn in members {
            if Some(conn) == skip {
                continue;
            }
            match rooms.senders.get(&conn) {
                Some(sender) if sender.send(message.clone()).is_ok() => delivered += 1,
                _ => dead.push(conn),
            }
        }
        for conn in dead {
            Self::detach(&mut rooms, conn);
            rooms.senders.remove(&conn);
        }
        delivered
    }

    fn detach(rooms: &mut Rooms, conn: ConnectionId) {
        if let Some(board) = rooms.joined.remove(&conn) {
            if let Some(members) = rooms.rooms.get_mut(&board) {
                members.retain(|c| *c != conn);
                if members.is_empty() {
                    rooms.rooms.remove(&board);
                }
            }
        }
    }
}
