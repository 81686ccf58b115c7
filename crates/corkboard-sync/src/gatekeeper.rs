use crate::auth::{AuthedUser, Authorizer};
use crate::protocol::ServerMessage;
use crate::room::{ConnectionId, RoomRegistry};
use corkboard_core::{CorkboardError, CorkboardResult};
use corkboard_domain::BoardId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Admits connections and guards room membership. A connection that fails
/// handshake authentication is never registered, so no event from it can
/// reach a handler; `join_board` re-checks board membership through the
/// oracle and refuses without touching room state.
pub struct Gatekeeper {
    authorizer: Arc<dyn Authorizer>,
    rooms: Arc<RoomRegistry>,
    connections: RwLock<HashMap<ConnectionId, AuthedUser>>,
    next_connection_id: AtomicU64,
}

impl Gatekeeper {
    pub fn new(authorizer: Arc<dyn Authorizer>, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            authorizer,
            rooms,
            connections: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Authenticate the handshake and register the connection's outbound
    /// channel. On `Unauthenticated` the caller must close the transport.
    pub async fn connect(
        &self,
        token: &str,
        sender: UnboundedSender<ServerMessage>,
    ) -> CorkboardResult<ConnectionId> {
        let user = self.authorizer.authenticate(token).await?;
        let conn = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.rooms.register(conn, sender);
        tracing::info!(conn, user = %user.username, "connection admitted");
        self.connections.write().insert(conn, user);
        Ok(conn)
    }

    /// Idempotent teardown: leaves any joined room and forgets the
    /// connection.
    pub fn disconnect(&self, conn: ConnectionId) {
        self.rooms.unregister(conn);
        if self.connections.write().remove(&conn).is_some() {
            tracing::info!(conn, "connection closed");
        }
    }

    pub fn user(&self, conn: ConnectionId) -> Option<AuthedUser> {
        self.connections.read().get(&conn).cloned()
    }

    pub fn joined_board(&self, conn: ConnectionId) -> Option<BoardId> {
        self.rooms.joined_board(conn)
    }

    pub async fn join_board(&self, conn: ConnectionId, board: BoardId) -> CorkboardResult<()> {
        let user = self
            .user(conn)
            .ok_or_else(|| CorkboardError::Unauthenticated("unknown connection".to_string()))?;
        if !self.authorizer.is_member(user.id, board).await? {
            return Err(CorkboardError::NotAMember {
                user: user.id,
                board,
            });
        }
        self.rooms.join(conn, board);
        tracing::info!(conn, %board, user = %user.username, "joined board room");
        Ok(())
    }

    pub fn leave_board(&self, conn: ConnectionId, board: BoardId) {
        self.rooms.leave(conn, board);
        tracing::debug!(conn, %board, "left board room");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthorizer;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn sender() -> UnboundedSender<ServerMessage> {
        mpsc::unbounded_channel().0
    }

    fn alice() -> AuthedUser {
        AuthedUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_before_registration() {
        let mut oracle = MockAuthorizer::new();
        oracle
            .expect_authenticate()
            .returning(|_| Err(CorkboardError::Unauthenticated("bad token".to_string())));
        let rooms = Arc::new(RoomRegistry::new());
        let gatekeeper = Gatekeeper::new(Arc::new(oracle), rooms);

        let err = gatekeeper.connect("bogus", sender()).await.unwrap_err();
        assert!(matches!(err, CorkboardError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_join_refused_for_non_member_changes_no_room_state() {
        let user = alice();
        let mut oracle = MockAuthorizer::new();
        let authed = user.clone();
        oracle
            .expect_authenticate()
            .returning(move |_| Ok(authed.clone()));
        oracle.expect_is_member().returning(|_, _| Ok(false));

        let rooms = Arc::new(RoomRegistry::new());
        let gatekeeper = Gatekeeper::new(Arc::new(oracle), Arc::clone(&rooms));
        let conn = gatekeeper.connect("token", sender()).await.unwrap();

        let board = Uuid::new_v4();
        let err = gatekeeper.join_board(conn, board).await.unwrap_err();
        assert!(matches!(err, CorkboardError::NotAMember { .. }));
        assert_eq!(gatekeeper.joined_board(conn), None);
        assert_eq!(rooms.room_size(board), 0);
    }

    #[tokio::test]
    async fn test_member_join_enters_room() {
        let user = alice();
        let mut oracle = MockAuthorizer::new();
        let authed = user.clone();
        oracle
            .expect_authenticate()
            .returning(move |_| Ok(authed.clone()));
        oracle.expect_is_member().returning(|_, _| Ok(true));

        let rooms = Arc::new(RoomRegistry::new());
        let gatekeeper = Gatekeeper::new(Arc::new(oracle), Arc::clone(&rooms));
        let conn = gatekeeper.connect("token", sender()).await.unwrap();

        let board = Uuid::new_v4();
        gatekeeper.join_board(conn, board).await.unwrap();
        assert_eq!(gatekeeper.joined_board(conn), Some(board));
        assert_eq!(rooms.room_size(board), 1);

        gatekeeper.disconnect(conn);
        assert_eq!(rooms.room_size(board), 0);
        assert!(gatekeeper.user(conn).is_none());
    }
}
