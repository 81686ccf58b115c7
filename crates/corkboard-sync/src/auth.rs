use async_trait::async_trait;
use corkboard_core::{CorkboardError, CorkboardResult};
use corkboard_domain::{BoardId, UserId};
use corkboard_persistence::BoardStore;
use std::collections::HashMap;
use std::sync::Arc;

/// The identity a connection is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub id: UserId,
    pub username: String,
}

/// The authorization oracle the gatekeeper consults. Token verification and
/// membership administration happen elsewhere; the engine only asks these
/// two questions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Resolve handshake credentials to a user, or `Unauthenticated`.
    async fn authenticate(&self, token: &str) -> CorkboardResult<AuthedUser>;

    /// Is `user` a member of `board`?
    async fn is_member(&self, user: UserId, board: BoardId) -> CorkboardResult<bool>;
}

/// Oracle backed by a static token table and the store's board membership
/// roster.
pub struct RosterAuthorizer {
    tokens: HashMap<String, AuthedUser>,
    store: Arc<dyn BoardStore>,
}

impl RosterAuthorizer {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self {
            tokens: HashMap::new(),
            store,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, user: AuthedUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl Authorizer for RosterAuthorizer {
    async fn authenticate(&self, token: &str) -> CorkboardResult<AuthedUser> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| CorkboardError::Unauthenticated("unknown token".to_string()))
    }

    async fn is_member(&self, user: UserId, board: BoardId) -> CorkboardResult<bool> {
        Ok(self
            .store
            .get_board(board)
            .await?
            .map(|b| b.is_member(user))
            .unwrap_or(false))
    }
}
