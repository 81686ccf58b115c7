pub mod auth;
pub mod dispatcher;
pub mod engine;
pub mod gatekeeper;
pub mod protocol;
pub mod room;

pub use auth::{AuthedUser, Authorizer, RosterAuthorizer};
pub use dispatcher::Dispatcher;
pub use engine::SyncEngine;
pub use gatekeeper::Gatekeeper;
pub use protocol::{ClientEnvelope, ClientRequest, ServerMessage, Slot};
pub use room::{ConnectionId, RoomRegistry};
