use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use corkboard_sync::{ClientEnvelope, Gatekeeper, RoomRegistry, ServerMessage, SyncEngine};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
    pub gatekeeper: Arc<Gatekeeper>,
    pub rooms: Arc<RoomRegistry>,
}

#[derive(Deserialize)]
pub struct WsParams {
    #[serde(default)]
    token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, state, params.token))
}

/// One task per connection: admit through the gatekeeper, pump the outbound
/// channel to the socket, feed inbound frames to the engine. In-flight
/// durable applies keep running after the socket goes away.
async fn client_session(socket: WebSocket, state: AppState, token: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    // Handshake authentication happens before any event is processed; a
    // refused connection is closed without ever reaching the engine.
    let conn = match state.gatekeeper.connect(&token, tx).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting connection");
            let _ = sink.close().await;
            return;
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to serialize server message");
                }
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEnvelope>(text.as_str())
            {
                Ok(envelope) => state.engine.handle(conn, envelope).await,
                Err(err) => {
                    tracing::debug!(conn, error = %err, "malformed client payload");
                    state.rooms.send_to(
                        conn,
                        ServerMessage::Error {
                            request_id: None,
                            reason: format!("malformed request: {}", err),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(conn, error = %err, "socket error");
                break;
            }
        }
    }

    state.gatekeeper.disconnect(conn);
    writer.abort();
}
