use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::models::{ClientMessage, Reply};
use crate::api::state::AppState;
use crate::application::game_service::GameService;
use crate::domain::models::ConnectionId;

pub async fn game_socket(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state.service, socket))
}

/// Pumps one socket until either side closes. Events for the connection's
/// game come off its outbox; replies go straight back on the socket.
async fn handle_socket(service: Arc<GameService>, mut socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let mut outbox = service.connect(connection_id);

    loop {
        tokio::select! {
            Some(event) = outbox.recv() => {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%connection_id, error = %e, "event not serializable"),
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => dispatch(&service, connection_id, message).await,
                            Err(e) => Some(Reply::error(format!("invalid message: {e}"))),
                        };
                        if let Some(reply) = reply {
                            if !send_reply(&mut socket, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%connection_id, error = %e, "socket error");
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    service.disconnect(connection_id).await;
}

async fn dispatch(
    service: &GameService,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> Option<Reply> {
    match message {
        ClientMessage::JoinGame { game_id, color } => {
            let game_id = game_id.into_game_id();
            // Success is announced by the room-wide `game_joined` event.
            match service.join(&game_id, connection_id, color).await {
                Ok(_) => None,
                Err(e) => Some(Reply::error(e)),
            }
        }
        ClientMessage::GetLegalMoves { square } => {
            match service.legal_moves(connection_id, square.as_deref()).await {
                Ok(moves) => Some(Reply::legal_moves(moves)),
                Err(e) => Some(Reply::legal_moves_error(e)),
            }
        }
        ClientMessage::MakeMove { notation } => {
            match service.submit_move(connection_id, &notation).await {
                Ok(receipt) => Some(Reply::move_accepted(&receipt)),
                Err(e) => Some(Reply::move_rejected(e)),
            }
        }
        ClientMessage::Leave => {
            service.leave(connection_id).await;
            None
        }
    }
}

async fn send_reply(socket: &mut WebSocket, reply: &Reply) -> bool {
    match serde_json::to_string(reply) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(_) => true,
    }
}
