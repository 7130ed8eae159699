use axum::{
    Extension, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use db::models::user::User;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// WebSocket feed of outbox events; clients re-fetch whatever the event
/// names instead of diffing payloads. Each event is checked against the
/// subscriber's access before it is sent, so a session only ever sees
/// activity on boards and projects it could open itself.
pub async fn stream_events_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_events_ws(socket, state, user).await {
            tracing::warn!("events WS closed: {}", e);
        }
    })
}

async fn handle_events_ws(socket: WebSocket, state: AppState, user: User) -> anyhow::Result<()> {
    let mut events = state.subscribe_events();
    let (mut sender, mut receiver) = socket.split();

    // Drain (and ignore) any client->server messages so pings/pongs work
    tokio::spawn(async move { while let Some(Ok(_)) = receiver.next().await {} });

    loop {
        match events.recv().await {
            Ok(event) => {
                match event.visible_to(&state.db().pool, user.id).await {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        tracing::warn!("event visibility check failed: {err}");
                        continue;
                    }
                }
                let text = serde_json::to_string(&event)?;
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break; // client disconnected
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("event subscriber lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
    let _ = sender.close().await;
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events/ws", get(stream_events_ws))
}
