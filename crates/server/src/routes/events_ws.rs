//! WebSocket push channel for session notifications.
//!
//! A new connection resets the game, receives the current winrate, and then
//! every session event as a JSON text frame.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use katago_session::{AnalysisSession, SessionEvent};
use tokio::sync::broadcast::error::RecvError;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(session): Extension<AnalysisSession>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: AnalysisSession) {
    tracing::info!("Client connected");
    let (mut sender, mut receiver) = socket.split();

    session.reset().await;
    let mut events = session.subscribe();
    let hello = SessionEvent::WinrateUpdate {
        winrate: session.winrate().await,
    };
    if send_event(&mut sender, &hello).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "WebSocket client fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    tracing::info!("Client disconnected");
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &SessionEvent,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
