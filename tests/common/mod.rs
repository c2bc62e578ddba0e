use std::time::Duration;

use katago_session::{AnalysisSession, KataGoEngine, SessionConfig, SessionEvent};
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::broadcast;
use tokio::time::timeout;

/// How long a test waits before deciding nothing more is coming.
pub const QUIET: Duration = Duration::from_secs(5);

/// The engine end of an in-memory pipe pair.
pub struct FakeEngine {
    requests: Lines<BufReader<DuplexStream>>,
    responses: DuplexStream,
}

impl FakeEngine {
    pub async fn next_request(&mut self) -> Value {
        self.try_next_request()
            .await
            .expect("expected a request from the session")
    }

    /// Next request line, or `None` if nothing arrives within `QUIET`.
    pub async fn try_next_request(&mut self) -> Option<Value> {
        match timeout(QUIET, self.requests.next_line()).await {
            Ok(Ok(Some(line))) => Some(serde_json::from_str(&line).expect("request is JSON")),
            _ => None,
        }
    }

    pub async fn send(&mut self, response: Value) {
        let mut line = response.to_string();
        line.push('\n');
        self.responses.write_all(line.as_bytes()).await.unwrap();
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        debounce: Duration::from_secs(1),
        ..SessionConfig::default()
    }
}

/// Session wired to a fake engine, with an event subscription taken up front.
pub fn session() -> (AnalysisSession, FakeEngine, broadcast::Receiver<SessionEvent>) {
    session_with(test_config())
}

pub fn session_with(
    config: SessionConfig,
) -> (AnalysisSession, FakeEngine, broadcast::Receiver<SessionEvent>) {
    let (engine_in, fake_requests) = duplex(64 * 1024);
    let (fake_responses, engine_out) = duplex(64 * 1024);
    let engine = KataGoEngine::from_io(engine_in, engine_out);
    let session = AnalysisSession::new(config, engine).unwrap();
    let events = session.subscribe();
    let fake = FakeEngine {
        requests: BufReader::new(fake_requests).lines(),
        responses: fake_responses,
    };
    (session, fake, events)
}

pub fn in_search(id: &Value, winrate: f64) -> Value {
    json!({
        "id": id,
        "isDuringSearch": true,
        "rootInfo": {"winrate": winrate}
    })
}

pub fn terminal(id: &Value, player: &str, winrate: f64, moves: &[(&str, f64)]) -> Value {
    let move_infos: Vec<Value> = moves
        .iter()
        .enumerate()
        .map(|(order, (mv, wr))| {
            json!({"move": mv, "winrate": wr, "visits": 100 - order, "scoreLead": 0.5, "order": order})
        })
        .collect();
    json!({
        "id": id,
        "isDuringSearch": false,
        "rootInfo": {"winrate": winrate, "currentPlayer": player},
        "moveInfos": move_infos
    })
}

pub async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(QUIET, events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Everything already queued, without waiting.
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
