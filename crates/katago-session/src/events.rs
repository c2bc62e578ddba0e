//! Notifications pushed to whoever is watching the session.

use go_core::Color;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::interpret::AnalysisResult;

/// Session → observer messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    WinrateUpdate {
        winrate: f64,
    },
    CandidatesReady {
        player: Color,
        move_strings: Vec<String>,
        best_move: String,
        best_win_pct: f64,
    },
    NoSuggestion {
        player: Color,
    },
    Commentary {
        text: String,
    },
    Degraded {
        reason: String,
    },
}

impl SessionEvent {
    pub fn candidates(result: &AnalysisResult) -> Self {
        SessionEvent::CandidatesReady {
            player: result.player,
            move_strings: result.move_strings(),
            best_move: result.best_move.to_string(),
            best_win_pct: result.best_win_pct,
        }
    }
}

/// Fire-and-forget fan-out of session events.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<SessionEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("No subscribers for session event");
        }
    }
}
