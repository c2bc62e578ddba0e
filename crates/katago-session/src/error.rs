//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Failed to launch engine: {0}")]
    Launch(String),

    #[error("Engine I/O error: {0}")]
    Io(String),

    #[error("Malformed engine response: {0}")]
    Protocol(String),

    #[error("Engine unavailable; session is degraded")]
    Degraded,

    #[error("Board error: {0}")]
    Board(#[from] go_core::BoardError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
