//! Move-intake endpoints used by the board page.

use axum::{extract::Json, http::StatusCode, Extension};
use go_core::notation::parse_move_text;
use katago_session::AnalysisSession;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;

/// Body the page posts to ask for analysis without a move.
const ANALYSIS_REQUEST: &str = "ANALYSIS_REQUEST";

/// `POST /log` with a plain-text move announcement or `ANALYSIS_REQUEST`.
pub async fn log_move(
    Extension(session): Extension<AnalysisSession>,
    body: String,
) -> Result<(StatusCode, &'static str), AppError> {
    if body.trim() == ANALYSIS_REQUEST {
        session.request_analysis_now().await?;
        return Ok((StatusCode::OK, "Analysis requested"));
    }

    let Some((color, mv)) = parse_move_text(&body) else {
        return Ok((StatusCode::OK, "No valid moves"));
    };
    session.append_move(color, mv).await?;
    Ok((StatusCode::OK, "Received"))
}

pub async fn player_status(
    Extension(session): Extension<AnalysisSession>,
    body: String,
) -> &'static str {
    session.player_status(&body);
    "Received player status"
}

pub async fn undo(Extension(session): Extension<AnalysisSession>) -> Json<Value> {
    let message = match session.undo_last().await {
        Some(_) => "Move undone successfully",
        None => "No moves to undo",
    };
    Json(json!({ "message": message }))
}

pub async fn clear_board(Extension(session): Extension<AnalysisSession>) -> Json<Value> {
    session.clear().await;
    Json(json!({ "message": "Board cleared successfully" }))
}

#[derive(Deserialize)]
pub struct BoardSizeRequest {
    pub size: usize,
}

pub async fn change_board_size(
    Extension(session): Extension<AnalysisSession>,
    Json(req): Json<BoardSizeRequest>,
) -> Result<Json<Value>, AppError> {
    session.resize(req.size).await?;
    Ok(Json(json!({
        "message": format!("Board size changed to {0}x{0}", req.size)
    })))
}

pub async fn winrate(Extension(session): Extension<AnalysisSession>) -> Json<Value> {
    Json(json!({ "winrate": session.winrate().await }))
}
