pub mod board;
pub mod events_ws;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use katago_session::AnalysisSession;
use tower_http::cors::{Any, CorsLayer};

pub fn router(session: AnalysisSession) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Move intake
        .route("/log", post(board::log_move))
        .route("/player_status", post(board::player_status))
        .route("/undo", post(board::undo))
        .route("/clear_board", post(board::clear_board))
        .route("/board_size", post(board::change_board_size))
        // Display state
        .route("/winrate", get(board::winrate))
        .route("/ws", get(events_ws::ws_handler))
        .layer(Extension(session))
        .layer(cors)
}
