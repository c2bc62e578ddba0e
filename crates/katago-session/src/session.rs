//! Session orchestrator: owns the game, decides when to analyse, and turns
//! engine output into notifications.
//!
//! Board mutations come in through [`AnalysisSession`] methods. Each one
//! schedules analysis through the debouncer; the analysis itself runs on its
//! own task so new moves are accepted while the engine is searching. All
//! shared state sits behind one lock, and only the current query's responses
//! ever reach it.

use std::sync::Arc;

use go_core::{Board, Color, GameState, Move};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::commentary::{position_context, CommentaryClient, FALLBACK_TEXT};
use crate::config::SessionConfig;
use crate::debounce::Debouncer;
use crate::engine::{KataGoEngine, QueryEvent};
use crate::error::SessionError;
use crate::events::{Notifier, SessionEvent};
use crate::interpret::{interpret_current, AnalysisResult, Interpretation};
use crate::protocol::{AnalysisRequest, EngineResponse};
use crate::query::{Disposition, QuerySession};

/// Winrate shown before any analysis has finished.
pub const EVEN_WINRATE: f64 = 50.0;

const EVENT_CAPACITY: usize = 256;

struct SessionState {
    game: GameState,
    komi: f64,
    query: QuerySession,
    displayed_winrate: f64,
    last_result: Option<AnalysisResult>,
    degraded: bool,
}

struct Shared {
    config: SessionConfig,
    engine: Arc<KataGoEngine>,
    state: Mutex<SessionState>,
    debouncer: Debouncer,
    notifier: Notifier,
    commentary: Option<Arc<CommentaryClient>>,
}

#[derive(Clone)]
pub struct AnalysisSession {
    shared: Arc<Shared>,
}

impl AnalysisSession {
    pub fn new(config: SessionConfig, engine: KataGoEngine) -> Result<Self, SessionError> {
        let state = SessionState {
            game: GameState::new(config.board_size)?,
            komi: config.komi,
            query: QuerySession::new(),
            displayed_winrate: EVEN_WINRATE,
            last_result: None,
            degraded: false,
        };
        let commentary = CommentaryClient::from_config(&config).map(Arc::new);
        if commentary.is_none() {
            info!("No OpenAI key configured - move commentary disabled");
        }

        Ok(Self {
            shared: Arc::new(Shared {
                debouncer: Debouncer::new(config.debounce),
                config,
                engine: Arc::new(engine),
                state: Mutex::new(state),
                notifier: Notifier::new(EVENT_CAPACITY),
                commentary,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.notifier.subscribe()
    }

    pub async fn winrate(&self) -> f64 {
        self.shared.state.lock().await.displayed_winrate
    }

    /// Copy of the current position.
    pub async fn board(&self) -> Board {
        self.shared.state.lock().await.game.board().clone()
    }

    pub async fn moves(&self) -> Vec<(Color, Move)> {
        self.shared.state.lock().await.game.moves().to_vec()
    }

    pub async fn last_result(&self) -> Option<AnalysisResult> {
        self.shared.state.lock().await.last_result.clone()
    }

    pub async fn is_degraded(&self) -> bool {
        self.shared.state.lock().await.degraded
    }

    pub async fn append_move(&self, color: Color, mv: Move) -> Result<(), SessionError> {
        {
            let mut state = self.shared.state.lock().await;
            state.game.append(color, mv)?;
            info!(color = %color, mv = %mv, total = state.game.moves().len(), "Move received");
            debug!("\n{}", state.game.board().render());
        }
        self.schedule_analysis().await;
        Ok(())
    }

    /// Take back the last move. Returns it, or `None` if there was nothing to undo.
    pub async fn undo_last(&self) -> Option<(Color, Move)> {
        let undone = {
            let mut state = self.shared.state.lock().await;
            let undone = state.game.undo();
            match undone {
                Some((color, mv)) => {
                    info!(color = %color, mv = %mv, "Undoing move");
                    debug!("\n{}", state.game.board().render());
                }
                None => info!("Undo requested, but no moves to undo"),
            }
            undone
        };
        if undone.is_some() {
            self.schedule_analysis().await;
        }
        undone
    }

    /// Start a fresh game on a board of `size`.
    pub async fn resize(&self, size: usize) -> Result<(), SessionError> {
        {
            let mut state = self.shared.state.lock().await;
            state.game.resize(size)?;
            self.shared.forget_position(&mut state).await;
            info!(size, "Board resized");
        }
        self.schedule_analysis().await;
        Ok(())
    }

    pub async fn clear(&self) {
        {
            let mut state = self.shared.state.lock().await;
            state.game.clear();
            self.shared.forget_position(&mut state).await;
            info!("Board cleared");
        }
        self.schedule_analysis().await;
    }

    /// Back to a fresh game with configured komi and nothing scheduled.
    pub async fn reset(&self) {
        self.shared.debouncer.cancel_pending().await;
        let mut state = self.shared.state.lock().await;
        state.game.clear();
        state.komi = self.shared.config.komi;
        self.shared.forget_position(&mut state).await;
        info!("Game state has been reset");
    }

    /// Analyse the current position after the usual quiet period.
    pub async fn request_analysis_now(&self) -> Result<(), SessionError> {
        if self.is_degraded().await {
            return Err(SessionError::Degraded);
        }
        info!("Analysis requested");
        self.schedule_analysis().await;
        Ok(())
    }

    /// Close the engine's input. In-flight work is abandoned.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.shared.debouncer.cancel_pending().await;
        self.shared.engine.close().await
    }

    /// Player setup announcements are only logged.
    pub fn player_status(&self, status: &str) {
        info!(status = status.trim(), "Player status update");
    }

    async fn schedule_analysis(&self) {
        let debouncer = &self.shared.debouncer;
        debouncer.cancel_pending().await;
        let shared = self.shared.clone();
        debouncer
            .trigger(async move {
                if let Err(e) = run_analysis(shared).await {
                    warn!(error = %e, "Analysis did not complete");
                }
            })
            .await;
    }
}

impl Shared {
    /// Drop the current query and the displayed result after the position
    /// was replaced wholesale.
    async fn forget_position(&self, state: &mut SessionState) {
        if let Some(old) = state.query.reset() {
            if let Err(e) = self.engine.terminate(old).await {
                warn!(query_id = %old, error = %e, "Failed to terminate query");
            }
        }
        state.last_result = None;
        state.displayed_winrate = EVEN_WINRATE;
        self.notifier.emit(SessionEvent::WinrateUpdate {
            winrate: EVEN_WINRATE,
        });
    }

    fn mark_degraded(&self, state: &mut SessionState, reason: &SessionError) {
        state.degraded = true;
        error!(error = %reason, "Engine unavailable, session degraded");
        self.notifier.emit(SessionEvent::Degraded {
            reason: reason.to_string(),
        });
    }

    fn publish_winrate(&self, state: &mut SessionState, winrate: f64) {
        let previous = state.displayed_winrate;
        state.displayed_winrate = winrate;
        if (winrate - previous).abs() > self.config.winrate_threshold {
            self.notifier.emit(SessionEvent::WinrateUpdate { winrate });
        }
    }

    async fn on_update(&self, response: &EngineResponse) {
        let mut state = self.state.lock().await;
        if state.query.accept(response) != Disposition::Update {
            debug!(query_id = %response.id, "Ignoring outdated update");
            return;
        }
        if !self.config.dynamic_winrate {
            return;
        }
        if let Some(winrate) = response.root_win_pct() {
            debug!(query_id = %response.id, winrate, "In-search winrate");
            self.publish_winrate(&mut state, winrate);
        }
    }

    /// `to_move` is the side to move in the position the query was built
    /// from, used when the engine leaves it out.
    async fn on_final(&self, response: &EngineResponse, to_move: Color) {
        let mut state = self.state.lock().await;
        let Some(interpretation) = interpret_current(&state.query, response, to_move) else {
            debug!(query_id = %response.id, "Ignoring outdated result");
            return;
        };
        state.query.accept(response);

        if let Some(winrate) = response.root_win_pct() {
            info!(query_id = %response.id, winrate, "Final winrate");
            self.publish_winrate(&mut state, winrate);
        }

        match interpretation {
            Interpretation::Suggestions(result) => {
                info!(
                    player = %result.player,
                    top_moves = ?result.move_strings(),
                    best_move = %result.best_move,
                    best_win_pct = result.best_win_pct,
                    "Analysis complete"
                );
                self.notifier.emit(SessionEvent::candidates(&result));
                self.spawn_commentary(&state, &result);
                state.last_result = Some(result);
            }
            Interpretation::NoSuggestion { player, .. } => {
                info!(player = %player, "Engine has no suggestions");
                state.last_result = None;
                self.notifier.emit(SessionEvent::NoSuggestion { player });
            }
        }
    }

    fn spawn_commentary(&self, state: &SessionState, result: &AnalysisResult) {
        let Some(client) = self.commentary.clone() else {
            return;
        };
        let moves: Vec<String> = state
            .game
            .moves()
            .iter()
            .map(|(color, mv)| format!("{color} {mv}"))
            .collect();
        let context = position_context(state.game.size(), &moves);
        let best_move = result.best_move.to_string();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            let text = match client.comment(&best_move, &context).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Commentary request failed");
                    FALLBACK_TEXT.to_string()
                }
            };
            notifier.emit(SessionEvent::Commentary { text });
        });
    }
}

/// Issue one query for the current position and follow it to completion.
async fn run_analysis(shared: Arc<Shared>) -> Result<(), SessionError> {
    let (mut pending, to_move) = {
        let mut state = shared.state.lock().await;
        if state.degraded || !shared.engine.is_alive() {
            let err = SessionError::Degraded;
            shared.mark_degraded(&mut state, &err);
            return Err(err);
        }

        // An empty board is still analysed, with Black to move.
        if state.game.moves().is_empty() {
            state.displayed_winrate = EVEN_WINRATE;
            shared.notifier.emit(SessionEvent::WinrateUpdate {
                winrate: EVEN_WINRATE,
            });
        }

        let id = shared.engine.next_query_id();
        if let Some(old) = state.query.begin_query(id) {
            if let Err(e) = shared.engine.terminate(old).await {
                warn!(query_id = %old, error = %e, "Failed to terminate superseded query");
            }
        }

        let request = AnalysisRequest::for_position(
            id,
            &state.game,
            state.komi,
            shared.config.max_visits,
            shared.config.report_during_search_every,
        );
        let to_move = state.game.to_move();
        info!(query_id = %id, moves = state.game.moves().len(), "Starting analysis");

        match shared.engine.analyze(id, &request).await {
            Ok(pending) => (pending, to_move),
            Err(e) => {
                state.query.reset();
                shared.mark_degraded(&mut state, &e);
                return Err(e);
            }
        }
    };

    loop {
        match pending.next_event().await {
            Ok(QueryEvent::Update(response)) => shared.on_update(&response).await,
            Ok(QueryEvent::Final(response)) => {
                shared.on_final(&response, to_move).await;
                return Ok(());
            }
            Err(e) => {
                let mut state = shared.state.lock().await;
                if state.query.current() != Some(pending.id) {
                    debug!(query_id = %pending.id, "Query superseded");
                    return Ok(());
                }
                state.query.reset();
                shared.mark_degraded(&mut state, &e);
                return Err(e);
            }
        }
    }
}
