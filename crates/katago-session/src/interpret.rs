//! Turns a terminal engine response into a ranked, color-aware suggestion.
//!
//! All win probabilities stay in Black's frame. Black to move prefers the
//! highest value; White to move prefers the lowest.

use std::cmp::Ordering;

use go_core::{Color, Move};
use serde::Serialize;
use tracing::warn;

use crate::protocol::EngineResponse;
use crate::query::QuerySession;

/// How many candidates are shown.
pub const MAX_CANDIDATES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMove {
    #[serde(rename = "move", serialize_with = "serialize_move")]
    pub mv: Move,
    /// Black's win probability after this move, 0..=100
    pub black_win_pct: f64,
    pub visits: u64,
    pub score_lead: f64,
    /// Rank the engine itself assigned
    pub order: u32,
    pub is_best: bool,
}

impl RankedMove {
    /// Display form, e.g. `"D4 (62.0%) ★"`.
    pub fn label(&self) -> String {
        let mut s = format!("{} ({:.1}%)", self.mv, self.black_win_pct);
        if self.is_best {
            s.push_str(" ★");
        }
        s
    }
}

fn serialize_move<S: serde::Serializer>(mv: &Move, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(mv)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub player: Color,
    /// Root winrate for Black, 0..=100
    pub black_win_pct: f64,
    pub candidates: Vec<RankedMove>,
    #[serde(serialize_with = "serialize_move")]
    pub best_move: Move,
    /// Black's win probability after the best move, 0..=100
    pub best_win_pct: f64,
}

impl AnalysisResult {
    pub fn move_strings(&self) -> Vec<String> {
        self.candidates.iter().map(RankedMove::label).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Suggestions(AnalysisResult),
    /// The engine returned no candidate moves.
    NoSuggestion { player: Color, black_win_pct: f64 },
}

/// Interpret `response` only if it belongs to the session's current query.
///
/// Returns `None` for stale responses so nothing downstream can overwrite
/// displayed state with an old result.
pub fn interpret_current(
    session: &QuerySession,
    response: &EngineResponse,
    fallback_player: Color,
) -> Option<Interpretation> {
    if !session.is_current(&response.id) {
        return None;
    }
    Some(interpret(response, fallback_player))
}

/// Pure extraction from a terminal response.
///
/// `fallback_player` is used when the root info omits the side to move; on
/// an empty board that is Black.
pub fn interpret(response: &EngineResponse, fallback_player: Color) -> Interpretation {
    let player = response.current_player().unwrap_or(fallback_player);
    let black_win_pct = response.root_win_pct().unwrap_or(50.0);

    let mut candidates: Vec<RankedMove> = response
        .move_infos
        .iter()
        .filter_map(|info| match Move::parse_vertex(&info.mv) {
            Ok(mv) => Some(RankedMove {
                mv,
                black_win_pct: info.winrate * 100.0,
                visits: info.visits,
                score_lead: info.score_lead,
                order: info.order,
                is_best: false,
            }),
            Err(e) => {
                warn!(query_id = %response.id, error = %e, "Skipping unparseable candidate");
                None
            }
        })
        .collect();

    // First strictly better candidate wins, so ties keep response order.
    let mut best: Option<&RankedMove> = None;
    for c in &candidates {
        if best.map_or(true, |b| better(player, c.black_win_pct, b.black_win_pct)) {
            best = Some(c);
        }
    }
    let Some(best) = best.cloned() else {
        return Interpretation::NoSuggestion {
            player,
            black_win_pct,
        };
    };

    // Stable sort: equal winrates keep response order.
    candidates.sort_by(|a, b| display_order(player, a.black_win_pct, b.black_win_pct));
    candidates.truncate(MAX_CANDIDATES);
    for c in &mut candidates {
        c.is_best = c.mv == best.mv;
    }

    Interpretation::Suggestions(AnalysisResult {
        player,
        black_win_pct,
        candidates,
        best_move: best.mv,
        best_win_pct: best.black_win_pct,
    })
}

fn better(player: Color, candidate: f64, incumbent: f64) -> bool {
    match player {
        Color::Black => candidate > incumbent,
        Color::White => candidate < incumbent,
    }
}

fn display_order(player: Color, a: f64, b: f64) -> Ordering {
    match player {
        Color::Black => b.total_cmp(&a),
        Color::White => a.total_cmp(&b),
    }
}
