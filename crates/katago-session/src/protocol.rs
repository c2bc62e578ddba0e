//! Wire types for the KataGo analysis engine's JSON-lines protocol.

use go_core::{Color, GameState, Move};
use serde::{Deserialize, Serialize};

use crate::query::QueryId;

/// One analysis request, serialized as a single line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: String,
    pub moves: Vec<[String; 2]>,
    pub initial_stones: Vec<[String; 2]>,
    pub rules: String,
    pub komi: f64,
    pub board_x_size: usize,
    pub board_y_size: usize,
    pub include_policy: bool,
    pub analyze_turns: Vec<usize>,
    pub report_during_search_every: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_visits: Option<u32>,
}

impl AnalysisRequest {
    /// Build a request for the final position of `game`.
    pub fn for_position(
        id: QueryId,
        game: &GameState,
        komi: f64,
        max_visits: Option<u32>,
        report_during_search_every: f64,
    ) -> Self {
        let moves: Vec<[String; 2]> = game
            .moves()
            .iter()
            .map(|(color, mv)| wire_move(*color, *mv))
            .collect();
        let initial_stones = game
            .initial_stones()
            .into_iter()
            .map(|(color, point)| wire_move(color, Move::Play(point)))
            .collect();

        Self {
            id: id.to_string(),
            analyze_turns: vec![moves.len()],
            moves,
            initial_stones,
            rules: "Chinese".to_string(),
            komi,
            board_x_size: game.size(),
            board_y_size: game.size(),
            include_policy: true,
            report_during_search_every,
            max_visits,
        }
    }
}

fn wire_move(color: Color, mv: Move) -> [String; 2] {
    [color.letter().to_string(), mv.to_string()]
}

/// Asks the engine to stop work on an earlier query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateRequest {
    pub id: String,
    pub action: &'static str,
    pub terminate_id: String,
}

impl TerminateRequest {
    pub fn new(id: String, terminate_id: String) -> Self {
        Self {
            id,
            action: "terminate",
            terminate_id,
        }
    }
}

/// One response line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub is_during_search: bool,
    pub root_info: Option<RootInfo>,
    #[serde(default)]
    pub move_infos: Vec<MoveInfo>,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl EngineResponse {
    /// Terminal lines end a query; in-search lines and bare warnings do not.
    pub fn is_final(&self) -> bool {
        !self.is_during_search && !self.is_warning_only()
    }

    /// A warning about the request that carries no analysis of its own.
    pub fn is_warning_only(&self) -> bool {
        self.warning.is_some()
            && self.error.is_none()
            && self.root_info.is_none()
            && self.move_infos.is_empty()
    }

    /// Root winrate for Black, as a percentage.
    pub fn root_win_pct(&self) -> Option<f64> {
        self.root_info.as_ref().map(|r| r.winrate * 100.0)
    }

    pub fn current_player(&self) -> Option<Color> {
        self.root_info.as_ref().and_then(|r| r.current_player)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    #[serde(default = "even_winrate")]
    pub winrate: f64,
    pub current_player: Option<Color>,
}

fn even_winrate() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInfo {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default)]
    pub winrate: f64,
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub score_lead: f64,
    #[serde(default = "unranked")]
    pub order: u32,
}

fn unranked() -> u32 {
    999
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let mut game = GameState::new(9).unwrap();
        game.append(Color::Black, Move::play(3, 3)).unwrap();
        game.append(Color::White, Move::Pass).unwrap();

        let request = AnalysisRequest::for_position(QueryId::new(4), &game, 6.5, None, 1.0);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "4",
                "moves": [["B", "D4"], ["W", "pass"]],
                "initialStones": [],
                "rules": "Chinese",
                "komi": 6.5,
                "boardXSize": 9,
                "boardYSize": 9,
                "includePolicy": true,
                "analyzeTurns": [2],
                "reportDuringSearchEvery": 1.0
            })
        );
    }

    #[test]
    fn test_max_visits_included_when_set() {
        let game = GameState::new(19).unwrap();
        let request = AnalysisRequest::for_position(QueryId::new(0), &game, 7.5, Some(200), 0.5);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["maxVisits"], 200);
        assert_eq!(value["analyzeTurns"], json!([0]));
    }

    #[test]
    fn test_terminate_shape() {
        let request = TerminateRequest::new("TERM 0".into(), "3".into());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"id": "TERM 0", "action": "terminate", "terminateId": "3"})
        );
    }

    #[test]
    fn test_parse_final_response() {
        let line = r#"{"id":"2","isDuringSearch":false,"rootInfo":{"winrate":0.48,"currentPlayer":"W","visits":500},
            "moveInfos":[{"move":"C3","winrate":0.41,"visits":200,"scoreLead":-1.5,"order":0,"pv":["C3","G7"]}],"turnNumber":3}"#;
        let response: EngineResponse = serde_json::from_str(line).unwrap();

        assert!(response.is_final());
        assert_eq!(response.current_player(), Some(Color::White));
        assert_eq!(response.move_infos.len(), 1);
        assert_eq!(response.move_infos[0].mv, "C3");
        assert_eq!(response.move_infos[0].order, 0);
    }

    #[test]
    fn test_parse_sparse_response() {
        let response: EngineResponse =
            serde_json::from_str(r#"{"id":"7","isDuringSearch":true,"rootInfo":{}}"#).unwrap();
        assert!(!response.is_final());
        assert_eq!(response.root_win_pct(), Some(50.0));
        assert!(response.move_infos.is_empty());
    }

    #[test]
    fn test_warning_line_is_not_final() {
        let response: EngineResponse =
            serde_json::from_str(r#"{"id":"4","field":"foo","warning":"unknown field"}"#).unwrap();
        assert!(response.is_warning_only());
        assert!(!response.is_final());

        let response: EngineResponse =
            serde_json::from_str(r#"{"id":"4","error":"bad request","warning":"unknown field"}"#)
                .unwrap();
        assert!(!response.is_warning_only());
        assert!(response.is_final());
    }
}
