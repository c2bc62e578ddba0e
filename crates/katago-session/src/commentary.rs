//! Short natural-language commentary on the engine's chosen move,
//! fetched from the OpenAI chat completions API.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::config::SessionConfig;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Sent to observers when the commentary request fails.
pub const FALLBACK_TEXT: &str = "Error: Unable to fetch analysis.";

pub struct CommentaryClient {
    client: Client,
    api_key: String,
    model: String,
}

impl CommentaryClient {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &SessionConfig) -> Option<Self> {
        let api_key = config.openai_api_key.clone()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .ok()?;
        Some(Self {
            client,
            api_key,
            model: config.openai_model.clone(),
        })
    }

    /// Ask for a brief explanation of `best_move` in `context`.
    pub async fn comment(&self, best_move: &str, context: &str) -> Result<String, String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a Go analyst."},
                {"role": "user", "content": prompt(best_move, context)}
            ],
            "temperature": 0.7,
            "max_tokens": 1000,
        });

        let resp = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request error: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| format!("Body read error: {e}"))?;
        extract_content(&data).ok_or_else(|| "Response has no message content".to_string())
    }
}

pub fn prompt(best_move: &str, context: &str) -> String {
    format!(
        "Given the best move {best_move} in the context of {context}, analyze this move and \
         provide an explanation including strategic insights, potential risks, and long-term \
         implications for the game, less than 50 words."
    )
}

/// Position summary handed to the commentator alongside the move.
pub fn position_context(board_size: usize, moves: &[String]) -> String {
    format!("board size = {board_size}, all moves: [{}]", moves.join(", "))
}

fn extract_content(data: &Value) -> Option<String> {
    data.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.trim().to_string())
}
