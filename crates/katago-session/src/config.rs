//! Session configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SessionError;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Path to the KataGo binary
    pub katago_path: String,

    /// Analysis config passed as `-config`
    pub katago_config: String,

    /// Network weights passed as `-model`
    pub katago_model: String,

    /// Extra command-line arguments appended after the model
    pub katago_args: Vec<String>,

    pub komi: f64,

    /// Side length of a fresh board
    pub board_size: usize,

    /// Quiet period before a burst of triggers fires one analysis
    pub debounce: Duration,

    pub max_visits: Option<u32>,

    /// Seconds between in-search reports from the engine
    pub report_during_search_every: f64,

    /// Minimum change in displayed winrate (percentage points) worth announcing
    pub winrate_threshold: f64,

    /// Show in-search winrates, not only the final one
    pub dynamic_winrate: bool,

    /// Commentary is disabled when unset
    pub openai_api_key: Option<String>,

    pub openai_model: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            katago_path: "katago".to_string(),
            katago_config: "analysis_example.cfg".to_string(),
            katago_model: "model.bin.gz".to_string(),
            katago_args: Vec::new(),
            komi: 6.5,
            board_size: 9,
            debounce: Duration::from_millis(1000),
            max_visits: None,
            report_during_search_every: 1.0,
            winrate_threshold: 0.1,
            dynamic_winrate: true,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, SessionError> {
        let defaults = Self::default();

        let board_size = parsed("BOARD_SIZE", defaults.board_size)
            .ok_or(SessionError::Config("BOARD_SIZE must be an integer"))?;
        if !(2..=go_core::types::MAX_BOARD_SIZE).contains(&board_size) {
            return Err(SessionError::Config("BOARD_SIZE must be between 2 and 25"));
        }

        let max_visits = match env::var("MAX_VISITS") {
            Ok(v) => Some(
                v.parse()
                    .map_err(|_| SessionError::Config("MAX_VISITS must be an integer"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            katago_path: env::var("KATAGO_PATH").unwrap_or(defaults.katago_path),
            katago_config: env::var("KATAGO_CONFIG").unwrap_or(defaults.katago_config),
            katago_model: env::var("KATAGO_MODEL").unwrap_or(defaults.katago_model),
            katago_args: env::var("KATAGO_ARGS")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            komi: parsed("KOMI", defaults.komi).ok_or(SessionError::Config("KOMI must be a number"))?,
            board_size,
            debounce: parsed("DEBOUNCE_MS", 1000u64)
                .map(Duration::from_millis)
                .ok_or(SessionError::Config("DEBOUNCE_MS must be an integer"))?,
            max_visits,
            report_during_search_every: parsed(
                "REPORT_EVERY_SECS",
                defaults.report_during_search_every,
            )
            .ok_or(SessionError::Config("REPORT_EVERY_SECS must be a number"))?,
            winrate_threshold: parsed("WINRATE_THRESHOLD", defaults.winrate_threshold)
                .ok_or(SessionError::Config("WINRATE_THRESHOLD must be a number"))?,
            dynamic_winrate: parsed("DYNAMIC_WINRATE", defaults.dynamic_winrate)
                .ok_or(SessionError::Config("DYNAMIC_WINRATE must be true or false"))?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
        })
    }
}

/// Read and parse `key`; `None` means the value was present but unparseable.
fn parsed<T: FromStr>(key: &str, default: T) -> Option<T> {
    match env::var(key) {
        Ok(v) => v.trim().parse().ok(),
        Err(_) => Some(default),
    }
}
