use std::env;

use katago_session::{SessionConfig, SessionError};

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, SessionError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            session: SessionConfig::from_env()?,
        })
    }
}
