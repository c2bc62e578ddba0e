//! Client-side session manager for the KataGo analysis engine.
//!
//! The engine process itself is supervised elsewhere: if it dies, the
//! session reports `SessionError::Io` / `Degraded` and stays degraded until a
//! new session is built around a fresh engine.

pub use go_core;

pub mod commentary;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod events;
pub mod interpret;
pub mod protocol;
pub mod query;
pub mod session;

pub use config::SessionConfig;
pub use engine::KataGoEngine;
pub use error::SessionError;
pub use events::SessionEvent;
pub use session::AnalysisSession;
