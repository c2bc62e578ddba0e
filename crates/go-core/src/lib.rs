pub mod board;
pub mod error;
pub mod game;
pub mod notation;
pub mod types;

pub use board::Board;
pub use error::BoardError;
pub use game::GameState;
pub use types::{Color, Move, Point};
