use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Point ({row}, {col}) is outside a {size}x{size} board")]
    OutOfRange { row: usize, col: usize, size: usize },

    #[error("Point ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },

    #[error("Invalid vertex: {0}")]
    InvalidVertex(String),

    #[error("Unsupported board size: {0}")]
    InvalidSize(usize),
}
