//! Colors, points and moves, plus the vertex text form the engine speaks
//! ("D4", "pass").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// Column letters; `I` is skipped.
pub const COLUMN_LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

/// Largest board the vertex notation can address.
pub const MAX_BOARD_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "W")]
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Single-letter wire form used by the engine.
    pub fn letter(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for Color {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" | "BLACK" => Ok(Color::Black),
            "W" | "WHITE" => Ok(Color::White),
            _ => Err(BoardError::InvalidVertex(s.to_string())),
        }
    }
}

/// A board coordinate. Row 0 is the bottom row ("1" in vertex form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(self, size: usize) -> bool {
        self.row < size && self.col < size
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match COLUMN_LETTERS.get(self.col) {
            Some(&letter) => write!(f, "{}{}", letter as char, self.row + 1),
            None => write!(f, "?{}", self.row + 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Pass,
    Play(Point),
}

impl Move {
    pub fn play(row: usize, col: usize) -> Self {
        Move::Play(Point::new(row, col))
    }

    /// Parse a vertex such as `"D4"`, `"q16"` or `"pass"`.
    ///
    /// Only the notation is checked here; whether the point fits the
    /// current board is up to the caller.
    pub fn parse_vertex(s: &str) -> Result<Self, BoardError> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("pass") {
            return Ok(Move::Pass);
        }

        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| BoardError::InvalidVertex(s.to_string()))?;
        let col = COLUMN_LETTERS
            .iter()
            .position(|&c| c as char == letter)
            .ok_or_else(|| BoardError::InvalidVertex(s.to_string()))?;
        let row: usize = chars
            .as_str()
            .parse()
            .map_err(|_| BoardError::InvalidVertex(s.to_string()))?;
        if row == 0 || row > MAX_BOARD_SIZE {
            return Err(BoardError::InvalidVertex(s.to_string()));
        }

        Ok(Move::play(row - 1, col))
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Move::Pass)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Pass => f.write_str("pass"),
            Move::Play(point) => point.fmt(f),
        }
    }
}

impl FromStr for Move {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::parse_vertex(s)
    }
}
