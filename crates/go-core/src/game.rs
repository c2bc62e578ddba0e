//! The authoritative move list and the board derived from it.

use crate::board::Board;
use crate::error::BoardError;
use crate::types::{Color, Move, Point};

/// Move list plus a cached board snapshot.
///
/// The move list is the source of truth. `board` is kept in step on append
/// and rebuilt from `initial` on undo, so replaying the list always gives the
/// same grid.
#[derive(Debug, Clone)]
pub struct GameState {
    initial: Board,
    moves: Vec<(Color, Move)>,
    board: Board,
}

impl GameState {
    pub fn new(size: usize) -> Result<Self, BoardError> {
        let initial = Board::new(size)?;
        Ok(Self {
            board: initial.clone(),
            initial,
            moves: Vec::new(),
        })
    }

    pub fn size(&self) -> usize {
        self.initial.size()
    }

    pub fn moves(&self) -> &[(Color, Move)] {
        &self.moves
    }

    /// Current position. Callers that need to keep it should clone.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Stones present before the first move.
    pub fn initial_stones(&self) -> Vec<(Color, Point)> {
        self.initial.stones().collect()
    }

    /// Side to move: the opposite of the last mover, Black on an empty list.
    pub fn to_move(&self) -> Color {
        self.moves
            .last()
            .map(|(color, _)| color.opponent())
            .unwrap_or(Color::Black)
    }

    pub fn append(&mut self, color: Color, mv: Move) -> Result<(), BoardError> {
        if let Move::Play(point) = mv {
            self.board.play(color, point)?;
        }
        self.moves.push((color, mv));
        Ok(())
    }

    /// Remove the most recent move. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<(Color, Move)> {
        let last = self.moves.pop()?;
        self.board = self.replay();
        Some(last)
    }

    pub fn clear(&mut self) {
        self.moves.clear();
        self.board = self.initial.clone();
    }

    /// Start over on an empty board of a new size.
    pub fn resize(&mut self, size: usize) -> Result<(), BoardError> {
        *self = Self::new(size)?;
        Ok(())
    }

    /// Rebuild the position from the initial board by replaying every move.
    pub fn replay(&self) -> Board {
        let mut board = self.initial.clone();
        for (color, mv) in &self.moves {
            if let Move::Play(point) = mv {
                // Every stored move was already accepted once on this same sequence.
                let _ = board.play(*color, *point);
            }
        }
        board
    }
}
