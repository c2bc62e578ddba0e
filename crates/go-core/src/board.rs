//! Stone grid with capture resolution.

use std::collections::HashSet;

use crate::error::BoardError;
use crate::types::{Color, Point, COLUMN_LETTERS, MAX_BOARD_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Option<Color>>,
}

impl Board {
    pub fn new(size: usize) -> Result<Self, BoardError> {
        if !(2..=MAX_BOARD_SIZE).contains(&size) {
            return Err(BoardError::InvalidSize(size));
        }
        Ok(Self {
            size,
            cells: vec![None; size * size],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, point: Point) -> Option<Color> {
        if point.in_bounds(self.size) {
            self.cells[self.index(point)]
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Every stone on the board, bottom row first.
    pub fn stones(&self) -> impl Iterator<Item = (Color, Point)> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, cell)| {
            cell.map(|color| (color, Point::new(i / self.size, i % self.size)))
        })
    }

    /// Place a stone and resolve captures.
    ///
    /// Opponent groups left without liberties are removed first, then the
    /// placed stone's own group if it has none. Returns the removed points.
    pub fn play(&mut self, color: Color, point: Point) -> Result<Vec<Point>, BoardError> {
        if !point.in_bounds(self.size) {
            return Err(BoardError::OutOfRange {
                row: point.row,
                col: point.col,
                size: self.size,
            });
        }
        if self.get(point).is_some() {
            return Err(BoardError::Occupied {
                row: point.row,
                col: point.col,
            });
        }

        let idx = self.index(point);
        self.cells[idx] = Some(color);

        let mut captured = Vec::new();
        for neighbor in self.neighbors(point) {
            if self.get(neighbor) == Some(color.opponent()) {
                let group = self.group(neighbor);
                if !self.has_liberty(&group) {
                    captured.extend(self.remove(group));
                }
            }
        }

        let own = self.group(point);
        if !self.has_liberty(&own) {
            captured.extend(self.remove(own));
        }

        Ok(captured)
    }

    /// Text diagram, top row first, for log output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in (0..self.size).rev() {
            out.push_str(&format!("{:>2} ", row + 1));
            for col in 0..self.size {
                let c = match self.get(Point::new(row, col)) {
                    Some(Color::Black) => '#',
                    Some(Color::White) => 'o',
                    None => '.',
                };
                out.push(' ');
                out.push(c);
            }
            out.push('\n');
        }
        out.push_str("   ");
        for &letter in &COLUMN_LETTERS[..self.size] {
            out.push(' ');
            out.push(letter as char);
        }
        out
    }

    fn index(&self, point: Point) -> usize {
        point.row * self.size + point.col
    }

    fn neighbors(&self, point: Point) -> Vec<Point> {
        let mut out = Vec::with_capacity(4);
        if point.row > 0 {
            out.push(Point::new(point.row - 1, point.col));
        }
        if point.row + 1 < self.size {
            out.push(Point::new(point.row + 1, point.col));
        }
        if point.col > 0 {
            out.push(Point::new(point.row, point.col - 1));
        }
        if point.col + 1 < self.size {
            out.push(Point::new(point.row, point.col + 1));
        }
        out
    }

    fn group(&self, start: Point) -> HashSet<Point> {
        let color = self.get(start);
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            for n in self.neighbors(p) {
                if self.get(n) == color && !seen.contains(&n) {
                    stack.push(n);
                }
            }
        }
        seen
    }

    fn has_liberty(&self, group: &HashSet<Point>) -> bool {
        group
            .iter()
            .any(|&p| self.neighbors(p).into_iter().any(|n| self.get(n).is_none()))
    }

    fn remove(&mut self, group: HashSet<Point>) -> Vec<Point> {
        let mut removed: Vec<Point> = group.into_iter().collect();
        removed.sort_by_key(|p| (p.row, p.col));
        for &p in &removed {
            let idx = self.index(p);
            self.cells[idx] = None;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sizes() {
        assert_eq!(Board::new(1), Err(BoardError::InvalidSize(1)));
        assert_eq!(Board::new(26), Err(BoardError::InvalidSize(26)));
        assert!(Board::new(19).is_ok());
    }

    #[test]
    fn test_single_stone_capture() {
        let mut board = Board::new(9).unwrap();
        board.play(Color::White, Point::new(4, 4)).unwrap();
        board.play(Color::Black, Point::new(3, 4)).unwrap();
        board.play(Color::Black, Point::new(5, 4)).unwrap();
        board.play(Color::Black, Point::new(4, 3)).unwrap();
        let captured = board.play(Color::Black, Point::new(4, 5)).unwrap();

        assert_eq!(captured, vec![Point::new(4, 4)]);
        assert_eq!(board.get(Point::new(4, 4)), None);
    }

    #[test]
    fn test_corner_group_capture() {
        let mut board = Board::new(9).unwrap();
        board.play(Color::White, Point::new(0, 0)).unwrap();
        board.play(Color::White, Point::new(0, 1)).unwrap();
        board.play(Color::Black, Point::new(1, 0)).unwrap();
        board.play(Color::Black, Point::new(1, 1)).unwrap();
        let captured = board.play(Color::Black, Point::new(0, 2)).unwrap();

        assert_eq!(captured.len(), 2);
        assert_eq!(board.stones().count(), 3);
    }

    #[test]
    fn test_suicide_removes_own_stone() {
        let mut board = Board::new(9).unwrap();
        board.play(Color::Black, Point::new(0, 1)).unwrap();
        board.play(Color::Black, Point::new(1, 0)).unwrap();
        let captured = board.play(Color::White, Point::new(0, 0)).unwrap();

        assert_eq!(captured, vec![Point::new(0, 0)]);
        assert_eq!(board.get(Point::new(0, 0)), None);
    }

    #[test]
    fn test_occupied_and_out_of_range() {
        let mut board = Board::new(9).unwrap();
        board.play(Color::Black, Point::new(2, 2)).unwrap();
        assert!(matches!(
            board.play(Color::White, Point::new(2, 2)),
            Err(BoardError::Occupied { .. })
        ));
        assert!(matches!(
            board.play(Color::White, Point::new(9, 0)),
            Err(BoardError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_render_marks_stones() {
        let mut board = Board::new(3).unwrap();
        board.play(Color::Black, Point::new(0, 0)).unwrap();
        board.play(Color::White, Point::new(2, 2)).unwrap();
        let text = board.render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], " 3  . . o");
        assert_eq!(lines[2], " 1  # . .");
        assert_eq!(lines[3], "    A B C");
    }
}
