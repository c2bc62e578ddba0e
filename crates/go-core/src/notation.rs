//! Parsing of the move announcements the board front end posts,
//! e.g. `"BLACK played D4"` or `"WHITE passed"`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Color, Move};

static PLAYED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(black|white)\s+\S+\s+([A-Z]\d{1,2})\b").unwrap());

static PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(black|white)\b.*\bpassed\b").unwrap());

/// Parse one announcement line. Returns `None` for anything unrecognised.
pub fn parse_move_text(text: &str) -> Option<(Color, Move)> {
    if let Some(caps) = PLAYED_RE.captures(text) {
        let color = caps[1].parse().ok()?;
        let mv = Move::parse_vertex(&caps[2]).ok()?;
        return Some((color, mv));
    }
    if let Some(caps) = PASSED_RE.captures(text) {
        let color = caps[1].parse().ok()?;
        return Some((color, Move::Pass));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_played() {
        assert_eq!(
            parse_move_text("BLACK played D4"),
            Some((Color::Black, Move::play(3, 3)))
        );
        assert_eq!(
            parse_move_text("white played J10\n"),
            Some((Color::White, Move::play(9, 8)))
        );
    }

    #[test]
    fn test_parse_passed() {
        assert_eq!(parse_move_text("WHITE passed"), Some((Color::White, Move::Pass)));
    }

    #[test]
    fn test_parse_rejects_noise() {
        assert_eq!(parse_move_text(""), None);
        assert_eq!(parse_move_text("ANALYSIS_REQUEST"), None);
        assert_eq!(parse_move_text("BLACK played I4"), None);
        assert_eq!(parse_move_text("players B=human W=ai"), None);
    }
}
