//! Signal types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary outcome side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// YES / Up outcome
    Yes,
    /// NO / Down outcome
    No,
}

impl Side {
    /// The other outcome
    pub fn opposite(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Sign of a return series, with a neutral dead-zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Neutral,
    Up,
}

impl Direction {
    /// -1, 0 or 1
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Down => -1,
            Direction::Neutral => 0,
            Direction::Up => 1,
        }
    }

    /// True when both directions are non-neutral and point opposite ways
    pub fn disagrees_with(self, other: Direction) -> bool {
        self != Direction::Neutral && other != Direction::Neutral && self != other
    }
}

/// Upstream order recommendation graded from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Start,
    Hold,
    Stop,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Start => write!(f, "START"),
            Recommendation::Hold => write!(f, "HOLD"),
            Recommendation::Stop => write!(f, "STOP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite(), Side::Yes);
    }

    #[test]
    fn test_direction_disagreement() {
        assert!(Direction::Up.disagrees_with(Direction::Down));
        assert!(!Direction::Up.disagrees_with(Direction::Neutral));
        assert!(!Direction::Neutral.disagrees_with(Direction::Down));
        assert!(!Direction::Down.disagrees_with(Direction::Down));
    }

    #[test]
    fn test_side_serde_uppercase() {
        let json = serde_json::to_string(&Side::Yes).unwrap();
        assert_eq!(json, "\"YES\"");
    }
}
