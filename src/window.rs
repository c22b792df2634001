use std::{collections::VecDeque, fmt, str::FromStr};

use rust_sc2::prelude::GameResult;
use serde::{Deserialize, Serialize};

use crate::errors::OutcomeParseError;

/// Stored as `WIN` / `DEFEAT` / `DRAW`, the names dashboards already read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    #[serde(rename = "WIN", alias = "Win")]
    Win,
    #[serde(rename = "DEFEAT", alias = "Loss")]
    Loss,
    #[serde(rename = "DRAW", alias = "Draw")]
    Draw,
}

impl FromStr for GameOutcome {
    type Err = OutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "victory" => Ok(Self::Win),
            "loss" | "defeat" => Ok(Self::Loss),
            "draw" | "tie" | "undecided" => Ok(Self::Draw),
            _ => Err(OutcomeParseError(s.to_string())),
        }
    }
}

impl From<GameResult> for GameOutcome {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::Victory => Self::Win,
            GameResult::Defeat => Self::Loss,
            GameResult::Tie | GameResult::Undecided => Self::Draw,
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Win => "WIN",
            Self::Loss => "DEFEAT",
            Self::Draw => "DRAW",
        };
        write!(f, "{s}")
    }
}

/// Win rate over a bounded sample of recent decided games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEvaluation {
    pub win_rate: f64,
    pub sample_size: usize,
}

/// Exact rolling window over the most recent wins and losses.
///
/// Draws never enter the window: the rate is wins / (wins + losses).
#[derive(Debug, Clone)]
pub struct RecentWindow {
    won: VecDeque<bool>,
    capacity: usize,
    min_games: usize,
}

impl RecentWindow {
    #[must_use]
    pub fn new(capacity: usize, min_games: usize) -> Self {
        Self {
            won: VecDeque::with_capacity(capacity),
            capacity,
            min_games,
        }
    }

    pub fn push(&mut self, outcome: GameOutcome) {
        let won = match outcome {
            GameOutcome::Win => true,
            GameOutcome::Loss => false,
            GameOutcome::Draw => return,
        };
        if self.capacity == 0 {
            return;
        }
        if self.won.len() == self.capacity {
            self.won.pop_front();
        }
        self.won.push_back(won);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.won.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.won.is_empty()
    }

    /// `None` until the window holds at least `min_games` decided games.
    #[must_use]
    pub fn evaluate(&self) -> Option<WindowEvaluation> {
        let sample_size = self.won.len();
        if sample_size == 0 || sample_size < self.min_games {
            return None;
        }
        let wins = self.won.iter().filter(|w| **w).count();
        Some(WindowEvaluation {
            win_rate: wins as f64 / sample_size as f64,
            sample_size,
        })
    }
}
