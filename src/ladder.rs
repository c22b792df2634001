use rust_sc2::prelude::{Difficulty, Race};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// One rung of the opponent ladder.
#[derive(Debug, Clone)]
pub struct DifficultyTier {
    pub index: usize,
    pub difficulty: Difficulty,
    pub name: &'static str,
    pub label: String,
    pub min_games_required: u64,
}

/// Configuration form of a tier, as it appears in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub difficulty: String,
    #[serde(default)]
    pub label: String,
    pub min_games: u64,
}

impl TierSpec {
    pub fn new(difficulty: &str, label: &str, min_games: u64) -> Self {
        Self {
            difficulty: difficulty.to_string(),
            label: label.to_string(),
            min_games,
        }
    }
}

/// Ordered, non-empty list of tiers. Index 0 is the easiest.
#[derive(Debug, Clone)]
pub struct Ladder {
    tiers: Vec<DifficultyTier>,
}

impl Ladder {
    pub fn new(specs: &[TierSpec]) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        let tiers = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let difficulty = parse_difficulty(&spec.difficulty)
                    .ok_or_else(|| ConfigError::UnknownDifficulty(spec.difficulty.clone()))?;
                let name = difficulty_name(&difficulty);
                let label = if spec.label.is_empty() {
                    name.to_string()
                } else {
                    spec.label.clone()
                };
                Ok(DifficultyTier {
                    index,
                    difficulty,
                    name,
                    label,
                    min_games_required: spec.min_games,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { tiers })
    }

    #[must_use]
    pub fn reference() -> Self {
        let tiers = REFERENCE_TIERS
            .iter()
            .enumerate()
            .map(|(index, (difficulty, label, min_games))| DifficultyTier {
                index,
                name: difficulty_name(difficulty),
                difficulty: *difficulty,
                label: (*label).to_string(),
                min_games_required: *min_games,
            })
            .collect();
        Self { tiers }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn top_index(&self) -> usize {
        self.tiers.len() - 1
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.tiers.len()
    }

    /// The tier at `index`, or the bottom tier when `index` is off the ladder.
    #[must_use]
    pub fn tier_or_bottom(&self, index: usize) -> &DifficultyTier {
        self.tiers.get(index).unwrap_or(&self.tiers[0])
    }

    pub fn tiers(&self) -> impl Iterator<Item = &DifficultyTier> {
        self.tiers.iter()
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self::reference()
    }
}

const REFERENCE_TIERS: [(Difficulty, &str, u64); 6] = [
    (Difficulty::VeryEasy, "Sandbox", 10),
    (Difficulty::Easy, "Fundamentals", 15),
    (Difficulty::Medium, "Standard play", 20),
    (Difficulty::Hard, "Pressure", 25),
    (Difficulty::VeryHard, "Mastery", 30),
    (Difficulty::CheatInsane, "Cheater", 40),
];

#[must_use]
pub fn reference_specs() -> Vec<TierSpec> {
    REFERENCE_TIERS
        .iter()
        .map(|(difficulty, label, min_games)| {
            TierSpec::new(difficulty_name(difficulty), label, *min_games)
        })
        .collect()
}

#[must_use]
pub fn parse_difficulty(name: &str) -> Option<Difficulty> {
    let difficulty = match name.trim().to_ascii_lowercase().as_str() {
        "veryeasy" => Difficulty::VeryEasy,
        "easy" => Difficulty::Easy,
        "medium" => Difficulty::Medium,
        "mediumhard" => Difficulty::MediumHard,
        "hard" => Difficulty::Hard,
        "harder" => Difficulty::Harder,
        "veryhard" => Difficulty::VeryHard,
        "cheatvision" => Difficulty::CheatVision,
        "cheatmoney" => Difficulty::CheatMoney,
        "cheatinsane" => Difficulty::CheatInsane,
        _ => return None,
    };
    Some(difficulty)
}

#[must_use]
pub const fn difficulty_name(difficulty: &Difficulty) -> &'static str {
    match difficulty {
        Difficulty::VeryEasy => "VeryEasy",
        Difficulty::Easy => "Easy",
        Difficulty::Medium => "Medium",
        Difficulty::MediumHard => "MediumHard",
        Difficulty::Hard => "Hard",
        Difficulty::Harder => "Harder",
        Difficulty::VeryHard => "VeryHard",
        Difficulty::CheatVision => "CheatVision",
        Difficulty::CheatMoney => "CheatMoney",
        Difficulty::CheatInsane => "CheatInsane",
    }
}

#[must_use]
pub fn parse_race(name: &str) -> Option<Race> {
    match name.trim().to_ascii_lowercase().as_str() {
        "terran" => Some(Race::Terran),
        "zerg" => Some(Race::Zerg),
        "protoss" => Some(Race::Protoss),
        "random" => Some(Race::Random),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ladder_matches_minimums() {
        let ladder = Ladder::reference();
        let mins: Vec<u64> = ladder.tiers().map(|t| t.min_games_required).collect();
        assert_eq!(mins, vec![10, 15, 20, 25, 30, 40]);
        let names: Vec<&str> = ladder.tiers().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["VeryEasy", "Easy", "Medium", "Hard", "VeryHard", "CheatInsane"]
        );
        assert!(ladder.tiers().enumerate().all(|(i, t)| t.index == i));
        assert_eq!(ladder.top_index(), 5);
    }

    #[test]
    fn reference_specs_build_the_reference_ladder() {
        let built = Ladder::new(&reference_specs()).unwrap();
        let reference = Ladder::reference();
        assert_eq!(built.len(), reference.len());
        for (a, b) in built.tiers().zip(reference.tiers()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.name, b.name);
            assert_eq!(a.label, b.label);
            assert_eq!(a.min_games_required, b.min_games_required);
        }
        assert_eq!(reference.tier_or_bottom(2).label, "Standard play");
    }

    #[test]
    fn off_ladder_lookup_falls_to_bottom() {
        let ladder = Ladder::reference();
        assert_eq!(ladder.tier_or_bottom(3).name, "Hard");
        assert_eq!(ladder.tier_or_bottom(99).index, 0);
    }

    #[test]
    fn rejects_bad_ladders() {
        assert!(matches!(Ladder::new(&[]), Err(ConfigError::EmptyLadder)));
        let bad = [TierSpec::new("Impossible", "", 5)];
        assert!(matches!(
            Ladder::new(&bad),
            Err(ConfigError::UnknownDifficulty(name)) if name == "Impossible"
        ));
    }

    #[test]
    fn blank_label_uses_difficulty_name() {
        let ladder = Ladder::new(&[TierSpec::new("harder", "", 3)]).unwrap();
        assert_eq!(ladder.tier_or_bottom(0).label, "Harder");
    }

    #[test]
    fn parses_races() {
        assert!(parse_race("Zerg").is_some());
        assert!(parse_race("Random").is_some());
        assert!(parse_race("Tyranid").is_none());
    }
}
