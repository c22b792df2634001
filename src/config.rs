//! Training configuration.
//!
//! Values come from an optional JSON file, then environment variables, then
//! whatever the command line overrides. Every field has a default, so an
//! empty `{}` file is a valid config.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use log::warn;
use rust_sc2::prelude::Race;
use serde::{Deserialize, Serialize};

use crate::{
    curriculum::Thresholds,
    errors::ConfigError,
    ladder::{parse_race, reference_specs, Ladder, TierSpec},
    store::RetryPolicy,
    trainer::SessionLimits,
    window::RecentWindow,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    pub stats_path: PathBuf,
    pub ladder: Vec<TierSpec>,
    pub thresholds: Thresholds,
    pub window: WindowSettings,
    pub store: StoreSettings,
    pub session: SessionSettings,
    pub game: GameSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub capacity: usize,
    pub min_games: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub load_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// 0 keeps training until the process is stopped.
    pub max_games: u64,
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub maps: Vec<String>,
    pub bot_race: String,
    pub opponent_races: Vec<String>,
    pub realtime: bool,
    pub replay_dir: Option<PathBuf>,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            stats_path: PathBuf::from("data/training_stats.json"),
            ladder: reference_specs(),
            thresholds: Thresholds::default(),
            window: WindowSettings::default(),
            store: StoreSettings::default(),
            session: SessionSettings::default(),
            game: GameSettings::default(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            capacity: 20,
            min_games: 10,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay_ms: 50,
            load_timeout_ms: 3000,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_games: 0,
            max_consecutive_failures: 5,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            maps: vec!["AutomatonLE".to_string()],
            bot_race: "Protoss".to_string(),
            opponent_races: vec![
                "Terran".to_string(),
                "Zerg".to_string(),
                "Protoss".to_string(),
            ],
            realtime: false,
            replay_dir: None,
        }
    }
}

impl CurriculumConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `CURRICULUM_STATS_PATH`, `MAX_GAMES`, `CURRICULUM_MAPS` and
    /// `CURRICULUM_REPLAY_DIR` from the environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|var| std::env::var(var).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = lookup("CURRICULUM_STATS_PATH") {
            self.stats_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("MAX_GAMES") {
            self.session.max_games = parse_var("MAX_GAMES", &value)?;
        }
        if let Some(maps) = lookup("CURRICULUM_MAPS") {
            self.game.maps = maps
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(dir) = lookup("CURRICULUM_REPLAY_DIR") {
            self.game.replay_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ladder.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        let Thresholds {
            promotion,
            demotion,
            demotion_min_sample,
        } = self.thresholds;
        for (name, value) in [("promotion_threshold", promotion), ("demotion_threshold", demotion)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if demotion >= promotion {
            return Err(ConfigError::ThresholdsInverted {
                promotion,
                demotion,
            });
        }
        let WindowSettings {
            capacity,
            min_games,
        } = self.window;
        if min_games == 0 || min_games > capacity {
            return Err(ConfigError::InvalidWindow {
                capacity,
                min_games,
            });
        }
        if capacity < demotion_min_sample {
            warn!(
                "Window of {capacity} games can never reach the demotion sample of {demotion_min_sample}: demotion is disabled"
            );
        }
        if self.game.maps.is_empty() {
            return Err(ConfigError::NoMaps);
        }
        self.bot_race()?;
        self.opponent_races()?;
        Ok(())
    }

    pub fn ladder(&self) -> Result<Ladder, ConfigError> {
        Ladder::new(&self.ladder)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.store.max_attempts,
            retry_delay: Duration::from_millis(self.store.retry_delay_ms),
            load_timeout: Duration::from_millis(self.store.load_timeout_ms),
        }
    }

    #[must_use]
    pub fn recent_window(&self) -> RecentWindow {
        RecentWindow::new(self.window.capacity, self.window.min_games)
    }

    #[must_use]
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_games: (self.session.max_games > 0).then_some(self.session.max_games),
            max_consecutive_failures: self.session.max_consecutive_failures.max(1),
        }
    }

    pub fn bot_race(&self) -> Result<Race, ConfigError> {
        parse_race(&self.game.bot_race)
            .ok_or_else(|| ConfigError::UnknownRace(self.game.bot_race.clone()))
    }

    pub fn opponent_races(&self) -> Result<Vec<Race>, ConfigError> {
        self.game
            .opponent_races
            .iter()
            .map(|name| parse_race(name).ok_or_else(|| ConfigError::UnknownRace(name.clone())))
            .collect()
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::BadEnv {
        var,
        value: value.to_string(),
    })
}
