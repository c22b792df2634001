use std::{cell::Cell, fs, path::PathBuf};

use log::debug;
use rand::seq::IndexedRandom;
use rust_sc2::prelude::*;

use crate::{
    errors::RunnerError,
    ladder::DifficultyTier,
    trainer::GameRunner,
    window::GameOutcome,
};

/// Bare-bones player: sends idle army at the enemy start and remembers
/// how the game ended.
#[bot]
#[derive(Default)]
pub struct TrainingBot {
    race: Option<Race>,
    result: Cell<Option<GameResult>>,
}

impl TrainingBot {
    #[must_use]
    pub fn new(race: Race) -> Self {
        Self {
            race: Some(race),
            ..Default::default()
        }
    }

    pub fn take_result(&self) -> Option<GameResult> {
        self.result.take()
    }
}

impl Player for TrainingBot {
    fn get_player_settings(&self) -> PlayerSettings {
        PlayerSettings::new(self.race.unwrap_or(Race::Random)).raw_crop_to_playable_area(true)
    }

    fn on_step(&mut self, frame_no: usize) -> SC2Result<()> {
        if frame_no % 100 == 0 {
            let target = self.enemy_start;
            for unit in self.units.my.units.clone().iter().idle() {
                if !unit.is_worker() {
                    unit.attack(Target::Pos(target), false);
                }
            }
        }
        Ok(())
    }

    fn on_end(&self, result: GameResult) -> SC2Result<()> {
        debug!("Game over: {result:?}");
        self.result.set(Some(result));
        Ok(())
    }
}

/// Launches real games against the built-in AI.
#[derive(Debug, Clone)]
pub struct Sc2Runner {
    pub maps: Vec<String>,
    pub opponent_races: Vec<Race>,
    pub bot_race: Race,
    pub realtime: bool,
    pub replay_dir: Option<PathBuf>,
}

impl Sc2Runner {
    fn replay_path(
        &self,
        opponent: &DifficultyTier,
        race: Race,
        map: &str,
        game_no: u64,
    ) -> Option<String> {
        let dir = self.replay_dir.as_ref()?;
        if let Err(e) = fs::create_dir_all(dir) {
            debug!("Can't create replay dir {}: {e}", dir.display());
            return None;
        }
        let name = format!("game{game_no}_{}_vs_{race:?}_{map}.SC2Replay", opponent.name);
        Some(dir.join(name).to_string_lossy().into_owned())
    }
}

impl GameRunner for Sc2Runner {
    fn play(
        &mut self,
        opponent: &DifficultyTier,
        game_no: u64,
    ) -> Result<GameOutcome, RunnerError> {
        let mut rng = rand::rng();
        let map = self
            .maps
            .choose(&mut rng)
            .ok_or_else(|| RunnerError::Game("no maps configured".to_string()))?
            .clone();
        let race = self
            .opponent_races
            .choose(&mut rng)
            .copied()
            .unwrap_or(Race::Random);

        let replay = self.replay_path(opponent, race, &map, game_no);
        let options = LaunchOptions {
            realtime: self.realtime,
            save_replay_as: replay.as_deref(),
            ..Default::default()
        };
        debug!("Launching {map} vs {race:?} {}", opponent.name);

        let mut bot = TrainingBot::new(self.bot_race);
        run_vs_computer(
            &mut bot,
            Computer::new(race, opponent.difficulty, None),
            &map,
            options,
        )
        .map_err(|e| RunnerError::Game(e.to_string()))?;

        bot.take_result()
            .map(GameOutcome::from)
            .ok_or(RunnerError::NoResult)
    }
}
