use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    curriculum::{CurriculumController, TierChange},
    errors::{RunnerError, TrainingError},
    ladder::DifficultyTier,
    readout,
    store::CurriculumStore,
    window::{GameOutcome, RecentWindow, WindowEvaluation},
};

/// Plays one game against the given opponent tier and reports how it ended.
pub trait GameRunner {
    fn play(&mut self, opponent: &DifficultyTier, game_no: u64)
        -> Result<GameOutcome, RunnerError>;
}

/// Running tallies, merged into the stats document after every game and
/// picked up again by the next session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStats {
    pub game_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub draw_count: u64,
    pub last_result: Option<GameOutcome>,
    /// Percentage over decided games, one decimal.
    pub win_rate: f64,
}

impl TrainingStats {
    pub fn record(&mut self, outcome: GameOutcome) {
        self.game_count = self.game_count.saturating_add(1);
        let tally = match outcome {
            GameOutcome::Win => &mut self.win_count,
            GameOutcome::Loss => &mut self.loss_count,
            GameOutcome::Draw => &mut self.draw_count,
        };
        *tally = tally.saturating_add(1);
        self.last_result = Some(outcome);
        let decided = self.win_count.saturating_add(self.loss_count);
        self.win_rate = if decided == 0 {
            0.0
        } else {
            (self.win_count as f64 * 1000.0 / decided as f64).round() / 10.0
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameReport {
    pub game_no: u64,
    pub opponent: &'static str,
    pub outcome: GameOutcome,
    pub evaluation: Option<WindowEvaluation>,
    pub change: TierChange,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// `None` runs until the process is stopped.
    pub max_games: Option<u64>,
    pub max_consecutive_failures: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_games: None,
            max_consecutive_failures: 5,
        }
    }
}

pub struct TrainingSession<S: CurriculumStore, R: GameRunner> {
    controller: CurriculumController<S>,
    runner: R,
    window: RecentWindow,
    stats: TrainingStats,
    limits: SessionLimits,
    played: u64,
    consecutive_failures: u32,
}

impl<S: CurriculumStore, R: GameRunner> TrainingSession<S, R> {
    pub fn new(
        controller: CurriculumController<S>,
        runner: R,
        window: RecentWindow,
        limits: SessionLimits,
    ) -> Self {
        let stats = match controller.store().load_stats() {
            Ok(stats) => stats.unwrap_or_default(),
            Err(e) => {
                warn!("Couldn't load earlier training stats, starting from zero: {e}");
                TrainingStats::default()
            }
        };
        if stats.game_count > 0 {
            info!(
                "Resuming after {} games, {}W / {}L / {}D",
                stats.game_count, stats.win_count, stats.loss_count, stats.draw_count
            );
        }
        Self {
            controller,
            runner,
            window,
            stats,
            limits,
            played: 0,
            consecutive_failures: 0,
        }
    }

    pub const fn controller(&self) -> &CurriculumController<S> {
        &self.controller
    }

    pub const fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Games completed by this session, not counting earlier ones.
    pub const fn played(&self) -> u64 {
        self.played
    }

    /// Run a single game. `Ok(None)` means the runner failed but the session
    /// may keep going.
    pub fn play_one(&mut self) -> Result<Option<GameReport>, TrainingError> {
        let game_no = self.stats.game_count + 1;
        let opponent = self.controller.current_difficulty().clone();
        info!(
            "Game #{game_no} vs {} ({}), {}W / {}L",
            opponent.name, opponent.label, self.stats.win_count, self.stats.loss_count
        );

        match self.runner.play(&opponent, game_no) {
            Ok(outcome) => {
                self.consecutive_failures = 0;
                Ok(Some(self.observe(outcome, opponent.name)))
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Game #{game_no} failed ({}/{}): {e}",
                    self.consecutive_failures, self.limits.max_consecutive_failures
                );
                if self.consecutive_failures >= self.limits.max_consecutive_failures {
                    return Err(TrainingError::TooManyFailures {
                        count: self.consecutive_failures,
                        last: e,
                    });
                }
                Ok(None)
            }
        }
    }

    pub fn run(&mut self) -> Result<TrainingStats, TrainingError> {
        while self
            .limits
            .max_games
            .map_or(true, |max| self.played < max)
        {
            self.play_one()?;
        }
        info!(
            "Training finished: {} games this session, {} total, {}W / {}L / {}D",
            self.played,
            self.stats.game_count,
            self.stats.win_count,
            self.stats.loss_count,
            self.stats.draw_count
        );
        Ok(self.stats.clone())
    }

    fn observe(&mut self, outcome: GameOutcome, opponent: &'static str) -> GameReport {
        self.played += 1;
        self.stats.record(outcome);
        self.controller.record_game();
        self.window.push(outcome);

        let evaluation = self.window.evaluate();
        let change = evaluation.map_or(TierChange::Unchanged, |eval| {
            self.controller.evaluate(eval.win_rate, eval.sample_size)
        });
        if change != TierChange::Unchanged {
            let banner =
                readout::render_transition(change, self.controller.ladder(), evaluation);
            info!("\n{}", readout::plain(&banner));
        }

        if let Err(e) = self.controller.store_mut().save_stats(&self.stats) {
            warn!("Failed to save training stats: {e}");
        }

        info!(
            "[{outcome}] Game #{} - {}W / {}L, win rate {:.1}%",
            self.stats.game_count, self.stats.win_count, self.stats.loss_count, self.stats.win_rate
        );
        GameReport {
            game_no: self.stats.game_count,
            opponent,
            outcome,
            evaluation,
            change,
        }
    }
}
