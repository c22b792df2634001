use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    ladder::{DifficultyTier, Ladder},
    store::{CurriculumStore, PersistedCurriculum},
};

/// Progress through the ladder. `tier_index` is always on the ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurriculumState {
    pub tier_index: usize,
    pub games_at_tier: u64,
}

impl CurriculumState {
    /// Out-of-range or negative tier indices collapse to the default state.
    #[must_use]
    pub fn from_persisted(persisted: PersistedCurriculum, ladder: &Ladder) -> Self {
        match usize::try_from(persisted.curriculum_level_idx) {
            Ok(tier_index) if ladder.contains(tier_index) => Self {
                tier_index,
                games_at_tier: persisted.games_at_current_level,
            },
            _ => {
                warn!(
                    "Stored tier index {} is off the ladder, starting from tier 0",
                    persisted.curriculum_level_idx
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub promotion: f64,
    pub demotion: f64,
    /// Sample size a demotion needs on top of the per-tier minimum.
    pub demotion_min_sample: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            promotion: 0.80,
            demotion: 0.20,
            demotion_min_sample: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierChange {
    Unchanged,
    Promoted { from: usize, to: usize },
    Demoted { from: usize, to: usize },
}

/// Read-only view for dashboards and the console readout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub current_level: usize,
    pub total_levels: usize,
    pub current_difficulty: String,
    pub level_name: String,
    pub games_at_current_level: u64,
    pub min_games_required: u64,
    pub promotion_threshold: f64,
    pub demotion_threshold: f64,
}

/// Moves a bot up and down the ladder based on recent results.
///
/// The in-memory state is authoritative for the life of the process: persistence
/// failures are logged and never change a verdict.
pub struct CurriculumController<S: CurriculumStore> {
    ladder: Ladder,
    thresholds: Thresholds,
    store: S,
    state: CurriculumState,
}

impl<S: CurriculumStore> CurriculumController<S> {
    pub fn new(ladder: Ladder, thresholds: Thresholds, store: S) -> Self {
        let state = load_state(&store, &ladder);
        info!(
            "Curriculum at tier {} ({}), {} games played there",
            state.tier_index,
            ladder.tier_or_bottom(state.tier_index).name,
            state.games_at_tier
        );
        Self {
            ladder,
            thresholds,
            store,
            state,
        }
    }

    /// Replace the in-memory state with whatever the store holds now.
    pub fn reload(&mut self) -> CurriculumState {
        self.state = load_state(&self.store, &self.ladder);
        self.state
    }

    #[must_use]
    pub fn current_difficulty(&self) -> &DifficultyTier {
        self.ladder.tier_or_bottom(self.state.tier_index)
    }

    #[must_use]
    pub const fn state(&self) -> CurriculumState {
        self.state
    }

    #[must_use]
    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    #[must_use]
    pub const fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn record_game(&mut self) {
        self.state.games_at_tier = self.state.games_at_tier.saturating_add(1);
        self.persist();
    }

    pub fn check_promotion(&mut self, win_rate: f64, sample_size: usize) -> bool {
        let from = self.state.tier_index;
        if from >= self.ladder.top_index() || !self.has_enough_games() {
            return false;
        }
        if win_rate >= self.thresholds.promotion {
            self.move_to(from + 1);
            info!(
                "LEVEL UP: {} -> {} (win rate {:.1}% over {sample_size} games, needs {:.0}%)",
                self.ladder.tier_or_bottom(from).name,
                self.current_difficulty().name,
                win_rate * 100.0,
                self.thresholds.promotion * 100.0
            );
            return true;
        }
        false
    }

    pub fn check_demotion(&mut self, win_rate: f64, sample_size: usize) -> bool {
        let from = self.state.tier_index;
        if from == 0 || !self.has_enough_games() {
            return false;
        }
        if win_rate < self.thresholds.demotion
            && sample_size >= self.thresholds.demotion_min_sample
        {
            self.move_to(from - 1);
            info!(
                "LEVEL DOWN: {} -> {} (win rate {:.1}% over {sample_size} games, floor {:.0}%)",
                self.ladder.tier_or_bottom(from).name,
                self.current_difficulty().name,
                win_rate * 100.0,
                self.thresholds.demotion * 100.0
            );
            return true;
        }
        false
    }

    /// Promotion is tried first; a tier that just changed can't move again.
    pub fn evaluate(&mut self, win_rate: f64, sample_size: usize) -> TierChange {
        let from = self.state.tier_index;
        if self.check_promotion(win_rate, sample_size) {
            return TierChange::Promoted {
                from,
                to: self.state.tier_index,
            };
        }
        if self.check_demotion(win_rate, sample_size) {
            return TierChange::Demoted {
                from,
                to: self.state.tier_index,
            };
        }
        TierChange::Unchanged
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        let tier = self.current_difficulty();
        ProgressSnapshot {
            current_level: tier.index + 1,
            total_levels: self.ladder.len(),
            current_difficulty: tier.name.to_string(),
            level_name: tier.label.clone(),
            games_at_current_level: self.state.games_at_tier,
            min_games_required: tier.min_games_required,
            promotion_threshold: self.thresholds.promotion,
            demotion_threshold: self.thresholds.demotion,
        }
    }

    fn has_enough_games(&self) -> bool {
        self.state.games_at_tier >= self.current_difficulty().min_games_required
    }

    fn move_to(&mut self, tier_index: usize) {
        self.state = CurriculumState {
            tier_index,
            games_at_tier: 0,
        };
        self.persist();
    }

    fn persist(&mut self) {
        let name = self.ladder.tier_or_bottom(self.state.tier_index).name;
        if let Err(e) = self.store.save(&self.state, name) {
            warn!("Failed to save curriculum progress: {e}");
        }
    }
}

fn load_state<S: CurriculumStore>(store: &S, ladder: &Ladder) -> CurriculumState {
    match store.load() {
        Ok(Some(persisted)) => CurriculumState::from_persisted(persisted, ladder),
        Ok(None) => {
            debug!("No stored curriculum progress, starting fresh");
            CurriculumState::default()
        }
        Err(e) => {
            warn!("Couldn't load curriculum progress, starting from tier 0: {e}");
            CurriculumState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn controller_at(tier: i64, games: u64) -> CurriculumController<MemoryStore> {
        CurriculumController::new(
            Ladder::reference(),
            Thresholds::default(),
            MemoryStore::with_state(tier, games),
        )
    }

    #[test]
    fn loads_every_valid_tier() {
        for tier in 0..6 {
            let controller = controller_at(tier, 3);
            assert_eq!(controller.current_difficulty().index, tier as usize);
            assert_eq!(controller.state().games_at_tier, 3);
        }
    }

    #[test]
    fn off_ladder_index_yields_default() {
        for tier in [99, 6, -1] {
            let controller = controller_at(tier, 7);
            assert_eq!(controller.state(), CurriculumState::default());
            assert_eq!(controller.current_difficulty().name, "VeryEasy");
        }
    }

    #[test]
    fn failed_load_yields_default() {
        let controller = CurriculumController::new(
            Ladder::reference(),
            Thresholds::default(),
            MemoryStore::failing(),
        );
        assert_eq!(controller.state(), CurriculumState::default());
    }

    #[test]
    fn reload_is_idempotent() {
        let mut controller = controller_at(3, 12);
        let first = controller.reload();
        let second = controller.reload();
        assert_eq!(first, second);
        assert_eq!(first.tier_index, 3);
    }

    #[test]
    fn record_game_counts_and_saves() {
        let mut controller = controller_at(0, 0);
        controller.record_game();
        controller.record_game();
        assert_eq!(controller.state().games_at_tier, 2);
        assert_eq!(controller.store().saves(), 2);
        assert_eq!(controller.store().stored().unwrap().games_at_current_level, 2);
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let mut controller = controller_at(1, 4);
        controller.store_mut().fail_saves = true;
        controller.record_game();
        assert_eq!(controller.state().games_at_tier, 5);
        assert_eq!(controller.store().stored().unwrap().games_at_current_level, 4);
    }

    #[test]
    fn game_counter_saturates() {
        let mut controller = controller_at(0, u64::MAX);
        controller.record_game();
        assert_eq!(controller.state().games_at_tier, u64::MAX);
        assert_eq!(
            controller.store().stored().unwrap().games_at_current_level,
            u64::MAX
        );
    }

    #[test]
    fn nan_win_rate_never_moves() {
        let mut controller = controller_at(2, 100);
        assert!(!controller.check_promotion(f64::NAN, 100));
        assert!(!controller.check_demotion(f64::NAN, 100));
        assert_eq!(controller.evaluate(f64::NAN, 100), TierChange::Unchanged);
        assert_eq!(controller.state().tier_index, 2);
        assert_eq!(controller.store().saves(), 0);
    }

    #[test]
    fn promotion_needs_tier_minimum() {
        let mut controller = controller_at(0, 5);
        assert!(!controller.check_promotion(1.0, 5));
        assert_eq!(controller.state().tier_index, 0);
        assert_eq!(controller.store().saves(), 0);
    }

    #[test]
    fn promotion_fires_at_threshold() {
        let mut controller = controller_at(0, 10);
        assert!(!controller.check_promotion(0.79, 10));
        assert!(controller.check_promotion(0.80, 10));
        assert_eq!(controller.state(), CurriculumState { tier_index: 1, games_at_tier: 0 });
        assert_eq!(controller.store().stored().unwrap().curriculum_level_idx, 1);
        assert_eq!(controller.store().last_tier_name(), Some("Easy"));
    }

    #[test]
    fn promotion_blocked_at_top() {
        let mut controller = controller_at(5, 1000);
        assert!(!controller.check_promotion(1.0, 1000));
        assert_eq!(controller.state().tier_index, 5);
    }

    #[test]
    fn demotion_needs_sample_floor() {
        let mut controller = controller_at(2, 20);
        assert!(!controller.check_demotion(0.10, 20));
        assert_eq!(controller.state().tier_index, 2);
        assert!(controller.check_demotion(0.10, 30));
        assert_eq!(controller.state(), CurriculumState { tier_index: 1, games_at_tier: 0 });
    }

    #[test]
    fn demotion_needs_tier_minimum() {
        let mut controller = controller_at(2, 19);
        assert!(!controller.check_demotion(0.0, 100));
    }

    #[test]
    fn demotion_blocked_at_bottom() {
        let mut controller = controller_at(0, 500);
        assert!(!controller.check_demotion(0.0, 500));
    }

    #[test]
    fn gates_use_their_own_thresholds() {
        let thresholds = Thresholds {
            promotion: 0.6,
            demotion: 0.4,
            demotion_min_sample: 5,
        };
        let mut controller = CurriculumController::new(
            Ladder::reference(),
            thresholds,
            MemoryStore::with_state(2, 20),
        );
        // 0.5 sits between the two gates: neither fires.
        assert!(!controller.check_promotion(0.5, 20));
        assert!(!controller.check_demotion(0.5, 20));
        assert!(controller.check_demotion(0.39, 5));
        assert_eq!(controller.state().tier_index, 1);

        let mut controller = CurriculumController::new(
            Ladder::reference(),
            thresholds,
            MemoryStore::with_state(2, 20),
        );
        assert!(controller.check_promotion(0.6, 1));
        assert_eq!(controller.state().tier_index, 3);
    }

    #[test]
    fn evaluate_reports_change() {
        let mut controller = controller_at(3, 25);
        assert_eq!(
            controller.evaluate(0.9, 20),
            TierChange::Promoted { from: 3, to: 4 }
        );
        assert_eq!(controller.evaluate(0.0, 40), TierChange::Unchanged);
    }

    #[test]
    fn progress_snapshot_is_one_based() {
        let controller = controller_at(2, 7);
        let snapshot = controller.progress();
        assert_eq!(snapshot.current_level, 3);
        assert_eq!(snapshot.total_levels, 6);
        assert_eq!(snapshot.current_difficulty, "Medium");
        assert_eq!(snapshot.games_at_current_level, 7);
        assert_eq!(snapshot.min_games_required, 20);
        assert!((snapshot.promotion_threshold - 0.8).abs() < f64::EPSILON);
        assert!((snapshot.demotion_threshold - 0.2).abs() < f64::EPSILON);
    }
}
