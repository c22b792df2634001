pub mod config;
pub mod curriculum;
pub mod errors;
pub mod ladder;
pub mod readout;
pub mod sc2;
pub mod store;
pub mod trainer;
pub mod window;

pub use curriculum::{CurriculumController, CurriculumState, ProgressSnapshot, Thresholds, TierChange};
pub use ladder::{DifficultyTier, Ladder, TierSpec};
pub use store::{CurriculumStore, JsonFileStore, MemoryStore, RetryPolicy};
pub use trainer::{GameRunner, TrainingSession, TrainingStats};
pub use window::{GameOutcome, RecentWindow};
