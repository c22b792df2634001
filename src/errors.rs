use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("can't access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid curriculum JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} does not hold a JSON object")]
    NotAnObject(PathBuf),
    #[error("read of {path} gave up after {elapsed:?}")]
    Timeout { path: PathBuf, elapsed: Duration },
    #[error("reader thread for {0} went away")]
    ReaderLost(PathBuf),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ladder has no tiers")]
    EmptyLadder,
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("unknown race: {0}")]
    UnknownRace(String),
    #[error("{name} must lie in [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("demotion threshold {demotion} must be below promotion threshold {promotion}")]
    ThresholdsInverted { promotion: f64, demotion: f64 },
    #[error("window needs 0 < min_games ({min_games}) <= capacity ({capacity})")]
    InvalidWindow { capacity: usize, min_games: usize },
    #[error("no maps configured")]
    NoMaps,
    #[error("bad value for {var}: {value}")]
    BadEnv { var: &'static str, value: String },
}

#[derive(Debug, Error)]
#[error("unrecognised game result: {0:?}")]
pub struct OutcomeParseError(pub String);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("game failed to run: {0}")]
    Game(String),
    #[error("game finished without reporting a result")]
    NoResult,
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("{count} games in a row failed to run, last: {last}")]
    TooManyFailures {
        count: u32,
        #[source]
        last: RunnerError,
    },
}
