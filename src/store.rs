use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, ser::PrettyFormatter, Map, Value};

use crate::{curriculum::CurriculumState, errors::StoreError, trainer::TrainingStats};

/// Curriculum fields as they sit in the stats document, before validation
/// against a ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCurriculum {
    #[serde(default)]
    pub curriculum_level_idx: i64,
    #[serde(default)]
    pub games_at_current_level: u64,
}

impl PersistedCurriculum {
    fn from_state(state: &CurriculumState) -> Self {
        Self {
            curriculum_level_idx: i64::try_from(state.tier_index).unwrap_or(i64::MAX),
            games_at_current_level: state.games_at_tier,
        }
    }
}

pub trait CurriculumStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedCurriculum>, StoreError>;

    fn save(&mut self, state: &CurriculumState, tier_name: &str) -> Result<(), StoreError>;

    /// Tallies left by an earlier session, if any.
    fn load_stats(&self) -> Result<Option<TrainingStats>, StoreError> {
        Ok(None)
    }

    fn save_stats(&mut self, _stats: &TrainingStats) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub load_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(50),
            load_timeout: Duration::from_secs(3),
        }
    }
}

type ReadFn = fn(&Path) -> io::Result<String>;

/// The stats JSON document shared with other tools.
///
/// Reads retry on I/O errors and run against a wall-clock ceiling. Writes
/// merge into whatever is already on disk, so keys owned by other writers
/// survive. There is no locking: the last writer wins.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    policy: RetryPolicy,
    read: ReadFn,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            read: read_file,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document, bounded by the load timeout.
    pub fn read_document(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let path = self.path.clone();
        let policy = self.policy;
        let read = self.read;
        let started = Instant::now();
        self.with_ceiling("curriculum-load", started, move || {
            read_with_retry(&path, policy, read, started)
        })
    }

    /// Overlay `fields` on the stored document and write it back.
    ///
    /// A document that can't be read in time counts as empty. The write is
    /// held to the same ceiling as a load.
    pub fn merge_write(&self, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut document = match self.read_document() {
            Ok(document) => document.unwrap_or_default(),
            Err(e) => {
                debug!("Writing over unreadable document: {e}");
                Map::new()
            }
        };
        document.extend(fields);

        let path = self.path.clone();
        self.with_ceiling("curriculum-save", Instant::now(), move || {
            write_document(&path, &Value::Object(document))
        })
    }

    /// Run `job` on its own thread and give up on it after `load_timeout`.
    fn with_ceiling<T, F>(&self, name: &str, started: Instant, job: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _ = tx.send(job());
            })
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        match rx.recv_timeout(self.policy.load_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(StoreError::Timeout {
                path: self.path.clone(),
                elapsed: started.elapsed(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::ReaderLost(self.path.clone())),
        }
    }
}

impl CurriculumStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedCurriculum>, StoreError> {
        let Some(document) = self.read_document()? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(document))
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&mut self, state: &CurriculumState, tier_name: &str) -> Result<(), StoreError> {
        let persisted = PersistedCurriculum::from_state(state);
        let mut fields = Map::new();
        fields.insert(
            "curriculum_level_idx".to_string(),
            json!(persisted.curriculum_level_idx),
        );
        fields.insert(
            "games_at_current_level".to_string(),
            json!(persisted.games_at_current_level),
        );
        fields.insert("current_difficulty".to_string(), json!(tier_name));
        self.merge_write(fields)
    }

    fn load_stats(&self) -> Result<Option<TrainingStats>, StoreError> {
        let Some(document) = self.read_document()? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(document))
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save_stats(&mut self, stats: &TrainingStats) -> Result<(), StoreError> {
        match serde_json::to_value(stats) {
            Ok(Value::Object(fields)) => self.merge_write(fields),
            Ok(_) => Err(StoreError::NotAnObject(self.path.clone())),
            Err(source) => Err(StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn write_document(path: &Path, document: &Value) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut text = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut text, PrettyFormatter::with_indent(b"    "));
    document
        .serialize(&mut serializer)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    // Readers never see a half-written document.
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, &text).map_err(io_err)?;
    fs::rename(&staging, path).map_err(io_err)
}

fn read_file(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

fn read_with_retry(
    path: &Path,
    policy: RetryPolicy,
    read: ReadFn,
    started: Instant,
) -> Result<Option<Map<String, Value>>, StoreError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let elapsed = started.elapsed();
        if elapsed > policy.load_timeout {
            return Err(StoreError::Timeout {
                path: path.to_path_buf(),
                elapsed,
            });
        }
        attempt += 1;
        match read(path) {
            Ok(text) => return parse_document(path, &text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if attempt < attempts => {
                warn!("Read of {} failed ({e}), retrying", path.display());
                thread::sleep(policy.retry_delay);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

fn parse_document(path: &Path, text: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::NotAnObject(path.to_path_buf())),
        Err(source) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// In-memory store for exercising the controller without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stored: Option<PersistedCurriculum>,
    stats: Option<TrainingStats>,
    last_tier_name: Option<String>,
    saves: usize,
    pub fail_loads: bool,
    pub fail_saves: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn with_state(tier_index: i64, games: u64) -> Self {
        Self {
            stored: Some(PersistedCurriculum {
                curriculum_level_idx: tier_index,
                games_at_current_level: games,
            }),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_stats(mut self, stats: TrainingStats) -> Self {
        self.stats = Some(stats);
        self
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_loads: true,
            fail_saves: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn stored(&self) -> Option<PersistedCurriculum> {
        self.stored
    }

    #[must_use]
    pub const fn stats(&self) -> Option<&TrainingStats> {
        self.stats.as_ref()
    }

    #[must_use]
    pub fn last_tier_name(&self) -> Option<&str> {
        self.last_tier_name.as_deref()
    }

    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl CurriculumStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedCurriculum>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Unavailable("loads disabled".to_string()));
        }
        Ok(self.stored)
    }

    fn save(&mut self, state: &CurriculumState, tier_name: &str) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".to_string()));
        }
        self.stored = Some(PersistedCurriculum::from_state(state));
        self.last_tier_name = Some(tier_name.to_string());
        self.saves += 1;
        Ok(())
    }

    fn save_stats(&mut self, stats: &TrainingStats) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".to_string()));
        }
        self.stats = Some(stats.clone());
        Ok(())
    }

    fn load_stats(&self) -> Result<Option<TrainingStats>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Unavailable("loads disabled".to_string()));
        }
        Ok(self.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            retry_delay: Duration::from_millis(5),
            load_timeout: Duration::from_millis(200),
        }
    }

    fn store_with_reader(read: ReadFn) -> JsonFileStore {
        JsonFileStore {
            read,
            ..JsonFileStore::new("stats.json", quick_policy())
        }
    }

    fn hangs(_: &Path) -> io::Result<String> {
        thread::sleep(Duration::from_secs(2));
        Ok("{}".to_string())
    }

    #[test]
    fn slow_read_times_out() {
        let started = Instant::now();
        let err = store_with_reader(hangs).load().unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn transient_lock_is_retried() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn locked_once(_: &Path) -> io::Result<String> {
            if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                Ok(r#"{"curriculum_level_idx": 4, "games_at_current_level": 9}"#.to_string())
            }
        }
        let loaded = store_with_reader(locked_once).load().unwrap().unwrap();
        assert_eq!(loaded.curriculum_level_idx, 4);
        assert_eq!(loaded.games_at_current_level, 9);
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn persistent_lock_gives_up() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn always_locked(_: &Path) -> io::Result<String> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
        let err = store_with_reader(always_locked).load().unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn corrupt_json_is_not_retried() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn garbage(_: &Path) -> io::Result<String> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok("{ not json".to_string())
        }
        let err = store_with_reader(garbage).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_object_document_is_rejected() {
        fn array(_: &Path) -> io::Result<String> {
            Ok("[1, 2, 3]".to_string())
        }
        let err = store_with_reader(array).load().unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject(_)));
    }

    #[test]
    fn missing_fields_default_to_zero() {
        fn other_keys(_: &Path) -> io::Result<String> {
            Ok(r#"{"win_count": 3}"#.to_string())
        }
        let loaded = store_with_reader(other_keys).load().unwrap().unwrap();
        assert_eq!(loaded, PersistedCurriculum::default());
    }

    #[test]
    fn save_is_bounded_by_load_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        let mut store = JsonFileStore {
            read: hangs,
            ..JsonFileStore::new(&path, quick_policy())
        };
        let state = CurriculumState {
            tier_index: 2,
            games_at_tier: 7,
        };

        let started = Instant::now();
        store.save(&state, "Medium").unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["curriculum_level_idx"], json!(2));
        assert_eq!(written["games_at_current_level"], json!(7));
    }

    #[test]
    fn stats_load_ignores_curriculum_keys() {
        fn mixed(_: &Path) -> io::Result<String> {
            Ok(r#"{"curriculum_level_idx": 1, "win_count": 40, "game_count": 52, "last_result": "DEFEAT"}"#
                .to_string())
        }
        let stats = store_with_reader(mixed).load_stats().unwrap().unwrap();
        assert_eq!(stats.win_count, 40);
        assert_eq!(stats.game_count, 52);
        assert_eq!(stats.loss_count, 0);
        assert_eq!(stats.last_result, Some(crate::window::GameOutcome::Loss));
    }

    #[test]
    fn memory_store_failures() {
        let mut store = MemoryStore::failing();
        assert!(store.load().is_err());
        assert!(store.save(&CurriculumState::default(), "VeryEasy").is_err());
        assert_eq!(store.saves(), 0);
    }
}
