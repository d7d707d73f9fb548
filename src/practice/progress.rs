//! ProgressLedger - best accuracy per (tone, progression) across sessions
//!
//! Best values only ever go up. The first time a key's best crosses the
//! pass threshold a one-shot [`PassNotice`] is returned; later records on the
//! same key never produce another one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProgressError;

/// Default pass threshold in percent
pub const DEFAULT_PASS_THRESHOLD: u32 = 60;

/// tone → progression → best accuracy percent
pub type ProgressRecord = BTreeMap<String, BTreeMap<String, u32>>;

/// Payload raised when a key first reaches the pass threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassNotice {
    pub tone: String,
    pub progression: String,
    pub accuracy: u32,
}

/// Persistent key-value backing for the ledger
pub trait ProgressStore: Send {
    fn load(&mut self) -> Result<ProgressRecord, ProgressError>;
    fn save(&mut self, record: &ProgressRecord) -> Result<(), ProgressError>;
}

/// In-memory store, for tests and sessions that should not persist
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: ProgressRecord,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ProgressRecord) -> Self {
        Self { record }
    }
}

impl ProgressStore for MemoryStore {
    fn load(&mut self) -> Result<ProgressRecord, ProgressError> {
        Ok(self.record.clone())
    }

    fn save(&mut self, record: &ProgressRecord) -> Result<(), ProgressError> {
        self.record = record.clone();
        Ok(())
    }
}

/// JSON file store
///
/// A missing file is an empty record. Writes go to a sibling temp file that
/// is renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&mut self) -> Result<ProgressRecord, ProgressError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(ProgressRecord::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ProgressRecord::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, record: &ProgressRecord) -> Result<(), ProgressError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(record)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Monotonic best-accuracy ledger
pub struct ProgressLedger {
    store: Box<dyn ProgressStore>,
    record: ProgressRecord,
    pass_threshold: u32,
}

impl ProgressLedger {
    /// Open a ledger over `store`, loading its current contents
    pub fn open(
        mut store: Box<dyn ProgressStore>,
        pass_threshold: u32,
    ) -> Result<Self, ProgressError> {
        let record = store.load()?;
        log::info!(
            "[ProgressLedger] Loaded {} tone(s), pass threshold {}%",
            record.len(),
            pass_threshold
        );
        Ok(Self {
            store,
            record,
            pass_threshold,
        })
    }

    /// Ledger over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            record: ProgressRecord::new(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    pub fn pass_threshold(&self) -> u32 {
        self.pass_threshold
    }

    /// Stored best for a key, if any session has been recorded
    pub fn best(&self, tone: &str, progression: &str) -> Option<u32> {
        self.record
            .get(tone)
            .and_then(|progressions| progressions.get(progression))
            .copied()
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    /// Record a session accuracy (clamped to 0..=100)
    ///
    /// # Returns
    /// * `Ok(Some(notice))` - the key crossed the pass threshold for the first time
    /// * `Ok(None)` - recorded, no threshold crossing
    ///
    /// # Errors
    /// Store failures. The in-memory entry is rolled back so a later record
    /// of the same key can still cross the threshold and raise the notice.
    pub fn record_accuracy(
        &mut self,
        tone: &str,
        progression: &str,
        accuracy_percent: u32,
    ) -> Result<Option<PassNotice>, ProgressError> {
        let accuracy = accuracy_percent.min(100);
        let current_best = self.best(tone, progression).unwrap_or(0);
        let new_best = current_best.max(accuracy);

        if new_best == current_best && self.best(tone, progression).is_some() {
            return Ok(None);
        }

        let previous = self
            .record
            .entry(tone.to_string())
            .or_default()
            .insert(progression.to_string(), new_best);

        let notice = (current_best < self.pass_threshold && new_best >= self.pass_threshold)
            .then(|| PassNotice {
                tone: tone.to_string(),
                progression: progression.to_string(),
                accuracy: new_best,
            });

        if let Err(err) = self.store.save(&self.record) {
            self.rollback(tone, progression, previous);
            return Err(err);
        }

        if let Some(ref notice) = notice {
            log::info!(
                "[ProgressLedger] Pass: {} / {} at {}%",
                notice.tone,
                notice.progression,
                notice.accuracy
            );
        }
        Ok(notice)
    }

    fn rollback(&mut self, tone: &str, progression: &str, previous: Option<u32>) {
        let Some(progressions) = self.record.get_mut(tone) else {
            return;
        };
        match previous {
            Some(best) => {
                progressions.insert(progression.to_string(), best);
            }
            None => {
                progressions.remove(progression);
                if progressions.is_empty() {
                    self.record.remove(tone);
                }
            }
        }
    }
}
