//! Training store adapters.
//!
//! | Store         | Dataset                          | Model                      |
//! |---------------|----------------------------------|----------------------------|
//! | `FileStore`   | `dataset.jsonl`, append + flush  | `model.bin`, tmp + rename  |
//! | `MemoryStore` | `Vec<FeedbackEvent>`             | postcard bytes in memory   |
//!
//! The dataset file is append-only JSON Lines: a crash can at worst leave
//! one truncated trailing line, which [`FileStore::load_dataset`] skips.
//! Seeding and profile switches rewrite it whole through a temp file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::TrainingStore;
use crate::comfort::{EnsembleModel, FeedbackEvent};
use crate::error::StorageError;

const DATASET_FILE: &str = "dataset.jsonl";
const MODEL_FILE: &str = "model.bin";
const MODEL_TMP_FILE: &str = "model.bin.tmp";

// ───────────────────────────────────────────────────────────────
// File-backed store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dataset_path(&self) -> PathBuf {
        self.dir.join(DATASET_FILE)
    }

    fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }
}

fn not_found_as(e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound
    } else {
        StorageError::Io(e)
    }
}

impl TrainingStore for FileStore {
    fn load_dataset(&mut self) -> Result<Vec<FeedbackEvent>, StorageError> {
        let file = File::open(self.dataset_path()).map_err(not_found_as)?;
        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!("STORE: skipping {DATASET_FILE} line {}: {e}", n + 1),
            }
        }
        debug!("STORE: read {} samples", events.len());
        Ok(events)
    }

    fn append_feedback(&mut self, event: &FeedbackEvent) -> Result<(), StorageError> {
        let mut record =
            serde_json::to_string(event).map_err(|e| StorageError::Corrupted(e.to_string()))?;
        record.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dataset_path())?;
        file.write_all(record.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn save_dataset(&mut self, events: &[FeedbackEvent]) -> Result<(), StorageError> {
        let tmp = self.dir.join(format!("{DATASET_FILE}.tmp"));
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for event in events {
                serde_json::to_writer(&mut w, event)
                    .map_err(|e| StorageError::Corrupted(e.to_string()))?;
                w.write_all(b"\n")?;
            }
            w.flush()?;
        }
        fs::rename(&tmp, self.dataset_path())?;
        Ok(())
    }

    fn load_model(&mut self) -> Result<EnsembleModel, StorageError> {
        let bytes = fs::read(self.model_path()).map_err(not_found_as)?;
        EnsembleModel::from_bytes(&bytes)
    }

    fn save_model(&mut self, model: &EnsembleModel) -> Result<(), StorageError> {
        let bytes = model.to_bytes()?;
        let tmp = self.dir.join(MODEL_TMP_FILE);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.model_path())?;
        debug!("STORE: wrote model v{} ({} bytes)", model.version(), bytes.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory store (tests, replay with --ephemeral)
// ───────────────────────────────────────────────────────────────

/// Volatile store.  The model is kept serialised so loading it goes
/// through the same decode path as a file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dataset: Option<Vec<FeedbackEvent>>,
    model: Option<Vec<u8>>,
    appended: usize,
    models_saved: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feedback events appended since creation.
    pub fn feedback_appended(&self) -> usize {
        self.appended
    }

    pub fn models_saved(&self) -> usize {
        self.models_saved
    }
}

impl TrainingStore for MemoryStore {
    fn load_dataset(&mut self) -> Result<Vec<FeedbackEvent>, StorageError> {
        self.dataset.clone().ok_or(StorageError::NotFound)
    }

    fn append_feedback(&mut self, event: &FeedbackEvent) -> Result<(), StorageError> {
        self.dataset.get_or_insert_with(Vec::new).push(event.clone());
        self.appended += 1;
        Ok(())
    }

    fn save_dataset(&mut self, events: &[FeedbackEvent]) -> Result<(), StorageError> {
        self.dataset = Some(events.to_vec());
        Ok(())
    }

    fn load_model(&mut self) -> Result<EnsembleModel, StorageError> {
        let bytes = self.model.as_deref().ok_or(StorageError::NotFound)?;
        EnsembleModel::from_bytes(bytes)
    }

    fn save_model(&mut self, model: &EnsembleModel) -> Result<(), StorageError> {
        self.model = Some(model.to_bytes()?);
        self.models_saved += 1;
        Ok(())
    }
}
