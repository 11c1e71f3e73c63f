use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::models::{QueueError, QueueRegistry};

/// Snapshot save/load failures
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse snapshot {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot {0:?} does not contain a JSON object")]
    NotAnObject(PathBuf),

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a single snapshot entry was not restored
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("invalid data format (expected an object with 'size' and 'items')")]
    InvalidFormat,

    #[error("invalid items format (expected a list)")]
    InvalidItems,

    #[error("error during init: {0}")]
    Construction(#[from] QueueError),
}

/// A snapshot entry that was skipped during load
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

/// Summary of a completed load
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Number of queues recreated
    pub loaded: usize,
    /// Entries that failed validation, in key order
    pub skipped: Vec<SkippedEntry>,
}

/// Result of a load that did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Snapshot file does not exist, registry left untouched
    NotFound,
    /// Registry was replaced by the snapshot contents
    Loaded(LoadReport),
}

impl LoadOutcome {
    /// Number of queues recreated (0 when nothing was loaded)
    pub fn loaded_count(&self) -> usize {
        match self {
            LoadOutcome::NotFound => 0,
            LoadOutcome::Loaded(report) => report.loaded,
        }
    }
}

/// On-disk form of one queue
#[derive(Debug, Serialize)]
struct QueueRecord {
    size: usize,
    items: Vec<Value>,
}

/// Trait for registry snapshot persistence
pub trait SnapshotStorage: Send + Sync {
    /// Replace the registry contents with the stored snapshot
    fn load(&self, registry: &mut QueueRegistry) -> Result<LoadOutcome, SnapshotError>;

    /// Write every registry entry to storage, returns the number of queues saved
    fn save(&self, registry: &QueueRegistry) -> Result<usize, SnapshotError>;

    /// Get the storage file path
    fn path(&self) -> &PathBuf;
}

/// JSON implementation of SnapshotStorage
/// Keys are written sorted with 4-space indentation; writes go through a .tmp file
pub struct JsonSnapshotStorage {
    path: PathBuf,
}

impl JsonSnapshotStorage {
    /// Create a new JsonSnapshotStorage bound to the given file
    pub fn new(path: PathBuf) -> Self {
        JsonSnapshotStorage { path }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn io_error(&self, source: io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn encode(registry: &QueueRegistry) -> Result<Vec<u8>, SnapshotError> {
        let snapshot: BTreeMap<&str, QueueRecord> = registry
            .iter()
            .map(|(name, handle)| {
                let queue = handle.borrow();
                let record = QueueRecord {
                    size: queue.capacity(),
                    items: queue.items().cloned().collect(),
                };
                (name, record)
            })
            .collect();

        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
        snapshot.serialize(&mut serializer)?;

        Ok(bytes)
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.tmp_path();
        if let Err(e) = fs::write(&tmp_path, bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(SnapshotError::Io {
                path: tmp_path,
                source: e,
            });
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }

        Ok(())
    }

    fn read_entries(&self) -> Result<Map<String, Value>, SnapshotError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;

        let value: Value =
            serde_json::from_str(&contents).map_err(|e| SnapshotError::Parse {
                path: self.path.clone(),
                source: e,
            })?;

        match value {
            Value::Object(entries) => Ok(entries),
            _ => Err(SnapshotError::NotAnObject(self.path.clone())),
        }
    }
}

/// Recreate one queue from its snapshot record
fn restore_entry(registry: &mut QueueRegistry, name: &str, data: Value) -> Result<(), SkipReason> {
    let Value::Object(mut fields) = data else {
        return Err(SkipReason::InvalidFormat);
    };
    let (Some(size), Some(items)) = (fields.remove("size"), fields.remove("items")) else {
        return Err(SkipReason::InvalidFormat);
    };
    let Value::Array(items) = items else {
        return Err(SkipReason::InvalidItems);
    };

    let capacity = size
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            QueueError::InvalidArgument(format!(
                "capacity must be a positive integer, got {}",
                size
            ))
        })?;

    let handle = registry.create(name, capacity)?;
    handle.borrow_mut().replace_items(items);

    Ok(())
}

impl SnapshotStorage for JsonSnapshotStorage {
    fn load(&self, registry: &mut QueueRegistry) -> Result<LoadOutcome, SnapshotError> {
        if !self.path.exists() {
            log::info!("Snapshot file {:?} not found, no queues loaded", self.path);
            return Ok(LoadOutcome::NotFound);
        }

        // An unreadable snapshot still empties the registry
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Error loading queues from {:?}: {}", self.path, e);
                registry.clear();
                return Err(e);
            }
        };

        registry.clear();

        let mut report = LoadReport::default();
        for (name, data) in entries {
            match restore_entry(registry, &name, data) {
                Ok(()) => report.loaded += 1,
                Err(reason) => {
                    log::warn!("Skipping load for queue '{}': {}", name, reason);
                    report.skipped.push(SkippedEntry { name, reason });
                }
            }
        }

        log::info!(
            "Loaded {} queues from {:?} ({} skipped)",
            report.loaded,
            self.path,
            report.skipped.len()
        );

        Ok(LoadOutcome::Loaded(report))
    }

    fn save(&self, registry: &QueueRegistry) -> Result<usize, SnapshotError> {
        let result = Self::encode(registry).and_then(|bytes| self.write_atomic(&bytes));

        match result {
            Ok(()) => {
                log::info!("Saved {} queues to {:?}", registry.len(), self.path);
                Ok(registry.len())
            }
            Err(e) => {
                log::error!(
                    "Error saving {} queues to {:?}: {}",
                    registry.len(),
                    self.path,
                    e
                );
                Err(e)
            }
        }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }
}
