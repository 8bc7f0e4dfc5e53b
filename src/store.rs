//! Durable per-destination state.
//!
//! One JSON object mapping chat id to [`Destination`], rewritten wholesale
//! on every mutation. Writes go through a sibling temp file followed by a
//! rename so readers never observe a torn file. Destination counts are
//! small and writes are at most once per minute per chat, so the
//! full-rewrite discipline stays simple and cheap.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Result, WirdError};
use crate::trigger::TimeOfDay;

/// Per-chat delivery state and configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    /// Next mushaf page to send, in [1, 604].
    pub page_cursor: u16,
    /// Next khatma part to remind about, in [1, 30].
    pub part_cursor: u8,
    /// Completed khatma cycles. Only ever incremented.
    pub completed_khatmas: u32,
    /// Times of day at which page deliveries fire. Empty set: never fires.
    pub page_times: BTreeSet<TimeOfDay>,
    /// Times of day at which khatma reminders fire.
    pub reminder_times: BTreeSet<TimeOfDay>,
    /// Whether page deliveries are evaluated at all.
    pub pages_active: bool,
    /// Whether khatma reminders are evaluated at all.
    pub reminder_active: bool,
    /// Marker of the last honoured page trigger.
    pub last_pages_marker: Option<String>,
    /// Marker of the last honoured reminder trigger.
    pub last_reminder_marker: Option<String>,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            page_cursor: 1,
            part_cursor: 1,
            completed_khatmas: 0,
            page_times: BTreeSet::new(),
            reminder_times: BTreeSet::new(),
            pages_active: true,
            reminder_active: true,
            last_pages_marker: None,
            last_reminder_marker: None,
        }
    }
}

/// Keyed store of all destinations, persisted as a single JSON file.
///
/// All mutation goes through [`StateStore::upsert`], [`StateStore::register`]
/// and [`StateStore::remove`], which hold the lock across mutate + persist so
/// concurrent writers (scheduler tick, command handlers) serialise.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, Destination>>,
    /// Set when the last persist failed, so [`StateStore::flush`] knows the
    /// file lags behind the in-memory mapping.
    dirty: AtomicBool,
}

impl StateStore {
    /// Load the store from `path`.
    ///
    /// A missing or empty file yields an empty mapping. An unparseable
    /// file yields [`WirdError::CorruptState`]; callers must surface it
    /// rather than wiping destination data.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let destinations = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                WirdError::CorruptState(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            "loaded {} destination(s) from {}",
            destinations.len(),
            path.display()
        );
        Ok(Self {
            path,
            inner: Mutex::new(destinations),
            dirty: AtomicBool::new(false),
        })
    }

    /// Retry a previously failed persist. A no-op while the state file is
    /// current; the scheduler calls this at the start of every tick so an
    /// advanced cursor never sits unpersisted for longer than one tick.
    pub fn flush(&self) -> Result<()> {
        if !self.dirty.load(Ordering::Relaxed) {
            return Ok(());
        }
        let map = self.lock();
        self.persist(&map)
    }

    /// A consistent copy of the whole mapping, for tick iteration and
    /// status display. Holds the lock only for the clone.
    pub fn snapshot(&self) -> HashMap<String, Destination> {
        self.lock().clone()
    }

    /// Look up one destination.
    pub fn get(&self, id: &str) -> Option<Destination> {
        self.lock().get(id).cloned()
    }

    /// Insert a default destination if `id` is unknown and persist.
    /// Returns `true` when the entry was newly created.
    pub fn register(&self, id: &str) -> Result<bool> {
        let mut map = self.lock();
        if map.contains_key(id) {
            return Ok(false);
        }
        map.insert(id.to_owned(), Destination::default());
        self.persist(&map)?;
        Ok(true)
    }

    /// Apply `mutate` to an existing destination and persist immediately.
    /// Returns `false` (without persisting) when `id` is unknown; the
    /// scheduler never creates destinations implicitly.
    pub fn upsert<F>(&self, id: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Destination),
    {
        let mut map = self.lock();
        let Some(destination) = map.get_mut(id) else {
            return Ok(false);
        };
        mutate(destination);
        self.persist(&map)?;
        Ok(true)
    }

    /// Delete a destination and persist. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut map = self.lock();
        if map.remove(id).is_none() {
            return Ok(());
        }
        self.persist(&map)
    }

    /// Number of known destinations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store has no destinations.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Destination>> {
        // A poisoned lock means a panic mid-mutation; the map itself is
        // still structurally sound, so keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, map: &HashMap<String, Destination>) -> Result<()> {
        let result = self.write_file(map);
        self.dirty.store(result.is_err(), Ordering::Relaxed);
        result
    }

    /// Atomic whole-file replace: serialise, write a sibling temp file,
    /// rename over the target.
    fn write_file(&self, map: &HashMap<String, Destination>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| WirdError::Persistence(format!("create state dir: {e}")))?;
            }
        }

        let json = serde_json::to_vec_pretty(map)
            .map_err(|e| WirdError::Persistence(format!("serialize state: {e}")))?;

        let tmp = temp_sibling(&self.path);
        std::fs::write(&tmp, &json)
            .map_err(|e| WirdError::Persistence(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            WirdError::Persistence(format!("replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
