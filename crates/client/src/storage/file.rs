// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-file store with atomic writes and a `notify` watcher that surfaces
//! changes made by other processes sharing the same state file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{KeyValueStore, StorageChange};

const STATE_FILE: &str = "client-state.json";

struct Shared {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
    change_tx: broadcast::Sender<StorageChange>,
}

/// Store persisted as a flat JSON object in `<dir>/client-state.json`.
pub struct FileStore {
    shared: Arc<Shared>,
    _watcher: Mutex<Option<notify::RecommendedWatcher>>,
}

impl FileStore {
    /// Open (or create) the store in `dir` and start watching it.
    ///
    /// A missing or corrupt file starts empty. Watcher setup failure is logged
    /// and leaves the store working without external change notifications.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATE_FILE);
        let values = match load(&path) {
            Ok(values) => values,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), err = %e, "ignoring unreadable state file");
                }
                HashMap::new()
            }
        };
        let (change_tx, _) = broadcast::channel(64);
        let shared = Arc::new(Shared { path, values: Mutex::new(values), change_tx });
        let watcher = setup_watcher(Arc::clone(&shared), dir);
        if watcher.is_none() {
            tracing::warn!(dir = %dir.display(), "state file watcher unavailable");
        }
        Ok(Self { shared, _watcher: Mutex::new(watcher) })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Apply `f` to a copy of the cache, save it, and only then swap it in.
    /// `f` returns false when nothing changed. The disk write happens under
    /// the lock so a concurrent reload never sees the file behind the cache.
    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>) -> bool) -> anyhow::Result<()> {
        let mut values = self.shared.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        if !f(&mut next) {
            return Ok(());
        }
        save(&self.shared.path, &next)?;
        *values = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.values.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.update(|values| {
            values.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.update(|values| values.remove(key).is_some())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.shared.change_tx.subscribe()
    }
}

fn setup_watcher(shared: Arc<Shared>, dir: &Path) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let file_name = shared.path.file_name().map(|n| n.to_owned());
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else {
            return;
        };
        let ours = event.paths.iter().any(|p| p.file_name() == file_name.as_deref());
        if ours {
            reload(&shared);
        }
    })
    .ok()?;
    watcher.watch(dir, RecursiveMode::NonRecursive).ok()?;
    Some(watcher)
}

/// Re-read the file and emit a change for every key that differs from the
/// cache. Our own writes already match the cache, so they emit nothing.
fn reload(shared: &Shared) {
    let mut values = shared.values.lock().unwrap_or_else(|e| e.into_inner());
    let fresh = match load(&shared.path) {
        Ok(fresh) => fresh,
        Err(e) => {
            tracing::debug!(err = %e, "state file reload skipped");
            return;
        }
    };
    let changes = diff(&values, &fresh);
    if changes.is_empty() {
        return;
    }
    *values = fresh;
    drop(values);
    for change in changes {
        tracing::debug!(key = %change.key, "external state change");
        let _ = shared.change_tx.send(change);
    }
}

fn diff(old: &HashMap<String, String>, new: &HashMap<String, String>) -> Vec<StorageChange> {
    let mut changes: Vec<StorageChange> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| StorageChange { key: k.clone(), value: Some(v.clone()) })
        .collect();
    changes.extend(
        old.keys()
            .filter(|k| !new.contains_key(*k))
            .map(|k| StorageChange { key: k.clone(), value: None }),
    );
    changes
}

fn load(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    let values: HashMap<String, String> = serde_json::from_str(&contents)?;
    Ok(values)
}

/// Save atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves from
/// several processes never interleave in one `.tmp` file.
fn save(path: &Path, values: &HashMap<String, String>) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(values)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
