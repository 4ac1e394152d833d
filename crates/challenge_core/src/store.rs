use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::StoreError;

pub const CHALLENGE_KEY: &str = "@75challenge_data";
pub const HABITS_KEY: &str = "@75challenge_habits";
pub const USER_KEY: &str = "@75challenge_user";
pub const FIRST_TIME_KEY: &str = "@75challenge_first_time";
pub const DAY_COMPLETIONS_KEY: &str = "@75challenge_day_completions";

/// Keys older builds wrote to; removed on logout along with the current ones.
const LEGACY_KEYS: &[&str] = &["challenge-data", "habits-data", "user-data"];

const APP_KEY_PATTERNS: &[&str] = &[
    "@75challenge",
    "75challenge",
    "challenge",
    "habit",
    "user",
    "first_time",
    "welcome",
    "profile",
    "settings",
];

const RESIDUE_PATTERNS: &[&str] = &["75challenge", "challenge", "habit"];

/// Durable string key-value storage shared by every persisted entity.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per entry inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    const EXTENSION: &'static str = "json";

    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{}", Self::EXTENSION)))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(&path, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|err| Self::io_error(&self.root, err))?;
        // entries are replaced by rename, never written in place
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).map_err(|err| Self::io_error(&staging, err))?;
        fs::rename(&staging, &path).map_err(|err| Self::io_error(&path, err))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_error(&path, err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Self::io_error(&self.root, err)),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Self::io_error(&self.root, err))?;
            let path = entry.path();
            let is_entry = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == Self::EXTENSION);
            if !is_entry {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Removes every key the app owns, including legacy ones, and returns what was removed.
pub fn clear_all_app_data(store: &dyn KeyValueStore) -> Result<Vec<String>, StoreError> {
    let mut targets: Vec<String> = store
        .keys()?
        .into_iter()
        .filter(|key| {
            let lower = key.to_lowercase();
            APP_KEY_PATTERNS
                .iter()
                .any(|pattern| lower.contains(pattern))
        })
        .collect();
    for known in [
        CHALLENGE_KEY,
        HABITS_KEY,
        USER_KEY,
        FIRST_TIME_KEY,
        DAY_COMPLETIONS_KEY,
    ]
    .into_iter()
    .chain(LEGACY_KEYS.iter().copied())
    {
        if !targets.iter().any(|key| key == known) {
            targets.push(known.to_string());
        }
    }

    for key in &targets {
        store.remove(key)?;
    }
    tracing::info!(count = targets.len(), "cleared app data");
    tracing::debug!(keys = ?targets, "removed keys");
    Ok(targets)
}

/// `true` when no challenge or habit data is left in `store`.
pub fn verify_data_cleared(store: &dyn KeyValueStore) -> bool {
    let keys = match store.keys() {
        Ok(keys) => keys,
        Err(err) => {
            tracing::error!(%err, "unable to list keys while verifying wipe");
            return false;
        }
    };
    let residue: Vec<&String> = keys
        .iter()
        .filter(|key| RESIDUE_PATTERNS.iter().any(|pattern| key.contains(pattern)))
        .collect();
    if residue.is_empty() {
        return true;
    }
    tracing::warn!(keys = ?residue, "app data left behind after wipe");
    false
}
