use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use thiserror::Error;

use crate::models::reminder::Reminder;

pub const CACHE_NAMESPACE: &str = "meditrack_reminders_";

pub fn cache_key(user_id: &str) -> String {
    format!("{CACHE_NAMESPACE}{user_id}")
}

#[derive(Debug, Error)]
pub enum LocalCacheError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Synchronous per-user store holding the full reminder list. Writes always
/// replace the whole list.
pub trait LocalCache: Send + Sync + 'static {
    fn read(&self, user_id: &str) -> Result<Vec<Reminder>, LocalCacheError>;
    fn write(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), LocalCacheError>;
}

/// Keeps one `meditrack_reminders_<user>.json` file per user in a directory.
pub struct FileLocalCache {
    dir: PathBuf,
}

impl FileLocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        let file_stem: String = cache_key(user_id)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        self.dir.join(format!("{file_stem}.json"))
    }
}

impl LocalCache for FileLocalCache {
    fn read(&self, user_id: &str) -> Result<Vec<Reminder>, LocalCacheError> {
        let path = self.path_for(user_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), LocalCacheError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(user_id);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, serde_json::to_vec(reminders)?)?;
        fs::rename(&tmp_path, &path)?;

        Ok(())
    }
}

/// Cache keeping serialized lists in memory, keyed like the file cache.
#[derive(Default)]
pub struct InMemoryLocalCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, user_id: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key(user_id))
            .cloned()
    }
}

impl LocalCache for InMemoryLocalCache {
    fn read(&self, user_id: &str) -> Result<Vec<Reminder>, LocalCacheError> {
        match self.raw(user_id) {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), LocalCacheError> {
        let contents = serde_json::to_string(reminders)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key(user_id), contents);

        Ok(())
    }
}
