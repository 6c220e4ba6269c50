//! Configuration document stores
//!
//! A store maps a document name to its serialized text. Entities are
//! written as pretty-printed JSON so files stay reviewable by hand.

use crate::error::{Result, StagingError};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

/// Named document storage
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send + Sync {
    /// Contents of `name`, or `None` if it was never written
    fn read(&self, name: &str) -> Result<Option<String>>;

    fn write(&self, name: &str, contents: &str) -> Result<()>;

    /// Names of all stored documents, sorted
    fn list(&self) -> Result<Vec<String>>;
}

/// One `<name>.json` file per document under a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl ConfigStore for JsonFileStore {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Readers never observe a half-written document; concurrent writers
        // each get their own temp file
        let target = self.path_for(name);
        let temp = self.dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
        fs::write(&temp, contents)?;
        fs::rename(&temp, &target)?;

        debug!("Wrote {} ({} bytes)", target.display(), contents.len());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<String, String>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.documents.get(name).map(|doc| doc.value().clone())
    }
}

impl ConfigStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name))
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        self.documents.insert(name.to_string(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.documents.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

/// Load `name` from `store`, falling back to defaults when absent
///
/// A document that exists but does not parse is an error; it is never
/// silently replaced.
pub fn load_or_default<T>(store: &dyn ConfigStore, name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.read(name)? {
        Some(contents) => serde_json::from_str(&contents).map_err(|e| {
            StagingError::Persistence(format!("failed to parse {}: {}", name, e))
        }),
        None => {
            info!("No stored {} config, using defaults", name);
            Ok(T::default())
        }
    }
}

pub fn save_entity<T>(store: &dyn ConfigStore, name: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let contents = serde_json::to_string_pretty(value)?;
    store.write(name, &contents)
}
