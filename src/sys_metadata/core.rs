//! Upload-time records kept in a JSON sidecar file.
//!
//! The whole mapping lives in memory and is rewritten in full after every
//! mutation. Writes go to `<sidecar>.tmp` first and are renamed into place,
//! all while the store lock is held.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Entries = HashMap<String, DateTime<Utc>>;

pub struct MetadataStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl MetadataStore {
    /// Load the sidecar at `path`.
    ///
    /// A missing file gives an empty store. A file that cannot be read or
    /// parsed is logged and also treated as empty; it is replaced on the
    /// next write.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path).await {
            Ok(entries) => entries,
            Err(MetadataError::Io(e)) if e.kind() == ErrorKind::NotFound => Entries::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable metadata file");
                Entries::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "metadata loaded");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub async fn get(&self, filename: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().await.get(filename).copied()
    }

    pub async fn snapshot(&self) -> Entries {
        self.entries.lock().await.clone()
    }

    /// Insert or overwrite the upload time of `filename` and persist.
    pub async fn record(&self, filename: &str, at: DateTime<Utc>) -> Result<(), MetadataError> {
        let mut entries = self.entries.lock().await;
        entries.insert(filename.to_string(), at);
        persist(&self.path, &entries).await
    }

    /// Drop the entry for `filename` and persist. Returns whether an entry
    /// existed.
    pub async fn remove(&self, filename: &str) -> Result<bool, MetadataError> {
        let mut entries = self.entries.lock().await;
        let existed = entries.remove(filename).is_some();
        persist(&self.path, &entries).await?;
        Ok(existed)
    }

    /// Forget everything and delete the sidecar file.
    ///
    /// The in-memory mapping is emptied even when the file removal fails.
    pub async fn clear(&self) -> Result<(), MetadataError> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn read_entries(path: &Path) -> Result<Entries, MetadataError> {
    let raw = fs::read(path).await?;
    let stored: HashMap<String, String> = serde_json::from_slice(&raw)?;
    let mut entries = Entries::with_capacity(stored.len());
    for (name, stamp) in stored {
        match parse_timestamp(&stamp) {
            Some(at) => {
                entries.insert(name, at);
            }
            None => warn!(file = %name, value = %stamp, "skipping unparseable upload time"),
        }
    }
    Ok(entries)
}

async fn persist(path: &Path, entries: &Entries) -> Result<(), MetadataError> {
    let stored: HashMap<&str, String> = entries
        .iter()
        .map(|(name, at)| (name.as_str(), format_timestamp(at)))
        .collect();
    let json = serde_json::to_vec(&stored)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and offset-less ISO-8601 (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
