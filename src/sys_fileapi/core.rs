//! Core file-API logic: no Hyper types here.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::{Stream, TryStreamExt, pin_mut};
use serde::Serialize;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::sys_core::state::AppState;
use crate::sys_metadata::MetadataError;

/// Upload data is written to disk in pieces of this size.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Uploads in progress live here and are renamed into the root when complete.
/// Listing and delete-all only consider regular files, so this directory is
/// invisible to them, and validated names cannot reach into it.
const PARTIAL_DIR: &str = ".partial";

static PART_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum FileApiError {
    #[error("Invalid filename: {0}")]
    InvalidName(String),
    #[error("File not found")]
    NotFound,
    #[error("File has expired")]
    Expired,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Metadata(#[from] MetadataError),
    #[error("upload stream error: {0}")]
    Stream(#[from] multer::Error),
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub upload_time: Option<String>,
    pub content_type: String,
}

/// Outcome of removing every file in the upload directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoveAllReport {
    pub removed: usize,
    pub failed: usize,
}

/// Reject names that are empty, contain separators or control characters,
/// or are reserved on Windows.
pub fn validate_filename(name: &str) -> Result<(), FileApiError> {
    let options = sanitize_filename::Options {
        windows: true,
        truncate: true,
        replacement: "",
    };
    if name.is_empty() || sanitize_filename::sanitize_with_options(name, options) != name {
        return Err(FileApiError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// `true` once more than `window` has passed since `uploaded_at`. A window
/// too large to represent never expires.
pub fn is_expired(uploaded_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| uploaded_at.checked_add_signed(window))
        .is_some_and(|end| now > end)
}

/// The directory holding uploaded files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.root.join(PARTIAL_DIR)).await
    }

    pub fn path_for(&self, filename: &str) -> Result<PathBuf, FileApiError> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// Write `stream` to `filename`, replacing any existing file. Returns the
    /// number of bytes written.
    ///
    /// The data goes to a part file first; the target is only replaced once
    /// the stream has ended cleanly, so a failed upload leaves storage as it
    /// was.
    pub async fn save_stream<S, E>(&self, filename: &str, stream: S) -> Result<u64, FileApiError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        FileApiError: From<E>,
    {
        let path = self.path_for(filename)?;
        let partial_dir = self.root.join(PARTIAL_DIR);
        fs::create_dir_all(&partial_dir).await?;
        let part = partial_dir.join(format!(
            "{}-{}.part",
            std::process::id(),
            PART_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = match write_chunked(&part, stream).await {
            Ok(written) => fs::rename(&part, &path)
                .await
                .map(|()| written)
                .map_err(|e: std::io::Error| FileApiError::Io(e)),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = fs::remove_file(&part).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %part.display(), error = %e, "could not remove part file");
                }
            }
        }
        result
    }

    /// Names of the regular files in the directory, in iteration order.
    pub async fn list(&self) -> std::io::Result<Vec<String>> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Delete a file by name.
    ///
    /// Return `Ok(true)` if deleted, `Ok(false)` if it didn't exist.
    pub async fn remove(&self, filename: &str) -> Result<bool, FileApiError> {
        let path = self.path_for(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every regular file through `remove`, normally [`remove_path`].
    /// Individual failures are logged and counted.
    pub async fn remove_all_with<F, Fut>(&self, remove: F) -> std::io::Result<RemoveAllReport>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = std::io::Result<()>>,
    {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut report = RemoveAllReport::default();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match remove(entry.path()).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "could not remove file");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

pub async fn remove_path(path: PathBuf) -> std::io::Result<()> {
    fs::remove_file(path).await
}

/// Stream into a fresh file at `path` in `CHUNK_SIZE` pieces.
async fn write_chunked<S, E>(path: &std::path::Path, stream: S) -> Result<u64, FileApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    FileApiError: From<E>,
{
    pin_mut!(stream);
    let mut file = fs::File::create(path).await?;
    let mut pending = BytesMut::with_capacity(CHUNK_SIZE);
    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        pending.extend_from_slice(&chunk);
        while pending.len() >= CHUNK_SIZE {
            let piece = pending.split_to(CHUNK_SIZE);
            file.write_all(&piece).await?;
            written += piece.len() as u64;
        }
    }
    if !pending.is_empty() {
        file.write_all(&pending).await?;
        written += pending.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Save the multipart field for `filename` and record its upload time.
pub async fn api_upload_field(
    state: &AppState,
    filename: &str,
    field: multer::Field<'static>,
) -> Result<UploadResponse, FileApiError> {
    let bytes = state.storage.save_stream(filename, field).await?;
    state.metadata.record(filename, Utc::now()).await?;
    info!(file = %filename, bytes, "file uploaded");
    Ok(UploadResponse {
        filename: filename.to_string(),
    })
}

/// Every stored file with its upload time and content type.
pub async fn api_list_files(state: &AppState) -> Result<Vec<FileEntry>, FileApiError> {
    let names = state.storage.list().await?;
    let uploaded = state.metadata.snapshot().await;
    Ok(names
        .into_iter()
        .map(|filename| FileEntry {
            upload_time: uploaded
                .get(&filename)
                .map(crate::sys_metadata::core::format_timestamp),
            content_type: state.content_types.content_type(&filename),
            filename,
        })
        .collect())
}

/// A file cleared for download.
pub struct FetchedFile {
    pub file: fs::File,
    pub len: u64,
}

/// Open `filename` for download if it exists and its expiry window, counted
/// from the recorded upload time (or mtime when unrecorded), has not passed.
///
/// The file's mtime is only a fallback: a recorded upload time wins even if
/// the file was touched or rewritten outside the service since. Symlinks are
/// not followed, matching what the listing shows.
pub async fn api_fetch_file(
    state: &AppState,
    filename: &str,
    now: DateTime<Utc>,
) -> Result<FetchedFile, FileApiError> {
    let path = state.storage.path_for(filename)?;
    let meta = match fs::symlink_metadata(&path).await {
        Ok(m) if m.file_type().is_file() => m,
        Ok(_) => return Err(FileApiError::NotFound),
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(FileApiError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let uploaded_at = match state.metadata.get(filename).await {
        Some(at) => at,
        None => DateTime::<Utc>::from(meta.modified()?),
    };
    if is_expired(uploaded_at, now, state.config.expiry()) {
        return Err(FileApiError::Expired);
    }

    let file = fs::File::open(&path).await?;
    Ok(FetchedFile {
        file,
        len: meta.len(),
    })
}

/// Remove all files, then reset the metadata store whatever the outcome of
/// the individual removals.
pub async fn api_delete_all(state: &AppState) -> Result<RemoveAllReport, FileApiError> {
    api_delete_all_with(state, remove_path).await
}

async fn api_delete_all_with<F, Fut>(
    state: &AppState,
    remove: F,
) -> Result<RemoveAllReport, FileApiError>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let report = state.storage.remove_all_with(remove).await?;
    state.metadata.clear().await?;
    info!(removed = report.removed, failed = report.failed, "all files deleted");
    Ok(report)
}

pub async fn api_delete_file(state: &AppState, filename: &str) -> Result<(), FileApiError> {
    if !state.storage.remove(filename).await? {
        return Err(FileApiError::NotFound);
    }
    state.metadata.remove(filename).await?;
    info!(file = %filename, "file deleted");
    Ok(())
}
