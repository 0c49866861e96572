use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Body;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use gdrive_core::{DriveClient, DriveError};

use crate::report::{Level, Reporter};

use super::scanner::{LocalFileEntry, ScanError, scan_folder};
use super::state::{FolderState, read_folder_state};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("api error: {0}")]
    Api(#[from] DriveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("time parse error: {0}")]
    Time(#[from] time::error::Parse),
    #[error("local path missing: {}", .0.display())]
    LocalPathMissing(PathBuf),
    #[error("{count} remote folders named {name:?} share one parent")]
    FolderCollision { name: String, count: usize },
}

impl EngineError {
    /// Auth failures make the rest of the run unusable; every other error
    /// stays scoped to the file or item it hit.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Api(err) => err.is_auth(),
            _ => false,
        }
    }
}

/// Per-file classification against the folder's fixed baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    Create,
    Update { file_id: String },
    Skip,
}

/// A name with no remote counterpart is uploaded regardless of its
/// timestamp. A known name is compared against the folder-wide baseline,
/// not against its own remote copy; an unrelated newer sibling can therefore
/// mask a stale counterpart. That coarseness is intentional: one listing per
/// folder instead of one query per file.
pub fn classify(entry: &LocalFileEntry, state: &FolderState) -> SyncDecision {
    match state.id_for(&entry.name) {
        None => SyncDecision::Create,
        Some(id) if entry.modified > state.baseline => SyncDecision::Update {
            file_id: id.to_string(),
        },
        Some(_) => SyncDecision::Skip,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Created,
    Updated,
}

pub struct SyncEngine {
    client: DriveClient,
    reporter: Arc<dyn Reporter>,
}

impl SyncEngine {
    pub fn new(client: DriveClient, reporter: Arc<dyn Reporter>) -> Self {
        Self { client, reporter }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    /// One sync pass over a tracked folder: capture the remote state once,
    /// scan the local folder, classify and upload each candidate in scan
    /// order. A failed upload is reported and counted without aborting the
    /// remaining files.
    pub async fn sync_folder(
        &self,
        local_dir: &Path,
        folder_id: &str,
    ) -> Result<FolderReport, EngineError> {
        let state = read_folder_state(&self.client, folder_id).await?;
        let entries = match scan_folder(local_dir).await {
            Ok(entries) => entries,
            Err(ScanError::NotFound(path)) => return Err(EngineError::LocalPathMissing(path)),
            Err(err) => return Err(err.into()),
        };

        let mut report = FolderReport::default();
        for entry in &entries {
            let outcome = match classify(entry, &state) {
                SyncDecision::Skip => {
                    report.skipped += 1;
                    continue;
                }
                SyncDecision::Create => self
                    .upload_new(folder_id, entry)
                    .await
                    .map(|()| FileAction::Created),
                SyncDecision::Update { file_id } => self
                    .replace_content(&file_id, &entry.path)
                    .await
                    .map(|()| FileAction::Updated),
            };
            match outcome {
                Ok(FileAction::Created) => {
                    report.created += 1;
                    self.reporter
                        .report(Level::Info, &format!("uploaded: {}", entry.name));
                }
                Ok(FileAction::Updated) => {
                    report.updated += 1;
                    self.reporter
                        .report(Level::Info, &format!("updated: {}", entry.name));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    report.failed += 1;
                    self.reporter.report(
                        Level::Error,
                        &format!("upload failed for {}: {err}", entry.name),
                    );
                }
            }
        }
        Ok(report)
    }

    /// Syncs one standalone tracked file. No baseline is involved: the game
    /// rewrites this file every session, so an existing remote copy is
    /// always overwritten in place.
    pub async fn sync_single_file(
        &self,
        local_file: &Path,
        folder_id: &str,
    ) -> Result<FileAction, EngineError> {
        let metadata = match tokio::fs::metadata(local_file).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::LocalPathMissing(local_file.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        if !metadata.is_file() {
            return Err(EngineError::LocalPathMissing(local_file.to_path_buf()));
        }
        let name = match local_file.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(EngineError::LocalPathMissing(local_file.to_path_buf())),
        };

        let matches = self
            .client
            .find_by_name(Some(folder_id), &name, None)
            .await?;
        let action = match matches.first() {
            Some(existing) => {
                self.replace_content(&existing.id, local_file).await?;
                FileAction::Updated
            }
            None => {
                let created = self.client.create_file(folder_id, &name).await?;
                self.replace_content(&created.id, local_file).await?;
                FileAction::Created
            }
        };
        self.reporter
            .report(Level::Info, &format!("uploaded: {name}"));
        Ok(action)
    }

    async fn upload_new(&self, folder_id: &str, entry: &LocalFileEntry) -> Result<(), EngineError> {
        let created = self.client.create_file(folder_id, &entry.name).await?;
        self.replace_content(&created.id, &entry.path).await
    }

    async fn replace_content(&self, file_id: &str, path: &Path) -> Result<(), EngineError> {
        let body = file_body(path).await?;
        self.client.update_content(file_id, body).await?;
        Ok(())
    }
}

async fn file_body(path: &Path) -> Result<Body, EngineError> {
    let file = tokio::fs::File::open(path).await?;
    Ok(Body::wrap_stream(ReaderStream::new(file)))
}
