use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("local folder not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One candidate file, recomputed on every scan. Timestamps come straight
/// from filesystem metadata as UTC instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: OffsetDateTime,
}

/// Fresh scan of the direct file entries of `dir`. Subdirectories are
/// skipped, never descended into.
pub async fn scan_folder(dir: &Path) -> Result<Vec<LocalFileEntry>, ScanError> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::NotFound(dir.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };

    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let file_type = entry.file_type().await?;
        if !file_type.is_file() {
            continue;
        }
        let metadata = entry.metadata().await?;
        let modified = OffsetDateTime::from(metadata.modified()?);
        entries.push(LocalFileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            modified,
        });
    }
    Ok(entries)
}
