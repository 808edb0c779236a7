use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::message::RawMessage;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open archive {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("archive {path} is not a JSON array of messages: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Reads the whole persisted message collection.
pub fn load(path: &Path) -> Result<Vec<RawMessage>, ArchiveError> {
    let f = File::open(path).map_err(|source| ArchiveError::Io { path: path.to_path_buf(), source })?;
    let messages: Vec<RawMessage> = serde_json::from_reader(BufReader::new(f))
        .map_err(|source| ArchiveError::Json { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), count = messages.len(), "loaded archive");
    Ok(messages)
}

/// Replaces the archive with `messages`, pretty-printed.
pub fn save(path: &Path, messages: &[RawMessage]) -> Result<(), ArchiveError> {
    let io_err = |source: std::io::Error| ArchiveError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let f = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, messages)
        .map_err(|source| ArchiveError::Json { path: path.to_path_buf(), source })?;
    w.flush().map_err(io_err)?;
    info!(path = %path.display(), count = messages.len(), "saved archive");
    Ok(())
}
