//! File Output Module
//!
//! JSON-lines log files with size-based rotation.
//!
//! The active file is `<dir>/portfolio-<YYYY-MM-DD>.log`, dated by the
//! entry's timestamp. Rotation shifts `.log.N` to `.log.N+1` and the active
//! file to `.log.1`, keeping at most `max_files` rotated files.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::LogResult;
use crate::logging::{LogEntry, LogOutput};

// == File Output ==
#[derive(Debug)]
pub struct FileOutput {
    directory: PathBuf,
    max_file_size: u64,
    max_files: usize,
    /// Serializes appends so entries land in call order
    write_lock: Mutex<()>,
}

impl FileOutput {
    pub fn new(directory: impl Into<PathBuf>, max_file_size: u64, max_files: usize) -> Self {
        Self {
            directory: directory.into(),
            max_file_size,
            max_files,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the file that receives `entry`.
    pub fn active_path(&self, entry: &LogEntry) -> PathBuf {
        self.directory
            .join(format!("portfolio-{}.log", entry.timestamp.format("%Y-%m-%d")))
    }

    async fn append(&self, entry: &LogEntry) -> LogResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.directory).await?;

        let path = self.active_path(entry);
        let current_size = match fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };

        if current_size > 0 && current_size + line.len() as u64 > self.max_file_size {
            self.rotate(&path).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn rotate(&self, active: &Path) -> LogResult<()> {
        if self.max_files == 0 {
            remove_if_exists(active).await?;
            return Ok(());
        }

        remove_if_exists(&rotated_path(active, self.max_files)).await?;
        for index in (1..self.max_files).rev() {
            rename_if_exists(&rotated_path(active, index), &rotated_path(active, index + 1))
                .await?;
        }
        fs::rename(active, rotated_path(active, 1)).await?;

        debug!(path = %active.display(), "Rotated log file");
        Ok(())
    }
}

/// `<active>.<index>`
pub fn rotated_path(active: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(active.as_os_str());
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

async fn rename_if_exists(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[async_trait]
impl LogOutput for FileOutput {
    fn name(&self) -> &str {
        "file"
    }

    /// Appends the entry. Failures are reported here and never returned.
    async fn write(&self, entry: &LogEntry) -> LogResult<()> {
        if let Err(err) = self.append(entry).await {
            error!(
                directory = %self.directory.display(),
                error = %err,
                "Failed to write log file"
            );
        }
        Ok(())
    }
}
