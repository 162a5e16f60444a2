use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures of the CSV-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file or its directory does not exist.
    #[error("store not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Another holder (process or program) has the table.
    #[error("table '{table}' is locked by another holder")]
    Locked { table: String },

    /// This process could not claim the table before the deadline.
    #[error("timed out after {waited_ms} ms waiting for table '{table}'")]
    LockTimeout { table: String, waited_ms: u64 },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("format error in {table}: {message}")]
    Format { table: String, message: String },

    #[error("journal payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            // Windows reports a file held open exclusively by another program
            // as a permission failure.
            io::ErrorKind::PermissionDenied => StoreError::Locked {
                table: path.display().to_string(),
            },
            _ => StoreError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn csv(path: &Path, err: csv::Error) -> Self {
        if let csv::ErrorKind::Io(io_err) = err.kind() {
            match io_err.kind() {
                io::ErrorKind::NotFound => return StoreError::NotFound(path.to_path_buf()),
                io::ErrorKind::PermissionDenied => {
                    return StoreError::Locked {
                        table: path.display().to_string(),
                    };
                }
                _ => {}
            }
        }
        StoreError::Csv {
            path: path.to_path_buf(),
            source: err,
        }
    }

    pub fn format(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Format {
            table: table.into(),
            message: message.into(),
        }
    }
}
