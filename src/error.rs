// ⚠️ Source Errors - what can go wrong while reading an export
//
// Io     -> the file / database cannot be opened (fatal for the run)
// Format -> the source opened but is structurally broken (fatal for the file)
//
// Data quality problems are NOT errors, see quality.rs

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed source `{path}`: {message}")]
    Format { path: PathBuf, message: String },
}

impl SourceError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &Path, message: impl Into<String>) -> Self {
        SourceError::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// csv errors carry their own io failures; split them apart
    pub fn from_csv(path: &Path, err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(source) => SourceError::io(path, source),
                other => SourceError::format(path, format!("{:?}", other)),
            }
        } else {
            SourceError::format(path, err.to_string())
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, SourceError::Io { .. })
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
