use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("failed to create storage directory at {path:?} on `{stage}`: {source}"))]
    CreateDirectory {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read storage file at {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize storage slots on `{stage}`: {source}"))]
    SerializeSlots {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write storage file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to lock storage file with {path:?} on `{stage}`: {source}"))]
    LockFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace storage file at {path:?} on `{stage}`: {source}"))]
    PersistTempFile {
        stage: &'static str,
        path: PathBuf,
        source: tempfile::PersistError,
    },
    #[snafu(display("storage slot '{key}' rejected on `{stage}`: {details}"))]
    SlotRejected {
        stage: &'static str,
        key: String,
        details: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
