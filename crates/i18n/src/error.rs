use std::path::PathBuf;

use learnovate_storage::StorageError;
use snafu::Snafu;

use crate::Language;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CatalogError {
    #[snafu(display("failed to list translations directory {path:?} on `{stage}`: {source}"))]
    ReadDirectory {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read translations file {path:?} on `{stage}`: {source}"))]
    ReadDictionary {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("translations file {path:?} is not a flat string map on `{stage}`: {source}"))]
    ParseDictionary {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PreferenceError {
    /// The global slot could not be written. Storage exhaustion is the
    /// expected cause; callers may surface it or let it propagate.
    #[snafu(display("failed to persist language '{language}' on `{stage}`: {source}"))]
    PersistLanguage {
        stage: &'static str,
        language: Language,
        source: StorageError,
    },
    /// The signed-in user's settings record exists but could not be updated.
    #[snafu(display("failed to update user settings '{key}' on `{stage}`: {source}"))]
    PersistUserSettings {
        stage: &'static str,
        key: String,
        source: StorageError,
    },
    #[snafu(display("failed to serialize user identity on `{stage}`: {source}"))]
    SerializeIdentity {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to update the signed-in user on `{stage}`: {source}"))]
    PersistIdentity {
        stage: &'static str,
        source: StorageError,
    },
}

pub type PreferenceResult<T> = Result<T, PreferenceError>;
