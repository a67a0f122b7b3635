//! Durable string-keyed slots shared by every preference consumer.
//!
//! Backends hold bare strings; callers own the encoding of each slot
//! (a bare language code, a JSON settings record, ...).

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::{FileStore, STORAGE_DIRECTORY_NAME, STORAGE_FILE_NAME};
pub use memory::MemoryStore;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}
