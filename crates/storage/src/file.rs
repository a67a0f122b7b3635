use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use snafu::ResultExt;
use tempfile::NamedTempFile;

use super::KeyValueStore;
use super::error::{
    CreateDirectorySnafu, LockFileSnafu, PersistTempFileSnafu, ReadFileSnafu,
    SerializeSlotsSnafu, StorageResult, WriteFileSnafu,
};

pub const STORAGE_DIRECTORY_NAME: &str = "learnovate";
pub const STORAGE_FILE_NAME: &str = "preferences.json";

type Slots = BTreeMap<String, String>;

/// JSON object on disk, one string value per slot.
///
/// Every read goes back to the file so writes made by other processes sharing
/// the path are observed without a restart. Updates hold an exclusive lock on
/// a sibling `.lock` file, so instances in different processes serialize.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|path| path.join(STORAGE_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".learnovate"))
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(STORAGE_FILE_NAME)
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn load_slots(&self) -> StorageResult<Slots> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Slots::new()),
            Err(error) => {
                return Err(error).context(ReadFileSnafu {
                    stage: "read-storage-file",
                    path: self.path.clone(),
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Slots::new());
        }

        match serde_json::from_str::<Slots>(&content) {
            Ok(slots) => Ok(slots),
            Err(error) => {
                // A damaged file behaves like an empty one; the next write replaces it.
                tracing::warn!(
                    path = ?self.path,
                    error = %error,
                    "storage file is not a JSON string map, ignoring its contents"
                );
                Ok(Slots::new())
            }
        }
    }

    // The lock lives in its own file because the rename in `persist_slots`
    // replaces the data file's inode.
    fn acquire_lock(&self) -> StorageResult<File> {
        let parent = self.parent_dir();
        std::fs::create_dir_all(parent).context(CreateDirectorySnafu {
            stage: "create-storage-directory",
            path: parent.to_path_buf(),
        })?;

        let lock_path = self.path.with_extension("json.lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context(LockFileSnafu {
                stage: "open-storage-lock-file",
                path: lock_path.clone(),
            })?;
        lock_file.lock_exclusive().context(LockFileSnafu {
            stage: "lock-storage-file",
            path: lock_path,
        })?;
        Ok(lock_file)
    }

    fn persist_slots(&self, slots: &Slots) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(slots).context(SerializeSlotsSnafu {
            stage: "serialize-storage-slots",
        })?;

        let parent = self.parent_dir();
        let mut temp = NamedTempFile::new_in(parent).context(WriteFileSnafu {
            stage: "create-temporary-storage-file",
            path: parent.to_path_buf(),
        })?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .context(WriteFileSnafu {
                stage: "write-temporary-storage-file",
                path: temp.path().to_path_buf(),
            })?;

        temp.persist(&self.path).context(PersistTempFileSnafu {
            stage: "replace-storage-file",
            path: self.path.clone(),
        })?;

        Ok(())
    }

    fn mutate<F>(&self, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Slots),
    {
        // Released when the handle drops.
        let _lock = self.acquire_lock()?;
        let mut slots = self.load_slots()?;
        apply(&mut slots);
        self.persist_slots(&slots)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.load_slots()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mutate(|slots| {
            slots.insert(key.to_string(), value.to_string());
        })?;
        tracing::debug!(path = ?self.path, key, "stored slot");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.mutate(|slots| {
            slots.remove(key);
        })
    }
}
