use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::KeyValueStore;
use super::error::{SlotRejectedSnafu, StorageResult};

/// Process-local slots, used by tests and by embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes once the summed key and value bytes would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            slots: RwLock::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn from_slots<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            slots: RwLock::new(
                slots
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
            quota_bytes: None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(quota_bytes) = self.quota_bytes {
            let used: usize = slots
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let requested = used + key.len() + value.len();
            if requested > quota_bytes {
                return SlotRejectedSnafu {
                    stage: "memory-store-set",
                    key: key.to_string(),
                    details: format!("quota of {quota_bytes} bytes exceeded ({requested})"),
                }
                .fail();
            }
        }

        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}
