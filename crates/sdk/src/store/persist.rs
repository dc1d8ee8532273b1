use std::sync::RwLock;

use hubdash_api_utils::MaybeSendSync;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Participant;

/// Durable slice of the store.
///
/// Only the participant list, the loaded flag and the last full-load
/// time survive a reload. Transient flags (loading, error) never do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Participants known at save time.
    pub participants: Vec<Participant>,
    /// Whether a load had completed.
    #[serde(default)]
    pub has_loaded: bool,
    /// When the last clean full load finished.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_full_load: Option<OffsetDateTime>,
}

/// Where the durable slice of the store lives.
///
/// Browser embedders back this with `localStorage`; native embedders
/// can use [`MemoryStorage`] or their own implementation.
pub trait SnapshotStorage: MaybeSendSync {
    /// Load the persisted state, if any.
    fn load(&self) -> crate::Result<Option<PersistedState>>;

    /// Persist `state`, replacing any previous value.
    fn save(&self, state: &PersistedState) -> crate::Result<()>;

    /// Drop the persisted state.
    fn clear(&self) -> crate::Result<()>;
}

/// Storage that persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl SnapshotStorage for NullStorage {
    fn load(&self) -> crate::Result<Option<PersistedState>> {
        Ok(None)
    }

    fn save(&self, _state: &PersistedState) -> crate::Result<()> {
        Ok(())
    }

    fn clear(&self) -> crate::Result<()> {
        Ok(())
    }
}

/// In-memory storage, mainly for tests and native embedders.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<Option<String>>,
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> crate::Result<Option<PersistedState>> {
        self.state
            .read()
            .unwrap()
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }

    fn save(&self, state: &PersistedState) -> crate::Result<()> {
        let encoded = serde_json::to_string(state)?;
        *self.state.write().unwrap() = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> crate::Result<()> {
        *self.state.write().unwrap() = None;
        Ok(())
    }
}
