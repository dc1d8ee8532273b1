//! Client-side participant store.
//!
//! The store is the single source of truth for the participant set
//! shared by the dashboard screens. Loaders write into it, screens read
//! [`StoreSnapshot`]s or subscribe to changes, and the durable slice of
//! it survives reloads through a [`SnapshotStorage`].

mod persist;

pub use persist::{MemoryStorage, NullStorage, PersistedState, SnapshotStorage};

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::types::{sort_newest_first, Participant};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// A full load younger than this window is considered fresh and is
    /// not re-fetched unless forced.
    pub freshness_window: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(5 * 60),
        }
    }
}

/// Error slot of the store.
///
/// `Display` is the user-facing message shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The load timed out before any data arrived.
    Timeout,
    /// The load failed before any data arrived.
    Request(String),
    /// The stream broke mid-way.
    Stream {
        /// Transport failure message.
        message: String,
        /// Whether chunks had already been flushed, leaving partial
        /// data visible.
        flushed: bool,
    },
    /// Some pages never loaded; the visible data is incomplete.
    Partial(Vec<u32>),
}

impl LoadError {
    /// Whether the error means no usable data arrived.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Timeout | Self::Request(_) => true,
            Self::Stream { flushed, .. } => !flushed,
            Self::Partial(_) => false,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("the server took too long to respond; please try again"),
            Self::Request(msg) => write!(f, "loading participants failed: {msg}"),
            Self::Stream { message, flushed } => {
                write!(f, "the participant stream was interrupted: {message}")?;
                if *flushed {
                    f.write_str("; the list may be incomplete")?;
                }
                Ok(())
            }
            Self::Partial(pages) => {
                let pages = pages
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "some participants could not be loaded (pages {pages}); the list may be incomplete"
                )
            }
        }
    }
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Participants, newest first.
    pub participants: Arc<Vec<Participant>>,
    /// Whether at least one load has completed since the store was
    /// created or hydrated.
    pub has_loaded: bool,
    /// Whether a non-silent load is running.
    pub loading: bool,
    /// Error slot.
    pub error: Option<LoadError>,
    /// When the last clean full load finished.
    pub last_full_load: Option<OffsetDateTime>,
}

/// Client-side participant store.
pub struct ParticipantStore {
    config: StoreConfig,
    publisher: watch::Sender<StoreSnapshot>,
    storage: Arc<dyn SnapshotStorage>,
    in_flight: AtomicBool,
}

impl fmt::Debug for ParticipantStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantStore")
            .field("config", &self.config)
            .field("state", &*self.publisher.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for ParticipantStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl ParticipantStore {
    /// Create a store without durable storage.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_storage(config, Arc::new(NullStorage))
    }

    /// Create a store hydrated from `storage`.
    ///
    /// A corrupt or unreadable persisted state is discarded with a
    /// warning rather than failing construction.
    pub fn with_storage(config: StoreConfig, storage: Arc<dyn SnapshotStorage>) -> Self {
        let mut initial = StoreSnapshot::default();
        match storage.load() {
            Ok(Some(persisted)) => {
                let mut participants = persisted.participants;
                sort_newest_first(&mut participants);
                initial.participants = Arc::new(participants);
                initial.has_loaded = persisted.has_loaded;
                initial.last_full_load = persisted.last_full_load;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "discarding unreadable persisted participant state");
            }
        }
        let (publisher, _) = watch::channel(initial);
        Self {
            config,
            publisher,
            storage,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.publisher.borrow().clone()
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.publisher.subscribe()
    }

    /// Replace the whole participant list.
    ///
    /// The list is re-sorted newest-first before it becomes visible.
    pub fn replace_all(&self, mut participants: Vec<Participant>) {
        sort_newest_first(&mut participants);
        self.mutate(move |state| {
            state.participants = Arc::new(participants);
        });
        self.persist();
    }

    /// Append a single record, typically the server echo of a new
    /// registration.
    pub fn append_one(&self, participant: Participant) {
        self.mutate(move |state| {
            let mut participants = state.participants.as_ref().clone();
            participants.push(participant);
            sort_newest_first(&mut participants);
            state.participants = Arc::new(participants);
        });
        self.persist();
    }

    /// Patch the record with `id` in place. Returns whether it existed.
    pub fn patch_by_id(&self, id: &str, patch: impl FnOnce(&mut Participant)) -> bool {
        let mut found = false;
        self.mutate(|state| {
            let mut participants = state.participants.as_ref().clone();
            if let Some(participant) = participants.iter_mut().find(|p| p.id == id) {
                patch(participant);
                found = true;
                sort_newest_first(&mut participants);
                state.participants = Arc::new(participants);
            }
        });
        if found {
            self.persist();
        }
        found
    }

    /// Remove the record with `id`. Returns whether it existed.
    pub fn remove_by_id(&self, id: &str) -> bool {
        let mut found = false;
        self.mutate(|state| {
            let mut participants = state.participants.as_ref().clone();
            let before = participants.len();
            participants.retain(|p| p.id != id);
            if participants.len() != before {
                found = true;
                state.participants = Arc::new(participants);
            }
        });
        if found {
            self.persist();
        }
        found
    }

    /// Set the global loading flag. Not persisted.
    pub fn set_loading(&self, loading: bool) {
        self.mutate(|state| state.loading = loading);
    }

    /// Set or clear the error slot. Not persisted.
    pub fn set_error(&self, error: Option<LoadError>) {
        self.mutate(|state| state.error = error);
    }

    /// Set the loaded flag.
    pub fn set_loaded(&self, loaded: bool) {
        self.mutate(|state| state.has_loaded = loaded);
        self.persist();
    }

    /// Record a clean full load finishing now.
    pub fn record_full_load(&self) {
        self.record_full_load_at(OffsetDateTime::now_utc());
    }

    /// Record a clean full load finishing at `at`.
    pub fn record_full_load_at(&self, at: OffsetDateTime) {
        self.mutate(|state| {
            state.has_loaded = true;
            state.last_full_load = Some(at);
        });
        self.persist();
    }

    /// Reset the store to its pristine state and drop persisted data.
    pub fn reset(&self) {
        self.publisher.send_replace(StoreSnapshot::default());
        if let Err(err) = self.storage.clear() {
            tracing::warn!(%err, "failed to clear persisted participant state");
        }
    }

    /// Whether the cached participant set is still fresh.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(OffsetDateTime::now_utc())
    }

    /// Freshness at an explicit instant.
    pub fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
        let state = self.publisher.borrow();
        if !state.has_loaded {
            return false;
        }
        let Some(last) = state.last_full_load else {
            return false;
        };
        let window = time::Duration::try_from(self.config.freshness_window)
            .unwrap_or(time::Duration::MAX);
        now - last < window
    }

    /// Whether a load currently holds the store.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Try to take the single-flight guard. `None` means another load
    /// already holds it.
    pub(crate) fn begin_fetch(&self) -> Option<FetchGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(FetchGuard { store: self })
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreSnapshot)) {
        self.publisher.send_modify(f);
    }

    fn persist(&self) {
        let persisted = {
            let state = self.publisher.borrow();
            PersistedState {
                participants: state.participants.as_ref().clone(),
                has_loaded: state.has_loaded,
                last_full_load: state.last_full_load,
            }
        };
        if let Err(err) = self.storage.save(&persisted) {
            tracing::warn!(%err, "failed to persist participant state");
        }
    }
}

/// Guard marking a load in flight. Dropping it releases the store.
pub(crate) struct FetchGuard<'a> {
    store: &'a ParticipantStore,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.store(false, Ordering::SeqCst);
    }
}
