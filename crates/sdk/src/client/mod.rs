//! Dashboard API client.

/// Operations.
pub mod ops;

mod fetch;
mod stream;

#[cfg(test)]
pub(crate) mod mock;

pub use fetch::{FetchConfig, FetchOptions, FetchOutcome, FetchReport};
pub use stream::{StreamProgress, StreamQuery};

use std::sync::Arc;

use hubdash_api_utils::{CredentialStore, HttpSender, HttpSenderConfig};

use crate::store::{ParticipantStore, SnapshotStorage, StoreConfig};

/// Options for creating a [`Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Store configuration.
    pub store: StoreConfig,
    /// Paginated traversal configuration.
    pub fetch: FetchConfig,
    /// Transport configuration.
    pub http: HttpSenderConfig,
}

/// Dashboard API client.
///
/// Owns the transport and the shared [`ParticipantStore`]; all
/// participant operations are provided through the traits in [`ops`].
pub struct Client<S> {
    sender: S,
    store: Arc<ParticipantStore>,
    fetch_config: FetchConfig,
}

impl Client<HttpSender> {
    /// Create an HTTP client with default options and no durable
    /// storage.
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> crate::Result<Self> {
        Self::new_with_options(
            base_url,
            credentials,
            Arc::new(crate::store::NullStorage),
            ClientOptions::default(),
        )
    }

    /// Create an HTTP client hydrated from `storage`.
    pub fn new_with_options(
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
        storage: Arc<dyn SnapshotStorage>,
        options: ClientOptions,
    ) -> crate::Result<Self> {
        let sender = HttpSender::new_with_config(base_url, credentials, options.http)?;
        let store = Arc::new(ParticipantStore::with_storage(options.store, storage));
        Ok(Self::from_parts(sender, store, options.fetch))
    }
}

impl<S> Client<S> {
    /// Create a client from an existing sender and store.
    pub fn from_parts(sender: S, store: Arc<ParticipantStore>, fetch_config: FetchConfig) -> Self {
        Self {
            sender,
            store,
            fetch_config,
        }
    }

    /// The underlying sender.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// The store shared with the dashboard screens.
    pub fn store(&self) -> &Arc<ParticipantStore> {
        &self.store
    }

    /// The paginated traversal configuration.
    pub fn fetch_config(&self) -> &FetchConfig {
        &self.fetch_config
    }
}
