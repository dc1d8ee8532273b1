use std::sync::Arc;

use hubdash_api_utils::{CredentialStore, HttpSender};
use serde::Serialize;
use time::OffsetDateTime;
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

use crate::{
    client::{
        ops::ParticipantOps, Client, ClientOptions, FetchOptions, FetchOutcome, StreamProgress,
        StreamQuery,
    },
    js::host::{HostCredentials, HostStorage, JsCredentials, JsStorage},
    store::{NullStorage, ParticipantStore, SnapshotStorage},
    types::Participant,
};

/// Storage key under which the participant state is persisted.
const STORAGE_KEY: &str = "hubdash.participants";

/// Store state as exposed to JS.
#[derive(Debug, Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct StoreView {
    /// Participants, newest first.
    pub participants: Vec<Participant>,
    /// Whether at least one load has completed.
    pub has_loaded: bool,
    /// Whether a non-silent load is running.
    pub loading: bool,
    /// User-facing error message, if any.
    pub error: Option<String>,
    /// Whether the error still leaves partial data visible.
    pub partial: bool,
    /// When the last clean full load finished.
    #[serde(with = "time::serde::rfc3339::option")]
    #[tsify(type = "string | null")]
    pub last_full_load: Option<OffsetDateTime>,
    /// Whether the cached set is within the freshness window.
    pub is_fresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FetchSummary {
    Fresh,
    InFlight,
    Completed {
        pages_fetched: u32,
        failed_pages: Vec<u32>,
        total: usize,
        aborted_early: bool,
        warning: Option<String>,
    },
}

impl From<FetchOutcome> for FetchSummary {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Fresh => Self::Fresh,
            FetchOutcome::InFlight => Self::InFlight,
            FetchOutcome::Completed(report) => {
                let warning = report.partial_warning();
                Self::Completed {
                    pages_fetched: report.pages_fetched,
                    failed_pages: report.failed_pages,
                    total: report.total,
                    aborted_early: report.aborted_early,
                    warning,
                }
            }
        }
    }
}

/// Browser handle to the dashboard data layer.
#[wasm_bindgen(js_name = DashboardClient)]
pub struct JsDashboardClient {
    client: Client<HttpSender>,
}

#[wasm_bindgen(js_class = DashboardClient)]
impl JsDashboardClient {
    /// Create a client bound to host credential and storage objects.
    ///
    /// When `storage` is given, previously persisted participants are
    /// hydrated immediately and future writes are persisted to it.
    #[wasm_bindgen(constructor)]
    pub fn new(
        base_url: String,
        credentials: HostCredentials,
        storage: Option<HostStorage>,
    ) -> crate::Result<JsDashboardClient> {
        let credentials: Arc<dyn CredentialStore> = Arc::new(JsCredentials::new(credentials));
        let storage: Arc<dyn SnapshotStorage> = match storage {
            Some(storage) => Arc::new(JsStorage::new(storage, STORAGE_KEY)),
            None => Arc::new(NullStorage),
        };
        let client =
            Client::new_with_options(&base_url, credentials, storage, ClientOptions::default())?;
        Ok(Self { client })
    }

    /// Run the paginated fetch. Resolves to a summary object with a
    /// `status` of `"fresh"`, `"in_flight"` or `"completed"`.
    pub async fn fetch_participants(
        &self,
        options: Option<FetchOptions>,
    ) -> crate::Result<JsValue> {
        let outcome = ParticipantOps::fetch_participants(&self.client, options.unwrap_or_default())
            .await?;
        to_js(&FetchSummary::from(outcome))
    }

    /// Ingest participants through the streaming endpoint. `on_progress`
    /// is called with `{received, total_sent, chunks}` after each chunk.
    /// Resolves to the full participant array.
    pub async fn stream_participants(
        &self,
        query: Option<StreamQuery>,
        on_progress: Option<js_sys::Function>,
    ) -> crate::Result<JsValue> {
        let callback = on_progress;
        let participants = ParticipantOps::stream_participants(
            &self.client,
            query.unwrap_or_default(),
            move |progress: StreamProgress| {
                if let Some(callback) = &callback {
                    if let Ok(value) = serde_wasm_bindgen::to_value(&progress) {
                        let _ = callback.call1(&JsValue::NULL, &value);
                    }
                }
            },
        )
        .await?;
        to_js(&participants)
    }

    /// Fetch a single participant by id.
    pub async fn get_participant(&self, id: String) -> crate::Result<JsValue> {
        to_js(&self.client.get_participant(&id).await?)
    }

    /// Approve a participant; the stored copy is patched with the
    /// server echo.
    pub async fn approve_participant(&self, id: String) -> crate::Result<JsValue> {
        to_js(&self.client.approve_participant(&id).await?)
    }

    /// Reject a participant; the stored copy is patched with the
    /// server echo.
    pub async fn reject_participant(&self, id: String) -> crate::Result<JsValue> {
        to_js(&self.client.reject_participant(&id).await?)
    }

    /// Delete a participant and remove it from the store.
    pub async fn delete_participant(&self, id: String) -> crate::Result<()> {
        self.client.delete_participant(&id).await
    }

    /// Current store state.
    pub fn snapshot(&self) -> StoreView {
        view_of(self.client.store())
    }

    /// Call `callback` with a [`StoreView`] after every store change.
    /// The subscription ends when the client is freed.
    pub fn subscribe(&self, callback: js_sys::Function) {
        let mut receiver = self.client.store().subscribe();
        let store = Arc::downgrade(self.client.store());
        wasm_bindgen_futures::spawn_local(async move {
            while receiver.changed().await.is_ok() {
                let Some(store) = store.upgrade() else { break };
                let Ok(view) = to_js(&view_of(&store)) else {
                    continue;
                };
                let _ = callback.call1(&JsValue::NULL, &view);
            }
        });
    }

    /// Whether the cached participant set is still fresh.
    pub fn is_fresh(&self) -> bool {
        self.client.store().is_fresh()
    }

    /// Reset the store and drop persisted state.
    pub fn reset(&self) {
        self.client.store().reset();
    }
}

fn view_of(store: &ParticipantStore) -> StoreView {
    let snapshot = store.snapshot();
    StoreView {
        participants: snapshot.participants.as_ref().clone(),
        has_loaded: snapshot.has_loaded,
        loading: snapshot.loading,
        partial: snapshot
            .error
            .as_ref()
            .is_some_and(|error| !error.is_fatal()),
        error: snapshot.error.map(|error| error.to_string()),
        last_full_load: snapshot.last_full_load,
        is_fresh: store.is_fresh(),
    }
}

fn to_js(value: &impl Serialize) -> crate::Result<JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(crate::Error::custom)
}
