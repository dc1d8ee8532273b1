use hubdash_api_utils::CredentialStore;
use wasm_bindgen::prelude::*;

use crate::store::{PersistedState, SnapshotStorage};

#[wasm_bindgen]
extern "C" {
    /// Host-provided credential source.
    ///
    /// Any object with an `accessToken()` method works; the token is
    /// read on every request so refreshes are picked up immediately.
    pub type HostCredentials;

    /// Current access token, or `null` when unauthenticated.
    #[wasm_bindgen(method, js_name = accessToken)]
    pub fn access_token(this: &HostCredentials) -> Option<String>;

    /// Host-provided durable storage with the `localStorage` contract.
    pub type HostStorage;

    /// Read the value stored under `key`, or `null`.
    #[wasm_bindgen(method, js_name = getItem)]
    pub fn get_item(this: &HostStorage, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    #[wasm_bindgen(method, js_name = setItem)]
    pub fn set_item(this: &HostStorage, key: &str, value: &str);

    /// Remove the value stored under `key`.
    #[wasm_bindgen(method, js_name = removeItem)]
    pub fn remove_item(this: &HostStorage, key: &str);
}

/// [`CredentialStore`] backed by a host credential object.
pub(crate) struct JsCredentials {
    inner: HostCredentials,
}

impl JsCredentials {
    pub(crate) fn new(inner: HostCredentials) -> Self {
        Self { inner }
    }
}

impl CredentialStore for JsCredentials {
    fn access_token(&self) -> Option<String> {
        self.inner.access_token()
    }
}

/// [`SnapshotStorage`] backed by a host storage object.
pub(crate) struct JsStorage {
    inner: HostStorage,
    key: String,
}

impl JsStorage {
    pub(crate) fn new(inner: HostStorage, key: impl Into<String>) -> Self {
        Self {
            inner,
            key: key.into(),
        }
    }
}

impl SnapshotStorage for JsStorage {
    fn load(&self) -> crate::Result<Option<PersistedState>> {
        self.inner
            .get_item(&self.key)
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(Into::into)
    }

    fn save(&self, state: &PersistedState) -> crate::Result<()> {
        let encoded = serde_json::to_string(state)?;
        self.inner.set_item(&self.key, &encoded);
        Ok(())
    }

    fn clear(&self) -> crate::Result<()> {
        self.inner.remove_item(&self.key);
        Ok(())
    }
}
