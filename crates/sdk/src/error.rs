/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport error.
    #[error("transport: {0}")]
    Transport(#[from] hubdash_api_utils::Error),
    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// A load was rejected because another one holds the store.
    #[error("a participant load is already in flight")]
    LoadInFlight,
    /// Custom error.
    #[error("custom: {0}")]
    Custom(String),
}

impl Error {
    /// Create a custom error.
    pub fn custom(msg: impl ToString) -> Self {
        Self::Custom(msg.to_string())
    }

    /// Whether the error is a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

#[cfg(js)]
impl From<Error> for wasm_bindgen::JsValue {
    fn from(err: Error) -> Self {
        wasm_bindgen::JsError::new(&err.to_string()).into()
    }
}
