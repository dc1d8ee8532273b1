/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parse url error.
    #[error("parse url: {0}")]
    ParseUrl(#[from] url::ParseError),
    /// Transport-level failure from the HTTP client.
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Non-success HTTP status.
    #[error("http status {status}: {body}")]
    Status {
        /// Status code returned by the backend.
        status: reqwest::StatusCode,
        /// Snippet of the response body.
        body: String,
    },
    /// The backend responded with `success: false`.
    #[error("api: {0}")]
    Api(String),
    /// The backend omitted the `data` field of a successful response.
    #[error("missing data in response")]
    MissingData,
    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Custom error.
    #[error("custom: {0}")]
    Custom(String),
}

impl Error {
    /// Create a custom error.
    pub fn custom(msg: impl ToString) -> Self {
        Self::Custom(msg.to_string())
    }

    /// Whether this error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Reqwest(err) => err.is_timeout(),
            _ => false,
        }
    }
}
