use std::fmt;

use reqwest::Method;

/// Description of a dashboard backend request.
///
/// Every call the dashboard makes is named here, so senders only ever
/// deal with a request description plus a [`serde_json::Value`] of
/// parameters. For `GET` requests the parameters become the query
/// string; for mutating requests they become the JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// List participants page by page.
    ListParticipants,
    /// Stream participants as newline-delimited JSON.
    StreamParticipants,
    /// Fetch a single participant record.
    GetParticipant {
        /// Participant id.
        id: String,
    },
    /// Update a participant record.
    UpdateParticipant {
        /// Participant id.
        id: String,
    },
    /// Delete a participant record.
    DeleteParticipant {
        /// Participant id.
        id: String,
    },
}

impl ApiRequest {
    /// HTTP method of this request.
    pub fn method(&self) -> Method {
        match self {
            Self::ListParticipants | Self::StreamParticipants | Self::GetParticipant { .. } => {
                Method::GET
            }
            Self::UpdateParticipant { .. } => Method::PATCH,
            Self::DeleteParticipant { .. } => Method::DELETE,
        }
    }

    /// Path of this request, relative to the API base url.
    ///
    /// Trailing slashes are significant to the backend router.
    pub fn path(&self) -> String {
        match self {
            Self::ListParticipants => "cohort/participant/all/".to_string(),
            Self::StreamParticipants => "cohort/participant/stream/".to_string(),
            Self::GetParticipant { id } => format!("cohort/participant/{id}/"),
            Self::UpdateParticipant { id } => format!("cohort/participant/{id}/"),
            Self::DeleteParticipant { id } => format!("cohort/participant/{id}/"),
        }
    }

    /// Whether parameters are carried in the query string rather than
    /// the request body.
    pub fn params_in_query(&self) -> bool {
        self.method() == Method::GET
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// Flatten a JSON object into query pairs.
///
/// `null` entries are skipped so optional filters can be passed
/// unconditionally; nested values are rejected since the backend only
/// understands scalar query parameters.
pub fn query_pairs(params: &serde_json::Value) -> crate::Result<Vec<(String, String)>> {
    match params {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Object(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                let rendered = match value {
                    serde_json::Value::Null => continue,
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(crate::Error::custom(format!(
                            "non-scalar query parameter `{key}`: {other}"
                        )))
                    }
                };
                pairs.push((key.clone(), rendered));
            }
            Ok(pairs)
        }
        other => Err(crate::Error::custom(format!(
            "query parameters must be an object, got: {other}"
        ))),
    }
}
