use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Envelope wrapping every JSON response from the dashboard backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the backend accepted the request.
    pub success: bool,
    /// Human-readable message, mostly present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response payload.
    // No field-level `default`: it would add a `T: Default` bound to
    // the derived `Deserialize` impl, and serde already reads a
    // missing `Option` field as `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Extract the payload, turning `success: false` and a missing
    /// `data` field into errors.
    pub fn into_data(self) -> crate::Result<T> {
        if !self.success {
            return Err(crate::Error::Api(
                self.message.unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        self.data.ok_or(crate::Error::MissingData)
    }

    /// Check `success` without consuming the payload.
    pub fn ensure_success(&self) -> crate::Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(crate::Error::Api(
                self.message
                    .clone()
                    .unwrap_or_else(|| "request rejected".to_string()),
            ))
        }
    }
}

/// Decode a raw JSON value as an enveloped payload.
pub fn decode_data<T: DeserializeOwned>(value: serde_json::Value) -> crate::Result<T> {
    serde_json::from_value::<ApiResponse<T>>(value)?.into_data()
}

/// Pagination descriptor returned alongside every listing page.
///
/// Traversal follows `next_page` as a cursor; pages are not assumed to
/// be contiguous integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Page this payload belongs to.
    pub current_page: u32,
    /// Page size limit the backend applied.
    pub limit: u32,
    /// Whether another page follows.
    #[serde(default)]
    pub has_next: bool,
    /// Whether a page precedes this one.
    #[serde(default)]
    pub has_previous: bool,
    /// Explicit next page number, if any.
    #[serde(default)]
    pub next_page: Option<u32>,
    /// Explicit previous page number, if any.
    #[serde(default)]
    pub previous_page: Option<u32>,
}

/// One page of a listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    /// Records on this page.
    pub results: Vec<T>,
    /// Cursor information for the traversal.
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn into_data_rejects_failures() {
        let res: ApiResponse<u32> = serde_json::from_value(json!({
            "success": false,
            "message": "invalid token",
        }))
        .unwrap();
        let err = res.into_data().unwrap_err();
        assert!(matches!(err, crate::Error::Api(msg) if msg == "invalid token"));

        let res: ApiResponse<u32> = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(res.into_data(), Err(crate::Error::MissingData)));
    }

    #[test]
    fn decodes_paged_listing() {
        let page: Paged<serde_json::Value> = decode_data(json!({
            "success": true,
            "data": {
                "results": [{"id": "a"}, {"id": "b"}],
                "pagination": {
                    "current_page": 1,
                    "limit": 100,
                    "has_next": true,
                    "has_previous": false,
                    "next_page": 2,
                    "previous_page": null,
                },
            },
        }))
        .unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.pagination.next_page, Some(2));
        assert!(page.pagination.has_next);
        assert!(!page.pagination.has_previous);
    }

    #[test]
    fn payloads_without_default_still_decode() {
        // Deliberately no `Default` derive; the envelope must not
        // require one on the payload type.
        #[derive(Debug, PartialEq, Deserialize)]
        struct Payload {
            value: u32,
        }

        let decoded: Payload = decode_data(json!({
            "success": true,
            "data": {"value": 7},
        }))
        .unwrap();
        assert_eq!(decoded, Payload { value: 7 });

        let res: ApiResponse<Payload> =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(res.data.is_none());
        assert!(res.message.is_none());
    }
}
