//! Scripted sender for exercising the client without a network.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use futures_util::stream;
use hubdash_api_utils::{ApiRequest, ApiSender, ApiTransportStats, Error as ApiError};
use serde_json::{json, Value};

type ApiResult = Result<Value, ApiError>;
type StreamItem = hubdash_api_utils::Result<Bytes>;

/// Sender that replays scripted responses and records every call.
#[derive(Clone, Default)]
pub(crate) struct MockSender {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    responses: Mutex<VecDeque<ApiResult>>,
    stream_script: Mutex<Option<Vec<StreamItem>>>,
    calls: Mutex<Vec<(ApiRequest, Value)>>,
}

impl MockSender {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn push_ok(&self, value: Value) {
        self.inner.responses.lock().unwrap().push_back(Ok(value));
    }

    pub(crate) fn push_err(&self, err: ApiError) {
        self.inner.responses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn set_stream(&self, items: Vec<StreamItem>) {
        *self.inner.stream_script.lock().unwrap() = Some(items);
    }

    pub(crate) fn calls(&self) -> Vec<(ApiRequest, Value)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }
}

impl ApiSender for MockSender {
    type ByteStream = stream::Iter<std::vec::IntoIter<StreamItem>>;

    async fn send(
        &self,
        request: ApiRequest,
        params: Value,
    ) -> hubdash_api_utils::Result<Value> {
        self.inner.calls.lock().unwrap().push((request, params));
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::custom("no scripted response left")))
    }

    async fn send_streaming(
        &self,
        request: ApiRequest,
        params: Value,
    ) -> hubdash_api_utils::Result<Self::ByteStream> {
        self.inner.calls.lock().unwrap().push((request, params));
        let items = self
            .inner
            .stream_script
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ApiError::custom("no scripted stream"))?;
        Ok(stream::iter(items))
    }

    fn transport_stats(&self) -> ApiTransportStats {
        Default::default()
    }

    fn base_url(&self) -> String {
        "mock://backend/".to_string()
    }
}

/// Route test logs through the captured test writer.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Raw participant record as the backend sends it.
pub(crate) fn participant_value(id: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Participant {id}"),
        "email": format!("{id}@example.com"),
        "payment_status": false,
        "vetting_status": "pending",
        "created_at": created_at,
    })
}

/// Paged listing envelope for one page of results.
pub(crate) fn page_value(results: Vec<Value>, current: u32, next: Option<u32>) -> Value {
    let limit = results.len();
    json!({
        "success": true,
        "message": "ok",
        "data": {
            "results": results,
            "pagination": {
                "current_page": current,
                "limit": limit,
                "has_next": next.is_some(),
                "has_previous": current > 1,
                "next_page": next,
                "previous_page": if current > 1 { Some(current - 1) } else { None },
            },
        },
    })
}

/// One NDJSON line, newline-terminated.
pub(crate) fn stream_line(value: Value) -> Bytes {
    Bytes::from(format!("{value}\n"))
}
