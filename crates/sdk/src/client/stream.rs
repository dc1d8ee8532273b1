//! Streamed participant loading.
//!
//! The backend streams newline-delimited JSON envelopes: a `started`
//! marker, then record chunks with a running total, then a `completed`
//! marker. Each chunk is flushed to the store as soon as it arrives, so
//! very large cohorts render progressively. There is no retry here; a
//! broken stream surfaces as an error and the caller decides.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use typed_builder::TypedBuilder;

use hubdash_api_utils::{ApiRequest, ApiSender, LineBuffer, StreamEnvelope, StreamStatus};

use crate::{
    store::{LoadError, ParticipantStore},
    types::{participant::decode_lenient, sort_newest_first, Participant},
};

/// Filters and tuning for a streamed load.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(from_wasm_abi))]
#[derive(Debug, Clone, Default, Serialize, Deserialize, TypedBuilder)]
pub struct StreamQuery {
    /// Restrict the stream to one registration (cohort).
    #[serde(default)]
    #[builder(default, setter(strip_option, into))]
    pub registration: Option<String>,
    /// Restrict the stream to one course.
    #[serde(default)]
    #[builder(default, setter(strip_option, into))]
    pub course: Option<String>,
    /// Chunk size hint forwarded to the backend.
    #[serde(default)]
    #[builder(default, setter(strip_option))]
    pub chunk_size: Option<u32>,
}

impl StreamQuery {
    /// Whether the stream covers the whole participant set.
    fn is_unfiltered(&self) -> bool {
        self.registration.is_none() && self.course.is_none()
    }
}

/// Running totals reported after each flushed chunk.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(into_wasm_abi))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamProgress {
    /// Records accumulated client-side.
    pub received: usize,
    /// Running total reported by the backend, when it sends one.
    pub total_sent: Option<u64>,
    /// Chunks consumed so far.
    pub chunks: usize,
}

pub(crate) async fn run_streaming_fetch<S, F>(
    sender: &S,
    store: &ParticipantStore,
    query: &StreamQuery,
    mut on_progress: F,
) -> crate::Result<Vec<Participant>>
where
    S: ApiSender,
    F: FnMut(StreamProgress),
{
    let Some(_guard) = store.begin_fetch() else {
        return Err(crate::Error::LoadInFlight);
    };
    store.set_error(None);

    let params = json!({
        "chunk_size": query.chunk_size,
        "registration": query.registration,
        "course": query.course,
    });
    tracing::debug!(?query, "opening participant stream");

    let mut byte_stream = match sender
        .send_streaming(ApiRequest::StreamParticipants, params)
        .await
    {
        Ok(stream) => stream,
        Err(err) => {
            let err = crate::Error::from(err);
            store.set_error(Some(stream_error(&err, false)));
            return Err(err);
        }
    };

    let mut lines = LineBuffer::new();
    let mut ingest = Ingest {
        store,
        accumulated: Vec::new(),
        chunks: 0,
        completed: false,
        total_sent: None,
    };

    while let Some(next) = byte_stream.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = crate::Error::from(err);
                store.set_error(Some(stream_error(&err, ingest.chunks > 0)));
                return Err(err);
            }
        };
        for line in lines.push(&bytes) {
            ingest.apply(&line, &mut on_progress);
        }
    }
    if let Some(tail) = lines.finish() {
        ingest.apply(&tail, &mut on_progress);
    }

    if !ingest.completed {
        tracing::debug!("participant stream ended without a completed marker");
    }
    if ingest.completed {
        if ingest.chunks == 0 {
            // No chunk ever flushed; the completed answer is an empty
            // set and the store must say so.
            store.replace_all(ingest.accumulated.clone());
            store.set_loaded(true);
        }
        if query.is_unfiltered() {
            store.record_full_load();
        }
    }

    let Ingest {
        mut accumulated, ..
    } = ingest;
    sort_newest_first(&mut accumulated);
    Ok(accumulated)
}

struct Ingest<'a> {
    store: &'a ParticipantStore,
    accumulated: Vec<Participant>,
    chunks: usize,
    completed: bool,
    total_sent: Option<u64>,
}

impl Ingest<'_> {
    fn apply(&mut self, line: &str, on_progress: &mut impl FnMut(StreamProgress)) {
        let envelope: StreamEnvelope<serde_json::Value> = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(%err, "skipping malformed stream line");
                return;
            }
        };
        match envelope {
            StreamEnvelope::Chunk(chunk) => {
                let records = chunk.chunk.into_iter().filter_map(decode_lenient);
                self.accumulated.extend(records);
                self.chunks += 1;
                if let Some(total) = chunk.total_sent {
                    self.total_sent = Some(total);
                }
                self.store.replace_all(self.accumulated.clone());
                if self.chunks == 1 {
                    self.store.set_loaded(true);
                }
                on_progress(StreamProgress {
                    received: self.accumulated.len(),
                    total_sent: self.total_sent,
                    chunks: self.chunks,
                });
            }
            StreamEnvelope::Status(status) => match status.status {
                StreamStatus::Started => {
                    tracing::debug!("participant stream started");
                }
                StreamStatus::Completed => {
                    self.completed = true;
                    if let Some(total) = status.total_sent {
                        self.total_sent = Some(total);
                    }
                }
            },
        }
    }
}

/// Classify a stream failure for the store: once chunks were flushed
/// the visible data is merely incomplete, so the break is non-fatal.
fn stream_error(err: &crate::Error, flushed: bool) -> LoadError {
    if err.is_timeout() && !flushed {
        LoadError::Timeout
    } else {
        LoadError::Stream {
            message: err.to_string(),
            flushed,
        }
    }
}
