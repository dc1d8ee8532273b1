use serde::{Deserialize, Serialize};

/// Lifecycle marker carried by status envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// The backend accepted the request and will start sending chunks.
    Started,
    /// All chunks have been sent.
    Completed,
}

/// Status line of a streamed listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEnvelope {
    /// Lifecycle marker.
    pub status: StreamStatus,
    /// Running total of records sent so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sent: Option<u64>,
}

/// Chunk line of a streamed listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEnvelope<T> {
    /// Records in this chunk.
    pub chunk: Vec<T>,
    /// Running total of records sent, including this chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sent: Option<u64>,
}

/// One line of a newline-delimited JSON stream.
///
/// Every line is self-contained: either a status marker or a chunk of
/// records. Lines that parse as neither are skipped by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEnvelope<T> {
    /// A chunk of records.
    Chunk(ChunkEnvelope<T>),
    /// A lifecycle marker.
    Status(StatusEnvelope),
}

/// Incremental splitter for newline-delimited payloads.
///
/// Network chunks rarely align with line boundaries, so bytes are
/// buffered until a full line is available. Carriage returns are
/// stripped and blank lines dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and drain every complete line they close.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            match String::from_utf8(line) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        lines.push(line);
                    }
                }
                Err(err) => {
                    tracing::warn!("stream line is not valid utf-8: {err}");
                }
            }
        }
        lines
    }

    /// Drain the trailing line of a stream that did not end with a
    /// newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        match String::from_utf8(rest) {
            Ok(line) if !line.trim().is_empty() => Some(line),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("stream tail is not valid utf-8: {err}");
                None
            }
        }
    }
}
