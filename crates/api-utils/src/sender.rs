//! A transport for dashboard API calls.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use futures_util::Stream;
use serde::de::DeserializeOwned;

use crate::{request::ApiRequest, response::decode_data};

mod http_sender;

pub use http_sender::{HttpByteStream, HttpSender, HttpSenderConfig};

/// Type describing the status of the API transport.
#[derive(Default, Clone)]
pub struct ApiTransportStats {
    /// Number of requests issued.
    pub request_count: usize,

    /// Total amount of time spent transacting with the backend.
    pub elapsed_time: Duration,

    /// Total amount of waiting time due to backend rate limiting
    /// (a subset of `elapsed_time`).
    pub rate_limited_time: Duration,
}

/// A transport for dashboard API calls.
///
/// `ApiSender` implements the underlying transport of requests to, and
/// responses from, the dashboard backend. Implementations decide how a
/// request description and its parameters become a wire call; callers
/// never touch HTTP directly.
pub trait ApiSender {
    /// Byte stream produced by [`send_streaming`](ApiSender::send_streaming).
    type ByteStream: Stream<Item = crate::Result<Bytes>> + Unpin;

    /// Send an [`ApiRequest`] with JSON parameters, returning the raw
    /// JSON response body.
    fn send(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> impl Future<Output = crate::Result<serde_json::Value>>;

    /// Send an [`ApiRequest`] and hand back the response body as an
    /// incremental byte stream instead of a parsed document.
    fn send_streaming(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> impl Future<Output = crate::Result<Self::ByteStream>>;

    /// Get transport statistics.
    fn transport_stats(&self) -> ApiTransportStats;

    /// Get the API base url.
    fn base_url(&self) -> String;
}

/// A trait that extends [`ApiSender`] with typed decode helpers.
pub trait ApiSenderExt: ApiSender {
    /// Send a request and deserialize the raw response body.
    fn send_decoded<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> impl Future<Output = crate::Result<T>> {
        async move {
            let value = self.send(request, params).await?;
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Send a request and unwrap the backend's `{success, data}`
    /// envelope into its payload.
    fn send_api<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> impl Future<Output = crate::Result<T>> {
        async move {
            tracing::trace!(%request, "sending api request");
            let value = self.send(request, params).await?;
            decode_data(value)
        }
    }
}

impl<S: ApiSender> ApiSenderExt for S {}
