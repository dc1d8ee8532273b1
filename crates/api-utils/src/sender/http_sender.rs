//! HTTP sender implementation.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use backon::{DefaultSleeper, Sleeper};
use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::{header, StatusCode};
use url::Url;
use web_time::Instant;

use super::{ApiSender, ApiTransportStats};
use crate::{
    credentials::CredentialStore,
    request::{query_pairs, ApiRequest},
};

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Byte stream handed out by [`HttpSender::send_streaming`].
        pub type HttpByteStream = futures_util::stream::LocalBoxStream<'static, crate::Result<Bytes>>;
    } else {
        /// Byte stream handed out by [`HttpSender::send_streaming`].
        pub type HttpByteStream = futures_util::stream::BoxStream<'static, crate::Result<Bytes>>;
    }
}

/// HTTP sender configuration.
#[derive(Debug, Clone)]
pub struct HttpSenderConfig {
    /// Bound on each non-streaming request. `None` disables it.
    ///
    /// Streaming requests are exempt: a healthy stream may legitimately
    /// outlive any per-request bound.
    pub request_timeout: Option<Duration>,
    /// Retries allowed when the backend responds 429.
    pub rate_limit_retries: usize,
}

impl Default for HttpSenderConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(10)),
            rate_limit_retries: 5,
        }
    }
}

/// HTTP sender implementation.
pub struct HttpSender {
    client: Arc<reqwest::Client>,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
    config: HttpSenderConfig,
    stats: RwLock<ApiTransportStats>,
    // Use backon::DefaultSleeper for cross-platform sleep.
    sleeper: DefaultSleeper,
}

impl HttpSender {
    /// Create an HTTP sender with the default reqwest client and config.
    pub fn new(
        base_url: impl AsRef<str>,
        credentials: Arc<dyn CredentialStore>,
    ) -> crate::Result<Self> {
        Self::new_with_client(base_url, credentials, Default::default(), Default::default())
    }

    /// Create an HTTP sender with a custom config.
    pub fn new_with_config(
        base_url: impl AsRef<str>,
        credentials: Arc<dyn CredentialStore>,
        config: HttpSenderConfig,
    ) -> crate::Result<Self> {
        Self::new_with_client(base_url, credentials, Default::default(), config)
    }

    /// Create an HTTP sender.
    pub fn new_with_client(
        base_url: impl AsRef<str>,
        credentials: Arc<dyn CredentialStore>,
        client: reqwest::Client,
        config: HttpSenderConfig,
    ) -> crate::Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // `Url::join` drops the last path segment unless the base ends
        // with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Arc::new(client),
            base_url,
            credentials,
            config,
            stats: Default::default(),
            sleeper: DefaultSleeper::default(),
        })
    }

    fn request_url(&self, request: &ApiRequest) -> crate::Result<Url> {
        Ok(self.base_url.join(&request.path())?)
    }

    fn build_request(
        &self,
        request: &ApiRequest,
        params: &serde_json::Value,
    ) -> crate::Result<reqwest::RequestBuilder> {
        let url = self.request_url(request)?;
        let mut builder = self.client.request(request.method(), url);

        if request.params_in_query() {
            let pairs = query_pairs(params)?;
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        } else if !params.is_null() {
            builder = builder.json(params);
        }

        // The credential lives in durable client storage and may have
        // been refreshed since the previous call.
        if let Some(token) = self.credentials.access_token() {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        Ok(builder)
    }
}

struct StatsUpdater<'a> {
    stats: &'a RwLock<ApiTransportStats>,
    request_start_time: Instant,
    rate_limited_time: Duration,
}

impl<'a> StatsUpdater<'a> {
    fn new(stats: &'a RwLock<ApiTransportStats>) -> Self {
        Self {
            stats,
            request_start_time: Instant::now(),
            rate_limited_time: Duration::default(),
        }
    }

    fn add_rate_limited_time(&mut self, duration: Duration) {
        self.rate_limited_time += duration;
    }
}

impl Drop for StatsUpdater<'_> {
    fn drop(&mut self) {
        let mut stats = self.stats.write().unwrap();
        stats.request_count += 1;
        stats.elapsed_time += Instant::now().duration_since(self.request_start_time);
        stats.rate_limited_time += self.rate_limited_time;
    }
}

/// Pause before retrying a rate-limited request. A numeric
/// `Retry-After` below two minutes is honoured; anything else (absent,
/// an HTTP date, or an excessive value) falls back to a short fixed
/// pause.
fn rate_limit_delay(retry_after: Option<&header::HeaderValue>) -> Duration {
    retry_after
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|seconds| *seconds < 120)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_millis(500))
}

fn into_transport_error(err: reqwest::Error) -> crate::Error {
    if err.is_timeout() {
        crate::Error::Timeout
    } else {
        crate::Error::Reqwest(err)
    }
}

async fn status_error(response: reqwest::Response) -> crate::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(1024).collect();
    crate::Error::Status {
        status,
        body: snippet,
    }
}

impl ApiSender for HttpSender {
    type ByteStream = HttpByteStream;

    async fn send(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> crate::Result<serde_json::Value> {
        let mut stats_updater = StatsUpdater::new(&self.stats);

        let mut rate_limit_retries = self.config.rate_limit_retries;
        loop {
            let builder = self.build_request(&request, &params)?;

            #[cfg(not(target_arch = "wasm32"))]
            let builder = match self.config.request_timeout {
                Some(timeout) => builder.timeout(timeout),
                None => builder,
            };

            let response = builder.send().await.map_err(into_transport_error)?;

            if !response.status().is_success() {
                if response.status() == StatusCode::TOO_MANY_REQUESTS && rate_limit_retries > 0 {
                    let duration = rate_limit_delay(response.headers().get(header::RETRY_AFTER));

                    rate_limit_retries -= 1;
                    tracing::debug!(
                        %request,
                        "rate limited, {rate_limit_retries} retries left, pausing for {duration:?}"
                    );

                    self.sleeper.sleep(duration).await;
                    stats_updater.add_rate_limited_time(duration);
                    continue;
                }
                return Err(status_error(response).await);
            }

            return response
                .json::<serde_json::Value>()
                .await
                .map_err(into_transport_error);
        }
    }

    async fn send_streaming(
        &self,
        request: ApiRequest,
        params: serde_json::Value,
    ) -> crate::Result<Self::ByteStream> {
        let _stats_updater = StatsUpdater::new(&self.stats);

        let builder = self.build_request(&request, &params)?;
        let response = builder.send().await.map_err(into_transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let stream = response.bytes_stream().map_err(into_transport_error);
        Ok(Box::pin(stream) as HttpByteStream)
    }

    fn transport_stats(&self) -> ApiTransportStats {
        self.stats.read().unwrap().clone()
    }

    fn base_url(&self) -> String {
        self.base_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use reqwest::header::HeaderValue;

    use crate::{credentials::StaticCredentials, request::ApiRequest, sender::ApiSender};

    use super::{rate_limit_delay, HttpSender};

    fn sender(base: &str) -> HttpSender {
        HttpSender::new(base, Arc::new(StaticCredentials::new("token"))).unwrap()
    }

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let sender = sender("https://api.hubdash.example/api/v1");
        assert_eq!(sender.base_url(), "https://api.hubdash.example/api/v1/");
    }

    #[test]
    fn request_urls_join_below_the_base_path() {
        let sender = sender("https://api.hubdash.example/api/v1/");
        let url = sender.request_url(&ApiRequest::ListParticipants).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.hubdash.example/api/v1/cohort/participant/all/"
        );

        let url = sender
            .request_url(&ApiRequest::DeleteParticipant { id: "p-3".into() })
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.hubdash.example/api/v1/cohort/participant/p-3/"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpSender::new("not a url", Arc::new(StaticCredentials::unauthenticated())).is_err());
    }

    #[test]
    fn rate_limit_delay_honours_numeric_retry_after() {
        assert_eq!(rate_limit_delay(None), Duration::from_millis(500));
        assert_eq!(
            rate_limit_delay(Some(&HeaderValue::from_static("3"))),
            Duration::from_secs(3)
        );
        assert_eq!(
            rate_limit_delay(Some(&HeaderValue::from_static("0"))),
            Duration::ZERO
        );
        assert_eq!(
            rate_limit_delay(Some(&HeaderValue::from_static("119"))),
            Duration::from_secs(119)
        );
        // The two-minute cap and HTTP-date forms fall back to the
        // default pause.
        assert_eq!(
            rate_limit_delay(Some(&HeaderValue::from_static("120"))),
            Duration::from_millis(500)
        );
        assert_eq!(
            rate_limit_delay(Some(&HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"))),
            Duration::from_millis(500)
        );
    }
}
