//! Paginated participant loading.
//!
//! The traversal fetches page 1 first so the dashboard can render
//! within one round-trip, then follows `next_page` links, retrying each
//! page with exponential backoff and skipping pages that stay dead.
//! Every successful page is merged into the set fetched so far and
//! written back to the store, so partial progress is always visible.

use std::time::Duration;

use backon::{DefaultSleeper, Sleeper};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use typed_builder::TypedBuilder;

use hubdash_api_utils::{ApiRequest, ApiSender, ApiSenderExt, Paged, Pagination};

use crate::{
    store::{LoadError, ParticipantStore},
    types::{participant::decode_lenient, Participant},
};

/// Tuning knobs for the paginated traversal.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Page size requested from the backend.
    pub page_limit: u32,
    /// Attempts per page before it is abandoned.
    pub max_page_attempts: u32,
    /// Delay before the first retry of a page; doubles per attempt.
    pub base_backoff: Duration,
    /// Ceiling on the retry delay.
    pub max_backoff: Duration,
    /// Consecutive abandoned pages that abort the traversal.
    pub max_consecutive_failures: u32,
    /// Abandoned pages in total that abort the traversal.
    pub max_failed_pages: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            max_page_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            max_consecutive_failures: 3,
            max_failed_pages: 5,
        }
    }
}

/// Options for a participant fetch.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(from_wasm_abi))]
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct FetchOptions {
    /// Re-fetch even when the cached set is still fresh.
    #[serde(default)]
    #[builder(default)]
    pub force: bool,
    /// Leave the global loading flag untouched, for background
    /// refreshes that must not flash spinners.
    #[serde(default)]
    #[builder(default)]
    pub silent: bool,
    /// Follow `next_page` to the end instead of stopping after the
    /// first page.
    #[serde(default = "default_load_all")]
    #[builder(default = true)]
    pub load_all: bool,
}

fn default_load_all() -> bool {
    true
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Result of a fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The cached set was fresh; nothing was fetched.
    Fresh,
    /// Another load already held the store; nothing was fetched.
    InFlight,
    /// A traversal ran.
    Completed(FetchReport),
}

impl FetchOutcome {
    /// The report of the traversal, if one ran.
    pub fn report(&self) -> Option<&FetchReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Summary of a completed traversal.
#[cfg_attr(js, derive(tsify_next::Tsify))]
#[cfg_attr(js, tsify(into_wasm_abi))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Pages fetched successfully.
    pub pages_fetched: u32,
    /// Pages abandoned after exhausting their retries.
    pub failed_pages: Vec<u32>,
    /// Participants in the store when the traversal finished.
    pub total: usize,
    /// Whether a failure breaker ended the traversal early.
    pub aborted_early: bool,
}

impl FetchReport {
    /// User-visible warning when the visible data may be incomplete.
    pub fn partial_warning(&self) -> Option<String> {
        (!self.failed_pages.is_empty())
            .then(|| LoadError::Partial(self.failed_pages.clone()).to_string())
    }
}

pub(crate) async fn run_paged_fetch<S: ApiSender>(
    sender: &S,
    store: &ParticipantStore,
    config: &FetchConfig,
    options: &FetchOptions,
) -> crate::Result<FetchOutcome> {
    if !options.force && store.is_fresh() {
        tracing::debug!("participant cache is fresh, skipping fetch");
        return Ok(FetchOutcome::Fresh);
    }
    let Some(_guard) = store.begin_fetch() else {
        tracing::debug!("a participant load is already in flight, skipping fetch");
        return Ok(FetchOutcome::InFlight);
    };

    if !options.silent {
        store.set_loading(true);
    }
    store.set_error(None);

    let result = traverse(sender, store, config, options).await;

    if !options.silent {
        store.set_loading(false);
    }

    match result {
        Ok(report) => {
            if !report.failed_pages.is_empty() {
                store.set_error(Some(LoadError::Partial(report.failed_pages.clone())));
            }
            Ok(FetchOutcome::Completed(report))
        }
        Err(err) => {
            store.set_error(Some(load_error(&err)));
            Err(err)
        }
    }
}

async fn traverse<S: ApiSender>(
    sender: &S,
    store: &ParticipantStore,
    config: &FetchConfig,
    options: &FetchOptions,
) -> crate::Result<FetchReport> {
    let sleeper = DefaultSleeper::default();
    let mut merged = IndexMap::new();
    let mut report = FetchReport::default();

    // Page 1 is all the UI needs to render; fetch it before anything
    // else and write it back immediately. Its failure fails the load.
    let first = fetch_page_with_retries(sender, config, &sleeper, 1).await?;
    merge_page(&mut merged, first.records);
    report.pages_fetched += 1;
    write_back(store, &merged);
    store.set_loaded(true);

    let mut reached_end = !first.pagination.has_next;
    if options.load_all && !reached_end {
        let mut next = advance(first.pagination.next_page, 1);
        let mut last_known_next = first.pagination.next_page;
        let mut consecutive_failures = 0u32;
        while let Some(current) = next {
            match fetch_page_with_retries(sender, config, &sleeper, current).await {
                Ok(page) => {
                    consecutive_failures = 0;
                    merge_page(&mut merged, page.records);
                    report.pages_fetched += 1;
                    write_back(store, &merged);
                    if !page.pagination.has_next {
                        reached_end = true;
                        break;
                    }
                    last_known_next = page.pagination.next_page;
                    next = advance(page.pagination.next_page, current);
                }
                Err(err) => {
                    tracing::warn!(page = current, %err, "page abandoned after retries");
                    report.failed_pages.push(current);
                    consecutive_failures += 1;
                    if consecutive_failures >= config.max_consecutive_failures
                        || report.failed_pages.len() >= config.max_failed_pages
                    {
                        report.aborted_early = true;
                        break;
                    }
                    next = Some(next_page_after_failure(last_known_next, current));
                }
            }
        }
    }

    report.total = merged.len();
    // Freshness is only stamped on a clean, complete pass; partial or
    // truncated loads must stay refetchable.
    if reached_end && report.failed_pages.is_empty() {
        store.record_full_load();
    }
    Ok(report)
}

struct FetchedPage {
    records: Vec<Participant>,
    pagination: Pagination,
}

async fn fetch_page<S: ApiSender>(
    sender: &S,
    config: &FetchConfig,
    page: u32,
) -> crate::Result<FetchedPage> {
    let paged: Paged<serde_json::Value> = sender
        .send_api(
            ApiRequest::ListParticipants,
            json!({ "page": page, "limit": config.page_limit }),
        )
        .await?;
    let records = paged
        .results
        .into_iter()
        .filter_map(decode_lenient)
        .collect();
    Ok(FetchedPage {
        records,
        pagination: paged.pagination,
    })
}

async fn fetch_page_with_retries<S: ApiSender>(
    sender: &S,
    config: &FetchConfig,
    sleeper: &DefaultSleeper,
    page: u32,
) -> crate::Result<FetchedPage> {
    let mut attempt = 0;
    loop {
        match fetch_page(sender, config, page).await {
            Ok(fetched) => return Ok(fetched),
            Err(err) => {
                attempt += 1;
                if attempt >= config.max_page_attempts.max(1) {
                    return Err(err);
                }
                let delay = backoff_delay(config, attempt - 1);
                tracing::debug!(page, attempt, ?delay, %err, "page fetch failed, backing off");
                sleeper.sleep(delay).await;
            }
        }
    }
}

/// Delay before retry number `retry` (zero-based) of a page.
fn backoff_delay(config: &FetchConfig, retry: u32) -> Duration {
    let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
    config
        .base_backoff
        .saturating_mul(factor)
        .min(config.max_backoff)
}

/// Next page to request after a successful `current`. The server
/// pointer is followed only when it moves forward; `has_next` with a
/// missing, self- or backward-pointing `next_page` stops the traversal
/// rather than guessing a number or looping.
fn advance(next_page: Option<u32>, current: u32) -> Option<u32> {
    match next_page {
        Some(next) if next > current => Some(next),
        other => {
            tracing::warn!(
                page = current,
                next_page = ?other,
                "pagination does not advance, stopping the traversal"
            );
            None
        }
    }
}

/// Where to resume after abandoning `failed`. Prefers the last
/// server-declared `next_page` when it is ahead of the failed page.
fn next_page_after_failure(last_known_next: Option<u32>, failed: u32) -> u32 {
    match last_known_next {
        Some(next) if next > failed => next,
        _ => failed.saturating_add(1),
    }
}

fn merge_page(merged: &mut IndexMap<String, Participant>, records: Vec<Participant>) {
    for record in records {
        // Later occurrences win so overlapping pages refresh earlier ones.
        merged.insert(record.id.clone(), record);
    }
}

fn write_back(store: &ParticipantStore, merged: &IndexMap<String, Participant>) {
    store.replace_all(merged.values().cloned().collect());
}

fn load_error(err: &crate::Error) -> LoadError {
    if err.is_timeout() {
        LoadError::Timeout
    } else {
        LoadError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{page_value, participant_value, MockSender};
    use crate::store::StoreConfig;
    use hubdash_api_utils::Error as ApiError;
    use serde_json::json;

    fn store() -> ParticipantStore {
        ParticipantStore::default()
    }

    fn config() -> FetchConfig {
        FetchConfig {
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(80),
            ..Default::default()
        }
    }

    fn options() -> FetchOptions {
        FetchOptions::default()
    }

    #[tokio::test(start_paused = true)]
    async fn multi_page_dataset_is_merged_and_stamped_fresh() -> eyre::Result<()> {
        crate::client::mock::init_tracing();
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![
                participant_value("a", "2026-05-03T00:00:00Z"),
                participant_value("b", "2026-05-02T00:00:00Z"),
            ],
            1,
            Some(2),
        ));
        sender.push_ok(page_value(
            vec![participant_value("c", "2026-05-01T00:00:00Z")],
            2,
            None,
        ));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.pages_fetched, 2);
        assert!(report.failed_pages.is_empty());
        assert_eq!(report.total, 3);
        assert!(!report.aborted_early);
        assert!(report.partial_warning().is_none());

        let snapshot = store.snapshot();
        let ids = snapshot
            .participants
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(snapshot.has_loaded);
        assert!(snapshot.error.is_none());
        assert!(store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn first_page_timeouts_exhaust_retries_and_fail_the_load() {
        let sender = MockSender::new();
        for _ in 0..3 {
            sender.push_err(ApiError::Timeout);
        }
        let store = store();

        let err = run_paged_fetch(&sender, &store, &config(), &options())
            .await
            .expect_err("load should fail");
        assert!(err.is_timeout());
        assert_eq!(sender.call_count(), 3);
        for (request, params) in sender.calls() {
            assert_eq!(request, ApiRequest::ListParticipants);
            assert_eq!(params["page"], json!(1));
        }

        let snapshot = store.snapshot();
        assert!(!snapshot.has_loaded);
        assert!(snapshot.participants.is_empty());
        assert_eq!(snapshot.error, Some(LoadError::Timeout));
        assert!(!snapshot.loading);
        assert!(!store.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn first_page_rejection_sets_a_request_error() {
        let sender = MockSender::new();
        for _ in 0..3 {
            sender.push_err(ApiError::Api("cohort is closed".to_string()));
        }
        let store = store();

        let err = run_paged_fetch(&sender, &store, &config(), &options())
            .await
            .expect_err("load should fail");
        assert!(!err.is_timeout());

        let error = store.snapshot().error.expect("error recorded");
        assert!(matches!(&error, LoadError::Request(msg) if msg.contains("cohort is closed")));
        assert!(error.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn dead_middle_page_is_skipped_with_a_partial_warning() -> eyre::Result<()> {
        crate::client::mock::init_tracing();
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            Some(2),
        ));
        for _ in 0..3 {
            sender.push_err(ApiError::custom("boom"));
        }
        // The traversal advances to page 3 after abandoning page 2.
        sender.push_ok(page_value(
            vec![participant_value("c", "2026-05-01T00:00:00Z")],
            3,
            None,
        ));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.failed_pages, vec![2]);
        assert!(!report.aborted_early);
        assert!(report
            .partial_warning()
            .expect("partial data warning")
            .contains("pages 2"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.participants.len(), 2);
        assert_eq!(snapshot.error, Some(LoadError::Partial(vec![2])));
        assert!(snapshot.has_loaded);
        // Incomplete loads are never stamped fresh.
        assert!(!store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_trip_the_breaker() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            Some(2),
        ));
        // Pages 2, 3 and 4 each fail three attempts.
        for _ in 0..9 {
            sender.push_err(ApiError::custom("down"));
        }
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.failed_pages, vec![2, 3, 4]);
        assert!(report.aborted_early);
        assert_eq!(sender.call_count(), 10);

        // The page that did load stays visible.
        let snapshot = store.snapshot();
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(snapshot.error, Some(LoadError::Partial(vec![2, 3, 4])));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_budget_trips_the_breaker() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-05T00:00:00Z")],
            1,
            Some(2),
        ));
        for _ in 0..3 {
            sender.push_err(ApiError::custom("down"));
        }
        sender.push_ok(page_value(
            vec![participant_value("c", "2026-05-03T00:00:00Z")],
            3,
            Some(4),
        ));
        for _ in 0..3 {
            sender.push_err(ApiError::custom("down"));
        }
        let store = store();
        let config = FetchConfig {
            max_failed_pages: 2,
            ..config()
        };

        let outcome = run_paged_fetch(&sender, &store, &config, &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.failed_pages, vec![2, 4]);
        assert!(report.aborted_early);
        assert_eq!(report.pages_fetched, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn records_seen_twice_are_deduplicated() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![
                participant_value("a", "2026-05-03T00:00:00Z"),
                participant_value("b", "2026-05-02T00:00:00Z"),
            ],
            1,
            Some(2),
        ));
        sender.push_ok(page_value(
            vec![
                participant_value("b", "2026-05-02T00:00:00Z"),
                participant_value("c", "2026-05-01T00:00:00Z"),
            ],
            2,
            None,
        ));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(outcome.report().expect("traversal ran").total, 3);
        assert_eq!(store.snapshot().participants.len(), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_short_circuits_unless_forced() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        ));
        let store = store();

        run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(sender.call_count(), 1);

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(outcome, FetchOutcome::Fresh);
        assert_eq!(sender.call_count(), 1);

        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        ));
        let forced = FetchOptions::builder().force(true).build();
        let outcome = run_paged_fetch(&sender, &store, &config(), &forced).await?;
        assert!(matches!(outcome, FetchOutcome::Completed(_)));
        assert_eq!(sender.call_count(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_freshness_window_refetches() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        ));
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        ));
        let store = ParticipantStore::new(StoreConfig {
            freshness_window: Duration::ZERO,
        });

        run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert!(matches!(outcome, FetchOutcome::Completed(_)));
        assert_eq!(sender.call_count(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetch_is_rejected_by_the_guard() -> eyre::Result<()> {
        let sender = MockSender::new();
        let store = store();
        let guard = store.begin_fetch().expect("take the guard");

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(outcome, FetchOutcome::InFlight);
        assert_eq!(sender.call_count(), 0);
        assert!(store.snapshot().error.is_none());
        drop(guard);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn load_all_false_stops_after_the_first_page() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            Some(2),
        ));
        let store = store();
        let options = FetchOptions::builder().load_all(false).build();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(sender.call_count(), 1);
        assert!(store.snapshot().has_loaded);
        // A truncated load is not a full load.
        assert!(!store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_dataset_is_fresh_even_without_load_all() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        ));
        let store = store();
        let options = FetchOptions::builder().load_all(false).build();

        run_paged_fetch(&sender, &store, &config(), &options).await?;
        // Page 1 reported no further pages, so the dataset is complete.
        assert!(store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn has_next_without_a_pointer_stops_after_page_one() -> eyre::Result<()> {
        crate::client::mock::init_tracing();
        let sender = MockSender::new();
        let mut page = page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            None,
        );
        page["data"]["pagination"]["has_next"] = json!(true);
        sender.push_ok(page);
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.pages_fetched, 1);
        assert!(report.failed_pages.is_empty());
        assert_eq!(sender.call_count(), 1);
        assert_eq!(store.snapshot().participants.len(), 1);
        // Completeness is unknown, so the next call refetches.
        assert!(!store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn self_pointing_pagination_cannot_loop() -> eyre::Result<()> {
        crate::client::mock::init_tracing();
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![participant_value("a", "2026-05-03T00:00:00Z")],
            1,
            Some(2),
        ));
        sender.push_ok(page_value(
            vec![participant_value("b", "2026-05-02T00:00:00Z")],
            2,
            Some(2),
        ));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        let report = outcome.report().expect("traversal ran");
        assert_eq!(report.pages_fetched, 2);
        assert!(report.failed_pages.is_empty());
        assert_eq!(sender.call_count(), 2);
        assert_eq!(store.snapshot().participants.len(), 2);
        assert!(!store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn empty_dataset_still_counts_as_loaded() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(Vec::new(), 1, None));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(outcome.report().expect("traversal ran").total, 0);

        let snapshot = store.snapshot();
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.has_loaded);
        assert!(store.is_fresh());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_records_are_skipped_not_fatal() -> eyre::Result<()> {
        let sender = MockSender::new();
        sender.push_ok(page_value(
            vec![
                participant_value("a", "2026-05-03T00:00:00Z"),
                json!({"id": "broken"}),
            ],
            1,
            None,
        ));
        let store = store();

        let outcome = run_paged_fetch(&sender, &store, &config(), &options()).await?;
        assert_eq!(outcome.report().expect("traversal ran").total, 1);
        assert_eq!(store.snapshot().participants.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_is_set_unless_silent() -> eyre::Result<()> {
        use std::sync::{Arc, Mutex};

        struct SpySender {
            mock: MockSender,
            store: Arc<ParticipantStore>,
            loading_at_call: Mutex<Vec<bool>>,
        }

        impl ApiSender for SpySender {
            type ByteStream = <MockSender as ApiSender>::ByteStream;

            async fn send(
                &self,
                request: ApiRequest,
                params: serde_json::Value,
            ) -> hubdash_api_utils::Result<serde_json::Value> {
                self.loading_at_call
                    .lock()
                    .unwrap()
                    .push(self.store.snapshot().loading);
                self.mock.send(request, params).await
            }

            async fn send_streaming(
                &self,
                request: ApiRequest,
                params: serde_json::Value,
            ) -> hubdash_api_utils::Result<Self::ByteStream> {
                self.mock.send_streaming(request, params).await
            }

            fn transport_stats(&self) -> hubdash_api_utils::ApiTransportStats {
                self.mock.transport_stats()
            }

            fn base_url(&self) -> String {
                self.mock.base_url()
            }
        }

        let store = Arc::new(store());
        let mock = MockSender::new();
        mock.push_ok(page_value(Vec::new(), 1, None));
        let spy = SpySender {
            mock,
            store: store.clone(),
            loading_at_call: Mutex::new(Vec::new()),
        };

        run_paged_fetch(&spy, &store, &config(), &options()).await?;
        assert_eq!(*spy.loading_at_call.lock().unwrap(), vec![true]);
        assert!(!store.snapshot().loading);

        spy.mock.push_ok(page_value(Vec::new(), 1, None));
        let silent = FetchOptions::builder().force(true).silent(true).build();
        run_paged_fetch(&spy, &store, &config(), &silent).await?;
        assert_eq!(*spy.loading_at_call.lock().unwrap(), vec![true, false]);
        Ok(())
    }

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let config = FetchConfig {
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            ..Default::default()
        };
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 4), Duration::from_secs(8));
        assert_eq!(backoff_delay(&config, 30), Duration::from_secs(8));
    }

    #[test]
    fn advancement_requires_a_forward_pointer() {
        assert_eq!(advance(Some(2), 1), Some(2));
        assert_eq!(advance(Some(9), 4), Some(9));
        assert_eq!(advance(Some(4), 4), None);
        assert_eq!(advance(Some(3), 4), None);
        assert_eq!(advance(None, 4), None);
    }

    #[test]
    fn failure_advance_prefers_the_known_next_page() {
        assert_eq!(next_page_after_failure(None, 4), 5);
        assert_eq!(next_page_after_failure(Some(4), 4), 5);
        assert_eq!(next_page_after_failure(Some(7), 4), 7);
    }
}
