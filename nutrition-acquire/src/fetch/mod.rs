//! Offset-based pagination.
//!
//! [`PagedFetcher`] drives any [`PageSource`] from offset zero until the
//! source is drained, producing one [`Table`] with the records in arrival
//! order. [`DatastoreClient`] is the HTTP page source for CKAN-style
//! `datastore_search` endpoints.

mod datastore;

pub use datastore::DatastoreClient;

use async_trait::async_trait;
use serde_json::Map;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{AcquireError, ErrorContext, Result};
use crate::http::HttpClient;
use crate::log_page;
use crate::logging::LogConfig;
use crate::table::Table;

/// A flat JSON record as returned by the datastore.
pub type JsonRecord = Map<String, serde_json::Value>;

/// One page of a paginated result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    records: Vec<JsonRecord>,
    reported_total: Option<u64>,
}

impl PageResult {
    pub fn new(records: Vec<JsonRecord>, reported_total: Option<u64>) -> Self {
        Self {
            records,
            reported_total,
        }
    }

    pub fn records(&self) -> &[JsonRecord] {
        &self.records
    }

    /// Total size of the result set, when the server declared it.
    pub fn reported_total(&self) -> Option<u64> {
        self.reported_total
    }

    /// Number of records on this page.
    pub fn returned_count(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<JsonRecord> {
        self.records
    }
}

/// Something that can serve a page of records at an offset.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches up to `limit` records starting at `offset`.
    ///
    /// A failure is terminal for the whole pagination run.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<PageResult>;

    /// Returns a human-readable description of this source.
    fn description(&self) -> String;
}

/// Retrieves a complete result set from a paginated source.
#[derive(Debug, Clone, Default)]
pub struct PagedFetcher {
    log: LogConfig,
}

impl PagedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Paginates a `datastore_search` endpoint for `resource_id`.
    pub async fn fetch_endpoint(
        &self,
        http: &HttpClient,
        endpoint: &str,
        resource_id: &str,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Table> {
        let source = DatastoreClient::new(http.clone(), endpoint, resource_id)
            .with_cancellation(cancel.clone());
        self.fetch_all(&source, page_size, cancel).await
    }

    /// Fetches every page from `source`.
    ///
    /// The offset advances by the number of records actually returned, so
    /// short pages neither loop forever nor leave gaps. The run stops on an
    /// empty page, or once the offset reaches the total declared by the first
    /// page. Later pages are assumed to repeat or omit the total and are never
    /// allowed to change it.
    ///
    /// # Errors
    ///
    /// Any page failure aborts the run with no partial table. An empty result
    /// set is a protocol error, and cancellation is a transport error.
    #[instrument(skip(self, source, cancel), fields(source = %source.description()))]
    pub async fn fetch_all<S>(
        &self,
        source: &S,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Table>
    where
        S: PageSource + ?Sized,
    {
        if page_size == 0 {
            return Err(AcquireError::Configuration(
                "page size must be greater than zero".to_string(),
            ));
        }

        let mut offset = 0usize;
        let mut total: Option<u64> = None;
        let mut pages = 0usize;
        let mut records: Vec<JsonRecord> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::transport(format!(
                    "cancelled after {pages} pages"
                )));
            }

            let page = source
                .fetch_page(offset, page_size)
                .await
                .with_context(|| format!("page at offset {offset}"))?;

            if pages == 0 {
                total = page.reported_total();
            }
            pages += 1;

            let returned = page.returned_count();
            records.extend(page.into_records());
            offset += returned;

            log_page!(self.log, offset, total = ?total, returned, "Fetched page {}", pages);

            if returned == 0 {
                break;
            }
            if total.is_some_and(|t| offset as u64 >= t) {
                break;
            }
        }

        if records.is_empty() {
            return Err(AcquireError::protocol("result set contains no records"));
        }

        info!(records = records.len(), pages, total = ?total, "Pagination complete");
        Table::from_json_records(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn record(id: usize) -> JsonRecord {
        json!({"_id": id, "LOCALIDAD": "SUBA"})
            .as_object()
            .cloned()
            .unwrap()
    }

    /// Serves `available` records; later pages may report a different total.
    struct FakePages {
        available: usize,
        total: Option<u64>,
        total_on_later_pages: Option<u64>,
        max_page: Option<usize>,
        fail_at_offset: Option<usize>,
        cancel_after_first: Option<CancellationToken>,
        offsets: Mutex<Vec<usize>>,
    }

    impl FakePages {
        fn new(available: usize, total: Option<u64>) -> Self {
            Self {
                available,
                total,
                total_on_later_pages: total,
                max_page: None,
                fail_at_offset: None,
                cancel_after_first: None,
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakePages {
        async fn fetch_page(&self, offset: usize, limit: usize) -> Result<PageResult> {
            let first = self.offsets.lock().unwrap().is_empty();
            self.offsets.lock().unwrap().push(offset);
            if self.fail_at_offset == Some(offset) {
                return Err(AcquireError::http_status(500, "boom"));
            }
            let limit = self.max_page.map_or(limit, |m| m.min(limit));
            let end = (offset + limit).min(self.available);
            let records = (offset..end).map(record).collect();
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            let total = if first {
                self.total
            } else {
                self.total_on_later_pages
            };
            Ok(PageResult::new(records, total))
        }

        fn description(&self) -> String {
            "fake pages".to_string()
        }
    }

    #[tokio::test]
    async fn test_stops_at_reported_total() {
        let source = FakePages::new(2500, Some(2500));
        let table = PagedFetcher::new()
            .fetch_all(&source, 1000, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(table.len(), 2500);
        assert_eq!(source.offsets(), vec![0, 1000, 2000]);
    }

    #[tokio::test]
    async fn test_preserves_arrival_order() {
        let source = FakePages::new(25, Some(25));
        let table = PagedFetcher::new()
            .fetch_all(&source, 10, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<i64> = table
            .column("_id")
            .unwrap()
            .into_iter()
            .filter_map(|v| v.as_i64())
            .collect();
        assert_eq!(ids, (0..25).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_short_pages_advance_by_returned_count() {
        let mut source = FakePages::new(250, Some(250));
        source.max_page = Some(70);
        let table = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(table.len(), 250);
        assert_eq!(source.offsets(), vec![0, 70, 140, 210]);
    }

    #[tokio::test]
    async fn test_total_overstated_terminates_on_empty_page() {
        let source = FakePages::new(150, Some(400));
        let table = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(table.len(), 150);
        assert_eq!(source.offsets(), vec![0, 100, 150]);
    }

    #[tokio::test]
    async fn test_missing_total_relies_on_empty_page() {
        let source = FakePages::new(230, None);
        let table = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(table.len(), 230);
        assert_eq!(source.offsets(), vec![0, 100, 200, 230]);
    }

    #[tokio::test]
    async fn test_total_only_read_from_first_page() {
        let mut source = FakePages::new(300, Some(300));
        source.total_on_later_pages = Some(100);
        let table = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(table.len(), 300);
        assert_eq!(source.offsets(), vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn test_failed_page_discards_partial_result() {
        let mut source = FakePages::new(300, Some(300));
        source.fail_at_offset = Some(100);
        let err = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Protocol);
        assert!(err.to_string().contains("offset 100"));
        assert_eq!(source.offsets(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_empty_result_set_is_error() {
        let source = FakePages::new(0, Some(0));
        let err = PagedFetcher::new()
            .fetch_all(&source, 100, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let source = FakePages::new(10, Some(10));
        let err = PagedFetcher::new()
            .fetch_all(&source, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Configuration(_)));
        assert!(source.offsets().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let source = FakePages::new(10, Some(10));
        let token = CancellationToken::new();
        token.cancel();
        let err = PagedFetcher::new()
            .fetch_all(&source, 5, &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(source.offsets().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_between_pages() {
        let token = CancellationToken::new();
        let mut source = FakePages::new(300, Some(300));
        source.cancel_after_first = Some(token.clone());
        let err = PagedFetcher::new()
            .fetch_all(&source, 100, &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(err.to_string().contains("cancelled after 1 pages"));
        assert_eq!(source.offsets(), vec![0]);
    }
}
