//! Ordered fallback over alternative data sources.
//!
//! Each [`SourceDescriptor`] names an endpoint and the strategy used to read
//! it. [`SourceFallbackChain`] tries them strictly in order and returns the
//! first table it can build, or [`AcquireError::Exhausted`] listing why each
//! source was rejected.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{AcquireError, Result, SourceFailure};
use crate::fetch::PagedFetcher;
use crate::http::HttpClient;
use crate::log_source;
use crate::logging::{truncate_field, LogConfig};
use crate::table::Table;

/// Number of leading characters inspected for a delimiter.
const SNIFF_CHARS: usize = 100;

/// How a source's response is turned into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Direct download of delimited text with a header row.
    DelimitedText,
    /// Paginated `datastore_search` query for a resource.
    PagedJson { resource_id: String },
}

/// An alternative source, declared at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    id: String,
    endpoint: String,
    format: ResponseFormat,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            format,
        }
    }

    /// Shorthand for a direct CSV download.
    pub fn delimited(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(id, endpoint, ResponseFormat::DelimitedText)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn format(&self) -> &ResponseFormat {
        &self.format
    }
}

/// Tries alternative sources one at a time.
///
/// There are no retries at this layer; transient failures are already
/// retried by the [`HttpClient`].
#[derive(Debug, Clone)]
pub struct SourceFallbackChain {
    http: HttpClient,
    fetcher: PagedFetcher,
    page_size: usize,
    log: LogConfig,
}

impl SourceFallbackChain {
    pub fn new(http: HttpClient, page_size: usize) -> Self {
        Self {
            http,
            fetcher: PagedFetcher::new(),
            page_size,
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.fetcher = self.fetcher.with_log_config(log.clone());
        self.log = log;
        self
    }

    /// Returns the first table any source yields, with that source's id.
    ///
    /// # Errors
    ///
    /// [`AcquireError::Exhausted`] when every source failed, or when
    /// `sources` is empty. Sources not reached before cancellation are not
    /// listed.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn try_all(
        &self,
        sources: &[SourceDescriptor],
        cancel: &CancellationToken,
    ) -> Result<(Table, String)> {
        let mut failures = Vec::with_capacity(sources.len());

        for (position, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(skipped = sources.len() - position, "Cancelled, skipping remaining sources");
                break;
            }

            log_source!(
                self.log,
                source = source.id(),
                endpoint = %truncate_field(source.endpoint(), self.log.max_field_length),
                "Trying source {}/{}",
                position + 1,
                sources.len()
            );

            match self.fetch_source(source, cancel).await {
                Ok(table) => {
                    info!(
                        source = source.id(),
                        rows = table.len(),
                        columns = table.columns().len(),
                        "Source accepted"
                    );
                    return Ok((table, source.id().to_string()));
                }
                Err(e) => {
                    warn!(source = source.id(), kind = %e.kind(), "Source rejected: {}", e);
                    failures.push(SourceFailure::from_error(source.id(), &e));
                }
            }
        }

        Err(AcquireError::Exhausted { failures })
    }

    /// Reads one source with the strategy its format calls for.
    pub async fn fetch_source(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Table> {
        match source.format() {
            ResponseFormat::DelimitedText => self.fetch_delimited(source.endpoint(), cancel).await,
            ResponseFormat::PagedJson { resource_id } => {
                self.fetcher
                    .fetch_endpoint(
                        &self.http,
                        source.endpoint(),
                        resource_id,
                        self.page_size,
                        cancel,
                    )
                    .await
            }
        }
    }

    async fn fetch_delimited(&self, endpoint: &str, cancel: &CancellationToken) -> Result<Table> {
        let response = self.http.get(endpoint, &[], cancel).await?;
        parse_delimited(response.content_type.as_deref(), &response.body)
    }
}

/// True when the response declares a CSV content type, or a comma appears
/// among the first characters of the body.
pub(crate) fn looks_tabular(content_type: Option<&str>, body: &str) -> bool {
    let declared = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("csv"));
    declared || body.chars().take(SNIFF_CHARS).any(|c| c == ',')
}

/// Applies the acceptance check and parses a delimited-text body.
pub(crate) fn parse_delimited(content_type: Option<&str>, body: &str) -> Result<Table> {
    if body.trim().is_empty() {
        return Err(AcquireError::protocol("empty response body"));
    }
    if !looks_tabular(content_type, body) {
        return Err(AcquireError::protocol(format!(
            "response is not delimited text (content-type {})",
            content_type.unwrap_or("missing")
        )));
    }

    let table = Table::from_csv_text(body)
        .map_err(|e| AcquireError::protocol(format!("unparsable delimited text: {e}")))?;
    if table.columns().is_empty() || table.is_empty() {
        return Err(AcquireError::protocol("delimited text has no data rows"));
    }
    Ok(table)
}
