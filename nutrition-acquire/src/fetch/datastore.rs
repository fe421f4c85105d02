//! CKAN `datastore_search` page source.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{JsonRecord, PageResult, PageSource};
use crate::error::{AcquireError, Result};
use crate::http::HttpClient;
use crate::logging::truncate_field;

#[derive(Debug, Deserialize)]
struct DatastoreResponse {
    #[serde(default)]
    success: bool,
    result: Option<DatastoreResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DatastoreResult {
    total: Option<u64>,
    #[serde(default)]
    records: Vec<JsonRecord>,
}

/// Queries `GET {endpoint}?resource_id=..&limit=..&offset=..`.
#[derive(Debug, Clone)]
pub struct DatastoreClient {
    http: HttpClient,
    endpoint: String,
    resource_id: String,
    cancel: CancellationToken,
}

impl DatastoreClient {
    pub fn new(
        http: HttpClient,
        endpoint: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            resource_id: resource_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight retries when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

/// Interprets a datastore response body.
pub(crate) fn parse_page(body: &str) -> Result<PageResult> {
    let response: DatastoreResponse = serde_json::from_str(body).map_err(|e| {
        AcquireError::protocol(format!(
            "malformed datastore response ({e}): {}",
            truncate_field(body, 120)
        ))
    })?;

    if !response.success {
        let detail = response
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error detail".to_string());
        return Err(AcquireError::protocol(format!(
            "datastore reported success=false: {detail}"
        )));
    }

    let result = response
        .result
        .ok_or_else(|| AcquireError::protocol("datastore response has no result object"))?;

    Ok(PageResult::new(result.records, result.total))
}

#[async_trait]
impl PageSource for DatastoreClient {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<PageResult> {
        let query = [
            ("resource_id", self.resource_id.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        let response = self.http.get(&self.endpoint, &query, &self.cancel).await?;
        parse_page(&response.body)
    }

    fn description(&self) -> String {
        format!("datastore {} ({})", self.endpoint, self.resource_id)
    }
}
