//! Configuration for the acquisition pipeline.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{AcquireError, ErrorContext, Result};
use crate::sources::{ResponseFormat, SourceDescriptor};

/// Datastore query endpoint of the Bogotá open-data portal.
pub const DEFAULT_PRIMARY_ENDPOINT: &str =
    "https://datosabiertos.bogota.gov.co/api/3/action/datastore_search";
/// Resource holding the under-five malnutrition records.
pub const DEFAULT_RESOURCE_ID: &str = "c8fe2dd0-5ad1-4023-86b2-135026f7ecf1";

const PORTAL_DATASET_URL: &str = "https://datosabiertos.bogota.gov.co/dataset/9776e238-8f4a-40d4-a473-37e9cc0b2ef0/resource/c8fe2dd0-5ad1-4023-86b2-135026f7ecf1/download";
const NATIONAL_PORTAL_CSV: &str =
    "https://www.datos.gov.co/api/views/gt2j-8ykr/rows.csv?accessType=DOWNLOAD";

/// Seed used for the synthetic fallback unless configured otherwise.
pub const DEFAULT_SEED: u64 = 42;
/// Rows produced by the synthetic fallback unless configured otherwise.
pub const DEFAULT_SAMPLE_COUNT: usize = 2000;

/// The alternative sources tried after the primary endpoint fails.
pub fn default_alternatives() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "portal-metadata-csv",
            format!("{PORTAL_DATASET_URL}/metadato_malnutricion5anos.csv"),
            ResponseFormat::DelimitedText,
        ),
        SourceDescriptor::new(
            "portal-download-csv",
            format!("{PORTAL_DATASET_URL}/datos_malnutricion.csv"),
            ResponseFormat::DelimitedText,
        ),
        SourceDescriptor::new(
            "national-portal-csv",
            NATIONAL_PORTAL_CSV,
            ResponseFormat::DelimitedText,
        ),
    ]
}

/// Configuration for [`AcquisitionPipeline`](crate::pipeline::AcquisitionPipeline).
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    primary_endpoint: String,
    resource_id: String,
    page_size: usize,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_retry_delay: Duration,
    verify_tls: bool,
    user_agent: String,
    alternatives: Vec<SourceDescriptor>,
    synthetic_seed: u64,
    synthetic_samples: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionConfig {
    /// Create a configuration pointing at the public portal.
    pub fn new() -> Self {
        Self {
            primary_endpoint: DEFAULT_PRIMARY_ENDPOINT.to_string(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            page_size: 1000,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
            verify_tls: true,
            user_agent: format!("nutrition-acquire/{}", env!("CARGO_PKG_VERSION")),
            alternatives: default_alternatives(),
            synthetic_seed: DEFAULT_SEED,
            synthetic_samples: DEFAULT_SAMPLE_COUNT,
        }
    }

    /// A configuration that never touches the network: no primary endpoint
    /// and no alternatives, so the pipeline goes straight to synthetic data.
    pub fn offline() -> Self {
        Self::new()
            .with_primary_endpoint("")
            .with_alternatives(Vec::new())
    }

    /// Set the primary paged endpoint. An empty string disables it.
    pub fn with_primary_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.primary_endpoint = endpoint.into();
        self
    }

    /// Set the resource queried on the primary endpoint.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }

    /// Set the number of records requested per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries for a single request.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay of the exponential retry backoff.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the longest single wait between retries, including waits asked
    /// for by a `Retry-After` header.
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Enable or disable TLS certificate verification. Enabled by default.
    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        if !verify {
            warn!("TLS certificate verification disabled");
        }
        self.verify_tls = verify;
        self
    }

    /// Set the User-Agent header sent with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace the ordered list of alternative sources.
    pub fn with_alternatives(mut self, alternatives: Vec<SourceDescriptor>) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// Set the seed for the synthetic fallback.
    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = seed;
        self
    }

    /// Set the number of synthetic rows.
    pub fn with_synthetic_samples(mut self, samples: usize) -> Self {
        self.synthetic_samples = samples;
        self
    }

    pub fn primary_endpoint(&self) -> &str {
        &self.primary_endpoint
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    pub fn max_retry_delay(&self) -> Duration {
        self.max_retry_delay
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn alternatives(&self) -> &[SourceDescriptor] {
        &self.alternatives
    }

    pub fn synthetic_seed(&self) -> u64 {
        self.synthetic_seed
    }

    pub fn synthetic_samples(&self) -> usize {
        self.synthetic_samples
    }

    /// Checks that the configuration can drive a fetch.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Configuration`] for a zero page size or an
    /// endpoint that is not an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AcquireError::Configuration(
                "page_size must be greater than zero".to_string(),
            ));
        }
        if !self.primary_endpoint.is_empty() {
            parse_endpoint(&self.primary_endpoint)?;
        }
        for source in &self.alternatives {
            parse_endpoint(source.endpoint())
                .with_context(|| format!("source '{}'", source.id()))?;
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Parses a configuration from JSON text. Missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(text)
            .map_err(|e| AcquireError::Configuration(format!("invalid config JSON: {e}")))?;
        let config = file.apply(Self::new());
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint)
        .map_err(|e| AcquireError::Configuration(format!("invalid endpoint '{endpoint}': {e}")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    primary_endpoint: Option<String>,
    resource_id: Option<String>,
    page_size: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    verify_tls: Option<bool>,
    user_agent: Option<String>,
    alternatives: Option<Vec<SourceDescriptor>>,
    synthetic_seed: Option<u64>,
    synthetic_samples: Option<usize>,
}

impl ConfigFile {
    fn apply(self, mut config: AcquisitionConfig) -> AcquisitionConfig {
        if let Some(v) = self.primary_endpoint {
            config = config.with_primary_endpoint(v);
        }
        if let Some(v) = self.resource_id {
            config = config.with_resource_id(v);
        }
        if let Some(v) = self.page_size {
            config = config.with_page_size(v);
        }
        if let Some(v) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.max_retries {
            config = config.with_max_retries(v);
        }
        if let Some(v) = self.retry_base_delay_ms {
            config = config.with_retry_base_delay(Duration::from_millis(v));
        }
        if let Some(v) = self.max_retry_delay_ms {
            config = config.with_max_retry_delay(Duration::from_millis(v));
        }
        if let Some(v) = self.verify_tls {
            config = config.with_tls_verification(v);
        }
        if let Some(v) = self.user_agent {
            config = config.with_user_agent(v);
        }
        if let Some(v) = self.alternatives {
            config = config.with_alternatives(v);
        }
        if let Some(v) = self.synthetic_seed {
            config = config.with_synthetic_seed(v);
        }
        if let Some(v) = self.synthetic_samples {
            config = config.with_synthetic_samples(v);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AcquisitionConfig::new();
        assert_eq!(config.primary_endpoint(), DEFAULT_PRIMARY_ENDPOINT);
        assert_eq!(config.page_size(), 1000);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.verify_tls());
        assert_eq!(config.max_retry_delay(), Duration::from_secs(10));
        assert_eq!(config.synthetic_seed(), 42);
        assert_eq!(config.synthetic_samples(), 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_alternatives_are_direct_downloads() {
        let alternatives = default_alternatives();
        let ids: Vec<&str> = alternatives.iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            ["portal-metadata-csv", "portal-download-csv", "national-portal-csv"]
        );
        assert!(alternatives[0]
            .endpoint()
            .ends_with("/download/metadato_malnutricion5anos.csv"));
        assert!(alternatives
            .iter()
            .all(|s| s.format() == &ResponseFormat::DelimitedText
                && s.endpoint() != DEFAULT_PRIMARY_ENDPOINT));
    }

    #[test]
    fn test_offline_has_no_endpoints() {
        let config = AcquisitionConfig::offline();
        assert!(config.primary_endpoint().is_empty());
        assert!(config.alternatives().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let err = AcquisitionConfig::new().with_page_size(0).validate();
        assert!(matches!(err, Err(AcquireError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_relative_source() {
        let config = AcquisitionConfig::new().with_alternatives(vec![SourceDescriptor::new(
            "broken",
            "not a url",
            ResponseFormat::DelimitedText,
        )]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_from_json_str_overrides() {
        let config = AcquisitionConfig::from_json_str(
            r#"{
                "page_size": 250,
                "timeout_secs": 5,
                "verify_tls": false,
                "max_retry_delay_ms": 1500,
                "alternatives": [
                    {"id": "mirror", "endpoint": "http://localhost:9/data.csv", "format": {"type": "delimited_text"}},
                    {"id": "store", "endpoint": "http://localhost:9/api", "format": {"type": "paged_json", "resource_id": "abc"}}
                ],
                "synthetic_seed": 7
            }"#,
        )
        .unwrap();

        assert_eq!(config.page_size(), 250);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(!config.verify_tls());
        assert_eq!(config.max_retry_delay(), Duration::from_millis(1500));
        assert_eq!(config.alternatives()[0].id(), "mirror");
        assert_eq!(
            config.alternatives()[1].format(),
            &ResponseFormat::PagedJson {
                resource_id: "abc".to_string()
            }
        );
        assert_eq!(config.synthetic_seed(), 7);
        assert_eq!(config.synthetic_samples(), DEFAULT_SAMPLE_COUNT);
    }

    #[test]
    fn test_from_json_str_rejects_unknown_fields() {
        assert!(AcquisitionConfig::from_json_str(r#"{"pagesize": 10}"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acquire.json");
        std::fs::write(&path, r#"{"synthetic_samples": 10}"#).unwrap();

        let config = AcquisitionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.synthetic_samples(), 10);
    }
}
