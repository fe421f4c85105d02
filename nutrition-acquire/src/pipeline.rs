//! The acquisition pipeline.
//!
//! Primary paged endpoint, then the ordered alternatives, then synthetic
//! data. The last step cannot fail, so [`AcquisitionPipeline::acquire`]
//! always produces a non-empty table.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nutrition_acquire::prelude::*;
//!
//! # async fn run() -> nutrition_acquire::error::Result<()> {
//! let pipeline = AcquisitionPipeline::new(AcquisitionConfig::new())?;
//! let acquisition = pipeline.acquire().await;
//! println!("{} rows from {}", acquisition.table().len(), acquisition.provenance());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::AcquisitionConfig;
use crate::error::Result;
use crate::fetch::PagedFetcher;
use crate::http::HttpClient;
use crate::logging::LogConfig;
use crate::sources::SourceFallbackChain;
use crate::synthetic::SyntheticGenerator;
use crate::table::Table;

/// Which path produced a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// The primary paged endpoint.
    Primary,
    /// An alternative source, by descriptor id.
    FallbackSource(String),
    /// The seeded synthetic generator.
    Synthetic,
}

impl Provenance {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Provenance::Synthetic)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Primary => f.write_str("primary endpoint"),
            Provenance::FallbackSource(id) => write!(f, "fallback source '{id}'"),
            Provenance::Synthetic => f.write_str("synthetic data"),
        }
    }
}

/// The outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct Acquisition {
    table: Table,
    provenance: Provenance,
    acquired_at: DateTime<Utc>,
}

impl Acquisition {
    fn new(table: Table, provenance: Provenance) -> Self {
        Self {
            table,
            provenance,
            acquired_at: Utc::now(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// When the table was obtained.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn into_parts(self) -> (Table, Provenance) {
        (self.table, self.provenance)
    }
}

/// Runs the three-level fallback.
#[derive(Debug, Clone)]
pub struct AcquisitionPipeline {
    config: AcquisitionConfig,
    http: HttpClient,
    fetcher: PagedFetcher,
    chain: SourceFallbackChain,
    generator: SyntheticGenerator,
}

impl AcquisitionPipeline {
    /// Builds a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// [`AcquireError::Configuration`](crate::error::AcquireError::Configuration)
    /// when the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: AcquisitionConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::new(&config)?;
        let chain = SourceFallbackChain::new(http.clone(), config.page_size());
        Ok(Self {
            config,
            http,
            fetcher: PagedFetcher::new(),
            chain,
            generator: SyntheticGenerator::new(),
        })
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.fetcher = self.fetcher.with_log_config(log.clone());
        self.chain = self.chain.with_log_config(log);
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Acquires a table, falling back as needed.
    pub async fn acquire(&self) -> Acquisition {
        self.acquire_with_cancel(&CancellationToken::new()).await
    }

    /// Acquires a table, abandoning the network once `cancel` fires.
    ///
    /// A cancelled run still returns synthetic data.
    #[instrument(skip_all)]
    pub async fn acquire_with_cancel(&self, cancel: &CancellationToken) -> Acquisition {
        if self.config.primary_endpoint().is_empty() {
            info!("No primary endpoint configured");
        } else {
            match self
                .fetcher
                .fetch_endpoint(
                    &self.http,
                    self.config.primary_endpoint(),
                    self.config.resource_id(),
                    self.config.page_size(),
                    cancel,
                )
                .await
            {
                Ok(table) => {
                    info!(rows = table.len(), "Acquired table from primary endpoint");
                    return Acquisition::new(table, Provenance::Primary);
                }
                Err(e) => {
                    warn!(kind = %e.kind(), "Primary endpoint failed, trying alternatives: {}", e);
                }
            }
        }

        match self.chain.try_all(self.config.alternatives(), cancel).await {
            Ok((table, source_id)) => {
                info!(rows = table.len(), source = %source_id, "Acquired table from alternative source");
                return Acquisition::new(table, Provenance::FallbackSource(source_id));
            }
            Err(e) => {
                warn!("Falling back to synthetic data: {}", e);
            }
        }

        let samples = self.config.synthetic_samples().max(1);
        let table = self
            .generator
            .generate(samples, self.config.synthetic_seed());
        info!(
            rows = table.len(),
            seed = self.config.synthetic_seed(),
            "Generated synthetic table"
        );
        Acquisition::new(table, Provenance::Synthetic)
    }
}
