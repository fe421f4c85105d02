//! Acquire the malnutrition dataset and write it to CSV.
//!
//! Tries the primary endpoint, then the configured alternatives, and finally
//! generates synthetic data. Ctrl-C stops network probing and falls through to
//! the synthetic table.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nutrition_acquire::config::AcquisitionConfig;
use nutrition_acquire::logging::setup::{init_logging, LoggingConfig};
use nutrition_acquire::pipeline::AcquisitionPipeline;
use nutrition_acquire::sinks::{CsvSink, ReportSink};
use nutrition_acquire::synthetic::columns;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Where to write the acquired table.
    #[arg(long, short, default_value = "malnutricion_bogota.csv")]
    output: PathBuf,

    /// JSON configuration file. Command-line flags override its values.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Records requested per page from paginated endpoints.
    #[arg(long)]
    page_size: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Seed for the synthetic fallback.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of synthetic rows.
    #[arg(long)]
    samples: Option<usize>,

    /// Skip the network and generate synthetic data.
    #[arg(long)]
    offline: bool,

    /// Disable TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Print descriptive statistics of the acquired table.
    #[arg(long)]
    report: bool,
}

impl Args {
    fn build_config(&self) -> Result<AcquisitionConfig> {
        let mut config = match &self.config {
            Some(path) => AcquisitionConfig::from_json_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => AcquisitionConfig::new(),
        };

        if self.offline {
            config = config.with_primary_endpoint("").with_alternatives(Vec::new());
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(seed) = self.seed {
            config = config.with_synthetic_seed(seed);
        }
        if let Some(samples) = self.samples {
            config = config.with_synthetic_samples(samples);
        }
        if self.insecure {
            config = config.with_tls_verification(false);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig::default().with_json_format(args.json_logs))
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    let config = args.build_config()?;
    let pipeline = AcquisitionPipeline::new(config).context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, falling back to synthetic data");
            on_interrupt.cancel();
        }
    });

    let acquisition = pipeline.acquire_with_cancel(&cancel).await;
    let table = acquisition.table();

    CsvSink::new()
        .write(table, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), rows = table.len(), "Table written");

    if args.report {
        let numeric: Vec<&str> = columns::NUMERIC
            .iter()
            .copied()
            .filter(|c| table.column_index(c).is_some())
            .collect();
        let categorical: Vec<&str> = columns::CATEGORICAL
            .iter()
            .copied()
            .chain([columns::YEAR])
            .filter(|c| table.column_index(c).is_some())
            .collect();
        let report = ReportSink::new()
            .with_value_order(columns::YEAR)
            .describe(table, &numeric, &categorical)
            .await
            .context("failed to build report")?;
        println!("{report}");
    }

    println!(
        "{} rows from {} at {}, written to {}",
        table.len(),
        acquisition.provenance(),
        acquisition.acquired_at().to_rfc3339(),
        args.output.display()
    );
    Ok(())
}
