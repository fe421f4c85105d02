//! # nutrition-acquire
//!
//! Resilient acquisition of the Bogotá under-five malnutrition dataset.
//!
//! ## Overview
//!
//! The dataset is published on an open-data portal whose endpoints are not
//! always reachable. [`AcquisitionPipeline`](pipeline::AcquisitionPipeline)
//! hides that behind a three-level fallback:
//!
//! 1. **Primary**: the portal's paginated `datastore_search` endpoint, read to
//!    completion by [`PagedFetcher`](fetch::PagedFetcher).
//! 2. **Alternatives**: an ordered list of direct downloads and datastore
//!    queries, tried one at a time by
//!    [`SourceFallbackChain`](sources::SourceFallbackChain).
//! 3. **Synthetic**: a seeded, reproducible table from
//!    [`SyntheticGenerator`](synthetic::SyntheticGenerator), labelled with the
//!    z-score [`classify`](classifier::classify) function.
//!
//! The pipeline always returns a non-empty [`Table`](table::Table) together
//! with its [`Provenance`](pipeline::Provenance).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nutrition_acquire::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let config = AcquisitionConfig::new().with_page_size(500);
//! let acquisition = AcquisitionPipeline::new(config)?.acquire().await;
//!
//! CsvSink::new().write(acquisition.table(), "data/malnutricion.csv")?;
//!
//! let report = ReportSink::new()
//!     .describe(acquisition.table(), &["PESO_KG", "TALLA_CM"], &["LOCALIDAD"])
//!     .await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Network failures are contained: transport and protocol errors end a single
//! source attempt, and exhaustion of every source ends in synthetic data. The
//! errors callers see come from configuration and the sinks.
//!
//! ## Logging
//!
//! Everything is logged through `tracing`. Binaries install a subscriber with
//! [`logging::setup::init_logging`]; [`logging::LogConfig`] controls the
//! per-page and per-source detail.

pub mod classifier;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod sinks;
pub mod sources;
pub mod synthetic;
pub mod table;
