//! Prelude for commonly used types and traits in nutrition-acquire.

pub use crate::classifier::{classify, NutritionalStatus};
pub use crate::config::AcquisitionConfig;
pub use crate::error::{AcquireError, ErrorContext, ErrorKind, Result};
pub use crate::fetch::{PageResult, PageSource, PagedFetcher};
pub use crate::logging::LogConfig;
pub use crate::pipeline::{Acquisition, AcquisitionPipeline, Provenance};
pub use crate::sinks::{CsvSink, DatasetReport, ReportSink};
pub use crate::sources::{ResponseFormat, SourceDescriptor, SourceFallbackChain};
pub use crate::synthetic::SyntheticGenerator;
pub use crate::table::{Record, Table, Value};
