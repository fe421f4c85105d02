//! Consumers of an acquired [`Table`](crate::table::Table).
//!
//! [`CsvSink`] persists the table; [`ReportSink`] computes descriptive
//! statistics over it.

mod csv;
mod report;

pub use csv::CsvSink;
pub use report::{
    CategoricalSummary, Correlation, DatasetReport, NumericSummary, ReportSink, ValueCount,
};
