//! Descriptive statistics over an acquired table.
//!
//! The table is registered in a DataFusion [`SessionContext`] under the name
//! `data` and summarised with SQL aggregates: `COUNT`, `AVG`, `STDDEV`, `MIN`
//! and `MAX` for numeric columns, grouped counts for categorical columns, and
//! `CORR` for every pair of numeric columns.

use std::fmt;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::table::Table;

const TABLE_NAME: &str = "data";

/// Summary of one numeric column. Statistics are `None` when the column has
/// no non-null values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: u64,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Frequency of one value in a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
    /// Share of the column's non-null values, in percent.
    pub percentage: f64,
}

/// Value counts of one categorical column, most frequent first unless the
/// column was requested in value order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub non_null: u64,
    pub values: Vec<ValueCount>,
}

/// Pearson correlation between two numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub coefficient: Option<f64>,
}

/// The result of [`ReportSink::describe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub rows: usize,
    pub columns: usize,
    /// Null cells per column, in schema order.
    pub null_counts: Vec<(String, usize)>,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    /// Present only when at least two numeric columns were summarised.
    pub correlations: Option<Vec<Correlation>>,
}

/// Computes a [`DatasetReport`] with DataFusion.
#[derive(Debug, Clone)]
pub struct ReportSink {
    top_n: usize,
    value_ordered: Vec<String>,
}

impl Default for ReportSink {
    fn default() -> Self {
        Self {
            top_n: 10,
            value_ordered: Vec::new(),
        }
    }
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values listed per categorical column.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Lists every value of `column` in ascending value order instead of the
    /// most frequent first, e.g. cases per year.
    pub fn with_value_order(mut self, column: impl Into<String>) -> Self {
        self.value_ordered.push(column.into());
        self
    }

    /// Summarises `table`.
    ///
    /// Requested columns that do not exist are skipped with a warning, as are
    /// requested numeric columns whose values are not numeric.
    #[instrument(skip_all, fields(rows = table.len()))]
    pub async fn describe(
        &self,
        table: &Table,
        numeric: &[&str],
        categorical: &[&str],
    ) -> Result<DatasetReport> {
        let batch = table.to_record_batch()?;
        let null_counts = table
            .columns()
            .iter()
            .zip(batch.columns())
            .map(|(name, array)| (name.clone(), array.null_count()))
            .collect();

        let ctx = SessionContext::new();
        ctx.register_batch(TABLE_NAME, batch.clone())?;

        let mut numeric_summaries = Vec::new();
        for &column in numeric {
            let Some(field) = batch.schema().column_with_name(column).map(|(_, f)| f.clone())
            else {
                warn!(column, "Numeric column not found, skipping");
                continue;
            };
            if !field.data_type().is_numeric() {
                warn!(column, data_type = %field.data_type(), "Column is not numeric, skipping");
                continue;
            }
            numeric_summaries.push(summarise_numeric(&ctx, column).await?);
        }

        let mut categorical_summaries = Vec::new();
        for &column in categorical {
            if batch.schema().column_with_name(column).is_none() {
                warn!(column, "Categorical column not found, skipping");
                continue;
            }
            categorical_summaries.push(self.summarise_categorical(&ctx, column).await?);
        }

        let correlations = if numeric_summaries.len() >= 2 {
            let names: Vec<&str> = numeric_summaries.iter().map(|s| s.column.as_str()).collect();
            Some(correlate(&ctx, &names).await?)
        } else {
            debug!(
                numeric = numeric_summaries.len(),
                "Fewer than two numeric columns, no correlations"
            );
            None
        };

        Ok(DatasetReport {
            rows: table.len(),
            columns: table.columns().len(),
            null_counts,
            numeric: numeric_summaries,
            categorical: categorical_summaries,
            correlations,
        })
    }

    async fn summarise_categorical(
        &self,
        ctx: &SessionContext,
        column: &str,
    ) -> Result<CategoricalSummary> {
        let ident = quote_identifier(column);
        let non_null_sql = format!("SELECT COUNT({ident}) FROM {TABLE_NAME}");
        let non_null = first_f64(&ctx.sql(&non_null_sql).await?.collect().await?, 0)?
            .unwrap_or(0.0) as u64;

        let sql = if self.value_ordered.iter().any(|c| c == column) {
            format!(
                "SELECT {ident} AS category, COUNT(*) AS freq \
                 FROM {TABLE_NAME} WHERE {ident} IS NOT NULL \
                 GROUP BY {ident} \
                 ORDER BY category ASC"
            )
        } else {
            format!(
                "SELECT CAST({ident} AS VARCHAR) AS category, COUNT(*) AS freq \
                 FROM {TABLE_NAME} WHERE {ident} IS NOT NULL \
                 GROUP BY CAST({ident} AS VARCHAR) \
                 ORDER BY freq DESC, category ASC LIMIT {}",
                self.top_n
            )
        };
        let batches = ctx.sql(&sql).await?.collect().await?;

        let mut values = Vec::new();
        for batch in &batches {
            let labels = cast(batch.column(0), &DataType::Utf8)?;
            let labels = labels.as_string::<i32>();
            let counts = cast(batch.column(1), &DataType::Int64)?;
            let counts = counts.as_primitive::<Int64Type>();
            for row in 0..batch.num_rows() {
                let count = counts.value(row) as u64;
                values.push(ValueCount {
                    value: labels.value(row).to_string(),
                    count,
                    percentage: percentage(count, non_null),
                });
            }
        }

        Ok(CategoricalSummary {
            column: column.to_string(),
            non_null,
            values,
        })
    }
}

async fn summarise_numeric(ctx: &SessionContext, column: &str) -> Result<NumericSummary> {
    let ident = quote_identifier(column);
    let value = format!("CAST({ident} AS DOUBLE)");
    let sql = format!(
        "SELECT COUNT({ident}), AVG({value}), STDDEV({value}), MIN({value}), MAX({value}) \
         FROM {TABLE_NAME}"
    );
    let batches = ctx.sql(&sql).await?.collect().await?;

    Ok(NumericSummary {
        column: column.to_string(),
        count: first_f64(&batches, 0)?.unwrap_or(0.0) as u64,
        mean: first_f64(&batches, 1)?,
        std_dev: first_f64(&batches, 2)?,
        min: first_f64(&batches, 3)?,
        max: first_f64(&batches, 4)?,
    })
}

/// Every unordered pair of `columns`, in one query.
async fn correlate(ctx: &SessionContext, columns: &[&str]) -> Result<Vec<Correlation>> {
    let mut pairs = Vec::new();
    for (i, left) in columns.iter().enumerate() {
        for right in &columns[i + 1..] {
            pairs.push((*left, *right));
        }
    }

    let expressions: Vec<String> = pairs
        .iter()
        .map(|(left, right)| {
            format!(
                "CORR(CAST({} AS DOUBLE), CAST({} AS DOUBLE))",
                quote_identifier(left),
                quote_identifier(right)
            )
        })
        .collect();
    let sql = format!("SELECT {} FROM {TABLE_NAME}", expressions.join(", "));
    let batches = ctx.sql(&sql).await?.collect().await?;

    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (left, right))| {
            Ok(Correlation {
                left: left.to_string(),
                right: right.to_string(),
                coefficient: first_f64(&batches, index)?,
            })
        })
        .collect()
}

/// The first row of an aggregate result, as `f64`.
fn first_f64(batches: &[RecordBatch], column: usize) -> Result<Option<f64>> {
    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let array = cast(batch.column(column), &DataType::Float64)?;
    let values = array.as_primitive::<Float64Type>();
    Ok((values.is_valid(0) && !values.value(0).is_nan()).then(|| values.value(0)))
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows: {}  Columns: {}", self.rows, self.columns)?;

        let with_nulls: Vec<_> = self.null_counts.iter().filter(|(_, n)| *n > 0).collect();
        if with_nulls.is_empty() {
            writeln!(f, "Missing values: none")?;
        } else {
            writeln!(f, "Missing values:")?;
            for (column, nulls) in with_nulls {
                writeln!(f, "  {column}: {nulls}")?;
            }
        }

        if !self.numeric.is_empty() {
            writeln!(f, "\nNumeric columns:")?;
            writeln!(
                f,
                "  {:<24} {:>8} {:>12} {:>12} {:>12} {:>12}",
                "column", "count", "mean", "std", "min", "max"
            )?;
            for s in &self.numeric {
                writeln!(
                    f,
                    "  {:<24} {:>8} {:>12} {:>12} {:>12} {:>12}",
                    s.column,
                    s.count,
                    fmt_stat(s.mean),
                    fmt_stat(s.std_dev),
                    fmt_stat(s.min),
                    fmt_stat(s.max)
                )?;
            }
        }

        for summary in &self.categorical {
            writeln!(f, "\n{} ({} values):", summary.column, summary.non_null)?;
            for v in &summary.values {
                writeln!(f, "  {:<32} {:>8} {:>6.1}%", v.value, v.count, v.percentage)?;
            }
        }

        if let Some(correlations) = &self.correlations {
            writeln!(f, "\nCorrelations:")?;
            for c in correlations {
                writeln!(f, "  {} ~ {}: {}", c.left, c.right, fmt_stat(c.coefficient))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn sample_table() -> Table {
        Table::from_rows(
            vec![
                "LOCALIDAD".to_string(),
                "EDAD_MESES".to_string(),
                "PESO_KG".to_string(),
            ],
            vec![
                vec![Value::from("SUBA"), Value::Int(10), Value::Float(8.0)],
                vec![Value::from("SUBA"), Value::Int(20), Value::Float(13.0)],
                vec![Value::from("BOSA"), Value::Int(30), Value::Float(18.0)],
                vec![Value::Null, Value::Int(40), Value::Null],
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_numeric_summary() {
        let report = ReportSink::new()
            .describe(&sample_table(), &["EDAD_MESES", "PESO_KG"], &[])
            .await
            .unwrap();

        let age = &report.numeric[0];
        assert_eq!(age.count, 4);
        assert_eq!(age.mean, Some(25.0));
        assert_eq!(age.min, Some(10.0));
        assert_eq!(age.max, Some(40.0));

        let weight = &report.numeric[1];
        assert_eq!(weight.count, 3);
        assert_eq!(weight.mean, Some(13.0));
        assert!((weight.std_dev.unwrap() - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_correlation_between_linear_columns() {
        let table = Table::from_rows(
            vec!["EDAD_MESES".to_string(), "PESO_KG".to_string()],
            vec![
                vec![Value::Int(10), Value::Float(8.0)],
                vec![Value::Int(20), Value::Float(13.0)],
                vec![Value::Int(30), Value::Float(18.0)],
            ],
        )
        .unwrap();
        let report = ReportSink::new()
            .describe(&table, &["EDAD_MESES", "PESO_KG"], &[])
            .await
            .unwrap();

        let correlations = report.correlations.unwrap();
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].left, "EDAD_MESES");
        assert!((correlations[0].coefficient.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_single_numeric_column_has_no_correlations() {
        let report = ReportSink::new()
            .describe(&sample_table(), &["EDAD_MESES"], &["LOCALIDAD"])
            .await
            .unwrap();
        assert!(report.correlations.is_none());
        assert!(!report.to_string().contains("Correlations"));
    }

    #[tokio::test]
    async fn test_categorical_counts_exclude_nulls() {
        let report = ReportSink::new()
            .describe(&sample_table(), &[], &["LOCALIDAD"])
            .await
            .unwrap();

        let summary = &report.categorical[0];
        assert_eq!(summary.non_null, 3);
        assert_eq!(summary.values[0].value, "SUBA");
        assert_eq!(summary.values[0].count, 2);
        assert!((summary.values[0].percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.values[1].value, "BOSA");
    }

    #[tokio::test]
    async fn test_top_n_limits_values() {
        let report = ReportSink::new()
            .with_top_n(1)
            .describe(&sample_table(), &[], &["LOCALIDAD"])
            .await
            .unwrap();
        assert_eq!(report.categorical[0].values.len(), 1);
    }

    #[tokio::test]
    async fn test_value_order_lists_years_ascending() {
        let years = [2021, 2019, 2021, 2020, 2021, 2019, 2022, 2018, 2020, 2021, 2023, 2017];
        let table = Table::from_rows(
            vec!["AÑO".to_string()],
            years.iter().map(|&y| vec![Value::Int(y)]).collect(),
        )
        .unwrap();

        let report = ReportSink::new()
            .with_top_n(3)
            .with_value_order("AÑO")
            .describe(&table, &[], &["AÑO"])
            .await
            .unwrap();

        let summary = &report.categorical[0];
        let listed: Vec<(&str, u64)> = summary
            .values
            .iter()
            .map(|v| (v.value.as_str(), v.count))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("2017", 1),
                ("2018", 1),
                ("2019", 2),
                ("2020", 2),
                ("2021", 4),
                ("2022", 1),
                ("2023", 1),
            ]
        );
        assert_eq!(summary.non_null, 12);
    }

    #[tokio::test]
    async fn test_missing_and_text_columns_are_skipped() {
        let report = ReportSink::new()
            .describe(&sample_table(), &["LOCALIDAD", "TALLA_CM"], &["SEXO"])
            .await
            .unwrap();
        assert!(report.numeric.is_empty());
        assert!(report.categorical.is_empty());
        assert!(report.correlations.is_none());
    }

    #[tokio::test]
    async fn test_null_counts_and_display() {
        let report = ReportSink::new()
            .describe(&sample_table(), &["PESO_KG"], &["LOCALIDAD"])
            .await
            .unwrap();

        assert_eq!(report.rows, 4);
        assert_eq!(report.columns, 3);
        assert_eq!(
            report.null_counts,
            vec![
                ("LOCALIDAD".to_string(), 1),
                ("EDAD_MESES".to_string(), 0),
                ("PESO_KG".to_string(), 1),
            ]
        );

        let text = report.to_string();
        assert!(text.contains("Rows: 4  Columns: 3"));
        assert!(text.contains("PESO_KG"));
        assert!(text.contains("SUBA"));
    }
}
