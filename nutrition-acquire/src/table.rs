//! In-memory tabular data model.
//!
//! A [`Table`] is an ordered sequence of [`Record`]s that all share the same
//! ordered column list. Tables are built once and then only read; conversions
//! such as [`Table::to_record_batch`] produce new values.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::Serialize;
use serde_json::Map;

use crate::error::{AcquireError, Result};

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing cell.
    Null,
    /// Integer cell.
    Int(i64),
    /// Floating point cell.
    Float(f64),
    /// Text cell.
    Str(String),
}

impl Value {
    /// Returns the numeric value of this cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer value of this cell, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text of this cell, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Str(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            nested => Value::Str(nested.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// An ordered mapping of column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, returning the record for chaining.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((column.into(), value.into()));
        self
    }

    /// Looks up a field by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in field order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Values in field order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// An ordered sequence of records sharing one column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    /// Builds a table, checking that every record carries exactly `columns`
    /// in the same order.
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(AcquireError::protocol(format!("duplicate column '{dup}'")));
        }

        for (index, record) in records.iter().enumerate() {
            if !record.columns().eq(columns.iter().map(String::as_str)) {
                return Err(AcquireError::protocol(format!(
                    "record {index} does not match the table columns"
                )));
            }
        }

        Ok(Self { columns, records })
    }

    /// Builds a table from positional rows.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AcquireError::protocol(format!(
                    "row {index} has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            records.push(columns.iter().cloned().zip(row).collect());
        }
        Self::new(columns, records)
    }

    /// Builds a table from rows the caller already produced in column order.
    pub(crate) fn from_trusted_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        let records = rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect();
        Self { columns, records }
    }

    /// Builds a table from flat JSON objects.
    ///
    /// The schema is the union of keys in first-seen order; a record without a
    /// key gets [`Value::Null`] in that column.
    pub fn from_json_records(records: &[Map<String, serde_json::Value>]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self::from_rows(columns, rows)
    }

    /// Parses delimited text with a header row.
    ///
    /// Column types are inferred over the whole payload; integer and float
    /// columns keep their numeric type, everything else is kept as text.
    pub fn from_csv_text(text: &str) -> Result<Self> {
        let format = Format::default().with_header(true);
        let (schema, _) = format.infer_schema(Cursor::new(text.as_bytes()), None)?;
        if schema.fields().is_empty() {
            return Err(AcquireError::protocol("delimited text has no columns"));
        }

        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_format(format)
            .build(Cursor::new(text.as_bytes()))?;

        let options = FormatOptions::default();
        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch?;
            let mut batch_rows = vec![Vec::with_capacity(columns.len()); batch.num_rows()];
            for array in batch.columns() {
                let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
                for (row, cells) in batch_rows.iter_mut().enumerate() {
                    cells.push(cell_value(array, &formatter, row));
                }
            }
            rows.extend(batch_rows);
        }

        Self::from_rows(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a column in the schema.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in record order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(
            self.records
                .iter()
                .map(|record| &record.fields[index].1)
                .collect(),
        )
    }

    /// Converts the table into an Arrow record batch.
    ///
    /// A column whose non-null values are all integers becomes `Int64`, one
    /// whose non-null values are all numeric becomes `Float64`, anything else
    /// becomes `Utf8`.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for (index, name) in self.columns.iter().enumerate() {
            let values: Vec<&Value> = self.records.iter().map(|r| &r.fields[index].1).collect();
            let (data_type, array) = build_array(&values);
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = arrow::record_batch::RecordBatchOptions::new()
            .with_row_count(Some(self.records.len()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }
}

fn cell_value(array: &ArrayRef, formatter: &ArrayFormatter<'_>, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
        _ => Value::Str(formatter.value(row).to_string()),
    }
}

fn build_array(values: &[&Value]) -> (DataType, ArrayRef) {
    let non_null = || values.iter().filter(|v| !v.is_null());
    let any_value = non_null().next().is_some();

    if any_value && non_null().all(|v| matches!(v, Value::Int(_))) {
        let array: Int64Array = values.iter().map(|v| v.as_i64()).collect();
        return (DataType::Int64, Arc::new(array));
    }

    if any_value && non_null().all(|v| v.as_f64().is_some()) {
        let array: Float64Array = values.iter().map(|v| v.as_f64()).collect();
        return (DataType::Float64, Arc::new(array));
    }

    let array: StringArray = values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    (DataType::Utf8, Arc::new(array))
}
