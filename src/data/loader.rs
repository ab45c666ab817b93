use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{RawRecord, RawTable};
use crate::config::DataConfig;
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a raw pixel table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – one row per pixel, `File`, `Label` and `frq*` columns
/// * `.parquet` – same columns; numeric frequency columns of any width
/// * `.json`    – `[{ "File": "...", "Label": "...", "frq_400": 0.1, ... }, ...]`
///
/// Column names come from `config`. Frequency columns are kept in file order.
/// Empty cells, nulls and `NaN` become `NaN` (missing).
pub fn load_file(path: &Path, config: &DataConfig) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path, config),
        "parquet" | "pq" => load_parquet(path, config),
        "json" => load_json(path, config),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    info!(
        "loaded {} rows with {} frequency columns from {}",
        table.len(),
        table.frequency_columns.len(),
        path.display()
    );
    Ok(table)
}

/// Locate the required and frequency columns in a header row.
struct ColumnLayout {
    file_idx: usize,
    label_idx: usize,
    frequency_idx: Vec<usize>,
    frequency_names: Vec<String>,
}

impl ColumnLayout {
    fn resolve<'a>(
        headers: impl IntoIterator<Item = &'a str>,
        config: &DataConfig,
    ) -> std::result::Result<Self, PipelineError> {
        let mut file_idx = None;
        let mut label_idx = None;
        let mut frequency_idx = Vec::new();
        let mut frequency_names = Vec::new();

        for (i, name) in headers.into_iter().enumerate() {
            if name == config.file_column {
                file_idx = Some(i);
            } else if name == config.label_column {
                label_idx = Some(i);
            } else if name.starts_with(&config.frequency_prefix) {
                frequency_idx.push(i);
                frequency_names.push(name.to_string());
            } else {
                debug!("ignoring column '{name}'");
            }
        }

        let file_idx =
            file_idx.ok_or_else(|| PipelineError::MissingColumn(config.file_column.clone()))?;
        let label_idx =
            label_idx.ok_or_else(|| PipelineError::MissingColumn(config.label_column.clone()))?;
        if frequency_idx.is_empty() {
            return Err(PipelineError::NoFrequencyColumns {
                prefix: config.frequency_prefix.clone(),
            });
        }

        Ok(Self {
            file_idx,
            label_idx,
            frequency_idx,
            frequency_names,
        })
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, config: &DataConfig) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let layout = ColumnLayout::resolve(headers.iter(), config)?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let frequencies = layout
            .frequency_idx
            .iter()
            .map(|&i| {
                let cell = record.get(i).unwrap_or("");
                parse_cell(cell).with_context(|| {
                    format!("CSV row {row_no}, column '{}': '{cell}' is not a number", &headers[i])
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        records.push(RawRecord {
            file: record.get(layout.file_idx).unwrap_or("").to_string(),
            label: record.get(layout.label_idx).unwrap_or("").to_string(),
            frequencies,
        });
    }

    Ok(RawTable::new(layout.frequency_names, records)?)
}

/// Parse a numeric cell; blanks and the usual NA spellings are missing.
fn parse_cell(cell: &str) -> Result<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || matches!(trimmed, "NA" | "N/A" | "NaN" | "nan" | "null") {
        return Ok(f64::NAN);
    }
    Ok(trimmed.parse::<f64>()?)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by Pandas (`df.to_parquet()`) or Polars.
///
/// `File` and `Label` may be any type castable to text; frequency columns
/// any numeric type (cast to `Float64`, nulls become `NaN`).
fn load_parquet(path: &Path, config: &DataConfig) -> Result<RawTable> {
    read_parquet_batches(path, config, PARQUET_BATCH_ROWS)
}

const PARQUET_BATCH_ROWS: usize = 8192;

fn read_parquet_batches(
    path: &Path,
    config: &DataConfig,
    batch_rows: usize,
) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder
        .with_batch_size(batch_rows)
        .build()
        .context("building parquet reader")?;

    let mut frequency_names: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let layout = ColumnLayout::resolve(
            schema.fields().iter().map(|f| f.name().as_str()),
            config,
        )?;

        let files = text_column(batch.column(layout.file_idx))
            .with_context(|| format!("reading '{}'", config.file_column))?;
        let labels = text_column(batch.column(layout.label_idx))
            .with_context(|| format!("reading '{}'", config.label_column))?;
        let columns = layout
            .frequency_idx
            .iter()
            .zip(&layout.frequency_names)
            .map(|(&i, name)| {
                float_column(batch.column(i)).with_context(|| format!("reading '{name}'"))
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        for row in 0..batch.num_rows() {
            records.push(RawRecord {
                file: files[row].clone(),
                label: labels[row].clone(),
                frequencies: columns.iter().map(|c| c[row]).collect(),
            });
        }

        frequency_names.get_or_insert(layout.frequency_names);
    }

    let Some(frequency_names) = frequency_names else {
        bail!("Parquet file contains no record batches");
    };
    Ok(RawTable::new(frequency_names, records)?)
}

// -- Arrow helpers --

/// Read any column as text; nulls become empty strings.
fn text_column(col: &Arc<dyn Array>) -> Result<Vec<String>> {
    let utf8 = cast(col, &DataType::Utf8).context("casting column to Utf8")?;
    let strings = utf8.as_string::<i32>();
    Ok((0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                String::new()
            } else {
                strings.value(i).to_string()
            }
        })
        .collect())
}

/// Read a numeric column as `f64`; nulls become `NaN`.
fn float_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let as_f64 = cast(col, &DataType::Float64)
        .with_context(|| format!("column type {:?} is not numeric", col.data_type()))?;
    let values = as_f64
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64Array after cast")?;
    Ok(values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`). Column order is
/// taken from the first record.
fn load_json(path: &Path, config: &DataConfig) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    let rows = root.as_array().context("Expected top-level JSON array")?;

    let Some(first) = rows.first().and_then(|r| r.as_object()) else {
        bail!("JSON file contains no records");
    };
    let layout = ColumnLayout::resolve(first.keys().map(|k| k.as_str()), config)?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let frequencies = layout
            .frequency_names
            .iter()
            .map(|name| match obj.get(name) {
                None | Some(JsonValue::Null) => Ok(f64::NAN),
                Some(v) => v
                    .as_f64()
                    .with_context(|| format!("Row {i}, '{name}': not a number")),
            })
            .collect::<Result<Vec<f64>>>()?;

        records.push(RawRecord {
            file: json_text(obj.get(&config.file_column)),
            label: json_text(obj.get(&config.label_column)),
            frequencies,
        });
    }

    Ok(RawTable::new(layout.frequency_names, records)?)
}

fn json_text(val: Option<&JsonValue>) -> String {
    match val {
        Some(JsonValue::String(s)) => s.clone(),
        None | Some(JsonValue::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}
