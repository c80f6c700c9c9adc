use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{Catalog, Column, FieldDescriptor};

/// Arrow field-metadata key holding a column's physical unit.
pub const UNIT_METADATA_KEY: &str = "unit";

/// File extensions understood by [`load_file`], in lookup order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["parquet", "pq", "json", "csv"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a catalog from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one column per field; a `unit` entry in any field's
///   metadata makes the result schema-bearing
/// * `.json`    – `{ "fields": [...], "columns": { name: [...] } }` or a
///   records array `[{ name: value, ... }, ...]`
/// * `.csv`     – header row plus numeric / `true` / `false` cells
pub fn load_file(path: &Path) -> Result<Catalog> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonField {
    name: String,
    #[serde(default)]
    unit: String,
}

/// Column-oriented layout:
///
/// ```json
/// {
///   "fields":  [{ "name": "psfFlux", "unit": "nJy" }, ...],
///   "columns": { "psfFlux": [12.5, 3.1], "psfFlux_flag": [false, true] }
/// }
/// ```
///
/// `fields` is optional; when present it fixes column order and makes the
/// catalog schema-bearing.  A top-level array is read as records instead
/// (`df.to_json(orient='records')`).
fn load_json(path: &Path) -> Result<Catalog> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => load_json_records(&records),
        JsonValue::Object(mut obj) => {
            let columns = obj
                .remove("columns")
                .context("Expected a 'columns' object or a top-level array")?;
            let columns = match columns {
                JsonValue::Object(map) => map,
                _ => bail!("'columns' must be an object of arrays"),
            };
            let fields: Option<Vec<JsonField>> = obj
                .remove("fields")
                .map(serde_json::from_value)
                .transpose()
                .context("parsing 'fields'")?;

            let order: Vec<String> = match &fields {
                Some(f) => f.iter().map(|f| f.name.clone()).collect(),
                None => columns.keys().cloned().collect(),
            };

            let mut out = Vec::with_capacity(order.len());
            for name in order {
                let values = columns
                    .get(&name)
                    .and_then(|v| v.as_array())
                    .with_context(|| format!("missing or invalid column '{name}'"))?;
                let col = json_values_to_column(values)
                    .with_context(|| format!("column '{name}'"))?;
                out.push((name, col));
            }

            let catalog = Catalog::from_columns(out)?;
            Ok(match fields {
                Some(f) => catalog.with_schema(
                    f.into_iter()
                        .map(|f| FieldDescriptor::new(f.name, f.unit))
                        .collect(),
                ),
                None => catalog,
            })
        }
        _ => bail!("Expected top-level JSON object or array"),
    }
}

fn load_json_records(records: &[JsonValue]) -> Result<Catalog> {
    let mut cells: BTreeMap<String, Vec<JsonValue>> = BTreeMap::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for (key, val) in obj {
            let column = cells.entry(key.clone()).or_default();
            if column.len() != i {
                bail!("Row {i}: column '{key}' missing from earlier rows");
            }
            column.push(val.clone());
        }
        if let Some((key, _)) = cells.iter().find(|(_, v)| v.len() != i + 1) {
            bail!("Row {i}: missing column '{key}'");
        }
    }

    let columns = cells
        .into_iter()
        .map(|(name, vals)| {
            let col = json_values_to_column(&vals).with_context(|| format!("column '{name}'"))?;
            Ok((name, col))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Catalog::from_columns(columns)?)
}

/// Pick the narrowest storage that holds every value.
fn json_values_to_column(values: &[JsonValue]) -> Result<Column> {
    if values.iter().all(JsonValue::is_boolean) {
        return Ok(Column::Bool(
            values.iter().map(|v| v.as_bool().unwrap_or(false)).collect(),
        ));
    }
    if values.iter().all(|v| v.as_i64().is_some()) {
        return Ok(Column::Int(
            values.iter().map(|v| v.as_i64().unwrap_or(0)).collect(),
        ));
    }
    values
        .iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            JsonValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            JsonValue::Number(n) => n.as_f64().with_context(|| format!("[{j}]: not a number")),
            other => bail!("[{j}]: expected number, got {other}"),
        })
        .collect::<Result<Vec<_>>>()
        .map(Column::Float)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one row per source.
/// Columns whose cells are all `true`/`false` become boolean; everything else
/// is parsed as `f64` with empty cells read as NaN.  No schema.
fn load_csv(path: &Path) -> Result<Catalog> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, cell) in cells.iter_mut().enumerate() {
            cell.push(record.get(col_idx).unwrap_or("").trim().to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| {
            let col = parse_csv_column(&raw).with_context(|| format!("CSV column '{name}'"))?;
            Ok((name, col))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Catalog::from_columns(columns)?)
}

fn parse_csv_column(raw: &[String]) -> Result<Column> {
    if !raw.is_empty() && raw.iter().all(|s| s == "true" || s == "false") {
        return Ok(Column::Bool(raw.iter().map(|s| s == "true").collect()));
    }
    raw.iter()
        .enumerate()
        .map(|(row, s)| {
            if s.is_empty() {
                return Ok(f64::NAN);
            }
            s.parse::<f64>()
                .with_context(|| format!("Row {row}: '{s}' is not a number"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Column::Float)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet catalog.
///
/// Numeric and boolean columns are kept; string or nested columns are
/// skipped.  Fields carrying a `unit` metadata entry make the catalog
/// schema-bearing; the schema then lists every kept field, with an empty
/// unit where none was recorded.
fn load_parquet(path: &Path) -> Result<Catalog> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let arrow_schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Option<Column>> = vec![None; arrow_schema.fields().len()];
    let mut skipped = vec![false; arrow_schema.fields().len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (idx, array) in batch.columns().iter().enumerate() {
            if skipped[idx] {
                continue;
            }
            let name = arrow_schema.field(idx).name();
            match array_to_column(array).with_context(|| format!("column '{name}'"))? {
                Some(chunk) => {
                    columns[idx] = Some(match columns[idx].take() {
                        Some(acc) => append_column(acc, chunk),
                        None => chunk,
                    });
                }
                None => {
                    log::debug!("skipping non-numeric column '{name}' ({:?})", array.data_type());
                    skipped[idx] = true;
                    columns[idx] = None;
                }
            }
        }
    }

    let mut kept = Vec::new();
    let mut descriptors = Vec::new();
    for (idx, field) in arrow_schema.fields().iter().enumerate() {
        if skipped[idx] {
            continue;
        }
        let col = columns[idx]
            .take()
            .unwrap_or_else(|| empty_column(field.data_type()));
        let unit = field.metadata().get(UNIT_METADATA_KEY).cloned();
        descriptors.push((field.name().clone(), unit));
        kept.push((field.name().clone(), col));
    }

    let catalog = Catalog::from_columns(kept)?;
    Ok(match parquet_schema(&arrow_schema, descriptors) {
        Some(schema) => catalog.with_schema(schema),
        None => catalog,
    })
}

fn parquet_schema(
    arrow_schema: &Schema,
    descriptors: Vec<(String, Option<String>)>,
) -> Option<Vec<FieldDescriptor>> {
    let has_units = arrow_schema
        .fields()
        .iter()
        .any(|f| f.metadata().contains_key(UNIT_METADATA_KEY));
    has_units.then(|| {
        descriptors
            .into_iter()
            .map(|(name, unit)| FieldDescriptor::new(name, unit.unwrap_or_default()))
            .collect()
    })
}

// -- Parquet / Arrow helpers --

/// Convert one Arrow array into column storage, or `None` if the type is
/// not numeric/boolean.
fn array_to_column(array: &ArrayRef) -> Result<Option<Column>> {
    let has_nulls = array.null_count() > 0;
    match array.data_type() {
        DataType::Boolean if !has_nulls => {
            let arr = array.as_boolean();
            Ok(Some(Column::Bool((0..arr.len()).map(|i| arr.value(i)).collect())))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
            if !has_nulls =>
        {
            let widened = cast(array, &DataType::Int64).context("casting to Int64")?;
            let arr = widened.as_primitive::<Int64Type>();
            Ok(Some(Column::Int(arr.values().to_vec())))
        }
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float16
        | DataType::Float32
        | DataType::Float64 => {
            let widened = cast(array, &DataType::Float64).context("casting to Float64")?;
            let arr = widened.as_primitive::<Float64Type>();
            Ok(Some(Column::Float(
                arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
            )))
        }
        _ => Ok(None),
    }
}

/// Concatenate two chunks of the same column; mixed storage widens to Float.
fn append_column(acc: Column, chunk: Column) -> Column {
    match (acc, chunk) {
        (Column::Float(mut a), Column::Float(b)) => {
            a.extend(b);
            Column::Float(a)
        }
        (Column::Int(mut a), Column::Int(b)) => {
            a.extend(b);
            Column::Int(a)
        }
        (Column::Bool(mut a), Column::Bool(b)) => {
            a.extend(b);
            Column::Bool(a)
        }
        (a, b) => {
            let mut values = a.to_f64();
            values.extend(b.to_f64());
            Column::Float(values)
        }
    }
}

fn empty_column(data_type: &DataType) -> Column {
    match data_type {
        DataType::Boolean => Column::Bool(Vec::new()),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Column::Float(Vec::new()),
        _ => Column::Int(Vec::new()),
    }
}
