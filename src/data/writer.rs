use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::loader::UNIT_METADATA_KEY;
use super::model::{Catalog, Column};

/// Convert a catalog into a single Arrow record batch.
///
/// When the catalog carries a schema, each field's unit is stored in the
/// Arrow field metadata so it survives a Parquet round trip.
pub fn to_record_batch(catalog: &Catalog) -> Result<RecordBatch> {
    let units: HashMap<&str, &str> = catalog
        .schema
        .iter()
        .flatten()
        .map(|f| (f.name.as_str(), f.unit.as_str()))
        .collect();

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for (name, col) in catalog.iter() {
        let (data_type, array): (DataType, ArrayRef) = match col {
            Column::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
            Column::Int(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
            Column::Bool(v) => (DataType::Boolean, Arc::new(BooleanArray::from(v.clone()))),
        };
        let mut field = Field::new(name, data_type, false);
        if catalog.schema.is_some() {
            let unit = units.get(name).copied().unwrap_or_default();
            field = field.with_metadata(HashMap::from([(
                UNIT_METADATA_KEY.to_string(),
                unit.to_string(),
            )]));
        }
        fields.push(field);
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).context("building record batch")
}

/// Write a catalog to `path` as Parquet.
pub fn write_parquet(catalog: &Catalog, path: &Path) -> Result<()> {
    let batch = to_record_batch(catalog)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
