use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

// ---------------------------------------------------------------------------
// Column – one named vector of cells
// ---------------------------------------------------------------------------

/// Storage for a single catalog column.
///
/// Nullable integer/boolean columns are loaded as `Float` with NaN for nulls,
/// so a null flag never compares equal to zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    /// Values widened to `f64` for range comparison.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Column::Float(v) => v.clone(),
            Column::Int(v) => v.iter().map(|&i| i as f64).collect(),
            Column::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Per-row "flag not set" test: true where the cell equals 0.
    pub fn is_clear(&self) -> Vec<bool> {
        match self {
            Column::Float(v) => v.iter().map(|&x| x == 0.0).collect(),
            Column::Int(v) => v.iter().map(|&i| i == 0).collect(),
            Column::Bool(v) => v.iter().map(|&b| !b).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor – schema entry of a schema-bearing catalog
// ---------------------------------------------------------------------------

/// Semantic role of a field, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Flux,
    Flag,
    Other,
}

impl FieldRole {
    pub fn infer(name: &str) -> Self {
        if name.contains("flag") {
            FieldRole::Flag
        } else if name.contains("Flux") {
            FieldRole::Flux
        } else {
            FieldRole::Other
        }
    }
}

/// Metadata for one catalog column: name, physical unit and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub role: FieldRole,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        let name = name.into();
        let role = FieldRole::infer(&name);
        FieldDescriptor {
            name,
            unit: unit.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog – the complete loaded table
// ---------------------------------------------------------------------------

/// A column-oriented table, one row per detected source.
///
/// All columns share the same length; [`Catalog::from_columns`] rejects
/// anything else.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Column names in their original order.
    pub column_names: Vec<String>,
    columns: BTreeMap<String, Column>,
    n_rows: usize,
    /// Field descriptors; only present on schema-bearing catalogs.
    pub schema: Option<Vec<FieldDescriptor>>,
}

impl Catalog {
    /// Build a catalog from ordered `(name, column)` pairs.
    pub fn from_columns<I>(columns: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut column_names = Vec::new();
        let mut map = BTreeMap::new();
        let mut n_rows = None;

        for (name, col) in columns {
            let expected = *n_rows.get_or_insert(col.len());
            if col.len() != expected {
                return Err(CatalogError::RaggedColumn {
                    column: name,
                    expected,
                    found: col.len(),
                });
            }
            if map.contains_key(&name) {
                return Err(CatalogError::DuplicateColumn(name));
            }
            column_names.push(name.clone());
            map.insert(name, col);
        }

        Ok(Catalog {
            column_names,
            columns: map,
            n_rows: n_rows.unwrap_or(0),
            schema: None,
        })
    }

    /// Attach field descriptors, turning this into a schema-bearing catalog.
    pub fn with_schema(mut self, schema: Vec<FieldDescriptor>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column(&self, name: &str) -> Result<&Column, CatalogError> {
        self.columns
            .get(name)
            .ok_or_else(|| CatalogError::MissingColumn(name.to_string()))
    }

    /// Flux values of `name` as `f64`.
    pub fn flux(&self, name: &str) -> Result<Vec<f64>, CatalogError> {
        Ok(self.column(name)?.to_f64())
    }

    /// Per-row "flag == 0" vector for `name`.
    pub fn flag_clear(&self, name: &str) -> Result<Vec<bool>, CatalogError> {
        Ok(self.column(name)?.is_clear())
    }

    /// Iterate columns in their original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.column_names
            .iter()
            .filter_map(|n| self.columns.get(n).map(|c| (n.as_str(), c)))
    }
}
