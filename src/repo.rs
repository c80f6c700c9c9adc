//! Data repository access.
//!
//! The audit never opens files itself; it asks a [`DataRepository`] for a
//! catalog by dataset type and [`DataId`].  [`FileRepository`] maps those onto
//! files under `<repo>/<collection>/<dataset_type>/`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::data::loader::{load_file, SUPPORTED_EXTENSIONS};
use crate::data::model::Catalog;
use crate::error::RepoError;

// ---------------------------------------------------------------------------
// DataId – named dimensions identifying one dataset
// ---------------------------------------------------------------------------

/// Value of one dimension: visits and detectors are integers, bands and
/// instruments are strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Int(i) => write!(f, "{i}"),
            DimensionValue::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for DimensionValue {
    fn from(v: i64) -> Self {
        DimensionValue::Int(v)
    }
}

impl From<&str> for DimensionValue {
    fn from(v: &str) -> Self {
        DimensionValue::Str(v.to_string())
    }
}

impl From<String> for DimensionValue {
    fn from(v: String) -> Self {
        DimensionValue::Str(v)
    }
}

/// A dataset identifier: dimension name → value.
///
/// Dimensions keep the order they were added in, so `{'instrument': 'HSC',
/// 'visit': 36180, 'detector': 5}` prints the way it was written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DataId(Vec<(String, DimensionValue)>);

impl DataId {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, dimension: &str, value: impl Into<DimensionValue>) -> Self {
        self.insert(dimension, value);
        self
    }

    /// Set `dimension`, replacing its value in place if already present.
    pub fn insert(&mut self, dimension: &str, value: impl Into<DimensionValue>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k == dimension) {
            Some((_, v)) => *v = value,
            None => self.0.push((dimension.to_string(), value)),
        }
    }

    pub fn get(&self, dimension: &str) -> Option<&DimensionValue> {
        self.0.iter().find(|(k, _)| k == dimension).map(|(_, v)| v)
    }

    /// Copy every dimension of `other` into `self`, overwriting duplicates.
    pub fn extend(&mut self, other: &DataId) {
        for (k, v) in &other.0 {
            self.insert(k, v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DimensionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match v {
                DimensionValue::Str(s) => write!(f, "'{k}': '{s}'")?,
                DimensionValue::Int(n) => write!(f, "'{k}': {n}")?,
            }
        }
        write!(f, "}}")
    }
}

impl Serialize for DataId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct DataIdVisitor;

impl<'de> Visitor<'de> for DataIdVisitor {
    type Value = DataId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of dimension name to integer or string")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DataId, A::Error> {
        let mut id = DataId::new();
        while let Some((k, v)) = access.next_entry::<String, DimensionValue>()? {
            id.insert(&k, v);
        }
        Ok(id)
    }
}

impl<'de> Deserialize<'de> for DataId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DataIdVisitor)
    }
}

// ---------------------------------------------------------------------------
// Dataset types and their required dimensions
// ---------------------------------------------------------------------------

/// Dimensions each known dataset type is indexed by, in path order.
pub const DATASET_DIMENSIONS: &[(&str, &[&str])] = &[
    ("src", &["instrument", "visit", "detector"]),
    ("sourceTable", &["instrument", "visit", "detector"]),
    ("goodSeeingDiff_diaSrc", &["instrument", "visit", "detector"]),
    ("diaSourceTable", &["instrument", "visit", "detector"]),
    (
        "forced_src_diaObject",
        &["instrument", "visit", "detector", "tract", "skymap"],
    ),
    (
        "forcedSourceTable",
        &["instrument", "tract", "patch", "band", "skymap"],
    ),
    ("diaObjectTable_tract", &["instrument", "tract", "skymap"]),
];

pub fn required_dimensions(dataset_type: &str) -> Option<&'static [&'static str]> {
    DATASET_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == dataset_type)
        .map(|(_, dims)| *dims)
}

/// Storage key for a dataset: required dimension values joined by `_`.
///
/// Dimensions not required by the dataset type are ignored.
pub fn dataset_key(dataset_type: &str, data_id: &DataId) -> Result<String, RepoError> {
    let dims = required_dimensions(dataset_type)
        .ok_or_else(|| RepoError::UnknownDatasetType(dataset_type.to_string()))?;
    let parts = dims
        .iter()
        .map(|dim| {
            data_id
                .get(dim)
                .map(|v| v.to_string())
                .ok_or_else(|| RepoError::MissingDimension {
                    dataset_type: dataset_type.to_string(),
                    dimension: dim.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("_"))
}

// ---------------------------------------------------------------------------
// Repository trait and implementations
// ---------------------------------------------------------------------------

/// Source of catalogs, injected into every acceptance case.
pub trait DataRepository {
    fn get(&self, dataset_type: &str, data_id: &DataId) -> Result<Catalog, RepoError>;
}

/// Catalogs stored as files under `<root>/<dataset_type>/<key>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Repository rooted at `<repo>/<collection>`.
    pub fn new(repo: &Path, collection: &str) -> Self {
        Self::from_root(repo.join(collection))
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        FileRepository { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a dataset would be stored at with the given extension.
    pub fn path_for(
        &self,
        dataset_type: &str,
        data_id: &DataId,
        ext: &str,
    ) -> Result<PathBuf, RepoError> {
        let key = dataset_key(dataset_type, data_id)?;
        Ok(self.root.join(dataset_type).join(format!("{key}.{ext}")))
    }
}

impl DataRepository for FileRepository {
    fn get(&self, dataset_type: &str, data_id: &DataId) -> Result<Catalog, RepoError> {
        for ext in SUPPORTED_EXTENSIONS {
            let path = self.path_for(dataset_type, data_id, ext)?;
            if !path.is_file() {
                continue;
            }
            log::debug!("loading {dataset_type} from {}", path.display());
            return load_file(&path).map_err(|source| RepoError::Read { path, source });
        }
        Err(RepoError::NotFound {
            dataset_type: dataset_type.to_string(),
            data_id: data_id.to_string(),
        })
    }
}

/// Repository held in memory; lookups follow the same key rules as
/// [`FileRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    entries: HashMap<(String, String), Catalog>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        dataset_type: &str,
        data_id: &DataId,
        catalog: Catalog,
    ) -> Result<(), RepoError> {
        let key = dataset_key(dataset_type, data_id)?;
        self.entries.insert((dataset_type.to_string(), key), catalog);
        Ok(())
    }
}

impl DataRepository for InMemoryRepository {
    fn get(&self, dataset_type: &str, data_id: &DataId) -> Result<Catalog, RepoError> {
        let key = dataset_key(dataset_type, data_id)?;
        self.entries
            .get(&(dataset_type.to_string(), key))
            .cloned()
            .ok_or_else(|| RepoError::NotFound {
                dataset_type: dataset_type.to_string(),
                data_id: data_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn visit_id() -> DataId {
        DataId::new()
            .with("instrument", "HSC")
            .with("visit", 36180)
            .with("detector", 5)
    }

    #[test]
    fn key_uses_required_dimensions_in_order() {
        let id = visit_id().with("band", "i");
        assert_eq!(dataset_key("sourceTable", &id).unwrap(), "HSC_36180_5");
    }

    #[test]
    fn missing_dimension_is_invalid_identifier() {
        let id = DataId::new().with("instrument", "HSC").with("visit", 36180);
        let err = dataset_key("src", &id).unwrap_err();
        assert!(err.is_missing());
        assert!(matches!(err, RepoError::MissingDimension { dimension, .. } if dimension == "detector"));
    }

    #[test]
    fn unknown_dataset_type() {
        let err = dataset_key("calexp", &visit_id()).unwrap_err();
        assert!(matches!(err, RepoError::UnknownDatasetType(t) if t == "calexp"));
    }

    #[test]
    fn data_id_display_and_serde() {
        let id = visit_id();
        assert_eq!(
            id.to_string(),
            "{'instrument': 'HSC', 'visit': 36180, 'detector': 5}"
        );
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"instrument":"HSC","visit":36180,"detector":5}"#);
        let back: DataId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn extend_keeps_order_and_overwrites_in_place() {
        let mut id = visit_id();
        id.extend(&DataId::new().with("skymap", "hsc_rings_v1").with("visit", 1));
        let dims: Vec<&str> = id.iter().map(|(k, _)| k).collect();
        assert_eq!(dims, vec!["instrument", "visit", "detector", "skymap"]);
        assert_eq!(id.get("visit"), Some(&DimensionValue::Int(1)));
    }

    #[test]
    fn in_memory_lookup_ignores_extra_dimensions() {
        let mut repo = InMemoryRepository::new();
        let cat = Catalog::from_columns(vec![("psfFlux".to_string(), Column::Float(vec![1.0]))]).unwrap();
        repo.insert("sourceTable", &visit_id(), cat).unwrap();

        let widened = visit_id().with("tract", 9697).with("skymap", "hsc_rings_v1");
        assert_eq!(repo.get("sourceTable", &widened).unwrap().len(), 1);

        let other = visit_id().with("detector", 6);
        assert!(matches!(
            repo.get("sourceTable", &other),
            Err(RepoError::NotFound { .. })
        ));
    }

    #[test]
    fn file_repository_not_found_and_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path(), "HSC/runs/test");
        let id = visit_id();

        let err = repo.get("sourceTable", &id).unwrap_err();
        assert!(err.is_missing());

        let path = repo.path_for("sourceTable", &id, "json").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        let err = repo.get("sourceTable", &id).unwrap_err();
        assert!(!err.is_missing(), "a corrupt file must not be treated as missing");
    }

    #[test]
    fn file_repository_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::from_root(dir.path());
        let id = visit_id();
        let path = repo.path_for("sourceTable", &id, "json").unwrap();
        assert!(path.ends_with("sourceTable/HSC_36180_5.json"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"columns": {"psfFlux": [1.0, 2.0]}}"#).unwrap();
        assert_eq!(repo.get("sourceTable", &id).unwrap().len(), 2);
    }
}
