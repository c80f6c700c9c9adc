//! Error types shared across the audit.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading columns out of a [`Catalog`](crate::data::model::Catalog).
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A flux or flag column named by the rules is absent.
    #[error("column '{0}' not found in catalog")]
    MissingColumn(String),

    /// Columns of one catalog must all have the same number of rows.
    #[error("column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    /// The same column name appeared twice while building a catalog.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// Errors raised by a [`DataRepository`](crate::repo::DataRepository).
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("unknown dataset type '{0}'")]
    UnknownDatasetType(String),

    #[error("dataset type '{dataset_type}' requires dimension '{dimension}'")]
    MissingDimension {
        dataset_type: String,
        dimension: String,
    },

    #[error("no '{dataset_type}' dataset for {data_id}")]
    NotFound {
        dataset_type: String,
        data_id: String,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl RepoError {
    /// True for "not found / invalid identifier" failures.
    ///
    /// Only these are downgraded to a skipped step; everything else propagates.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            RepoError::UnknownDatasetType(_)
                | RepoError::MissingDimension { .. }
                | RepoError::NotFound { .. }
        )
    }
}

/// Errors that abort an acceptance run.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("FALSE: not all instFlux entries have units of counts ({dataset_type}: {})", fields.join(", "))]
    UnitCheckFailed {
        dataset_type: String,
        fields: Vec<String>,
    },

    #[error("dataset '{0}' carries no field schema; cannot check units")]
    MissingSchema(String),

    #[error("no flux rules configured for dataset type '{0}'")]
    NoRules(String),

    #[error("faint limit {faint} nJy must be below bright limit {bright} nJy")]
    InvalidThresholds { faint: f64, bright: f64 },

    #[error("unknown acceptance case '{0}'")]
    UnknownCase(String),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_kinds_are_skippable() {
        assert!(RepoError::UnknownDatasetType("calexp".into()).is_missing());
        assert!(RepoError::MissingDimension {
            dataset_type: "src".into(),
            dimension: "visit".into(),
        }
        .is_missing());
        assert!(RepoError::NotFound {
            dataset_type: "src".into(),
            data_id: "{}".into(),
        }
        .is_missing());
    }

    #[test]
    fn read_failures_propagate() {
        let err = RepoError::Read {
            path: PathBuf::from("/tmp/x.parquet"),
            source: anyhow::anyhow!("corrupt footer"),
        };
        assert!(!err.is_missing());
    }

    #[test]
    fn unit_failure_message_names_condition() {
        let err = AuditError::UnitCheckFailed {
            dataset_type: "src".into(),
            fields: vec!["base_PsfFlux_instFlux".into()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("FALSE: not all instFlux entries have units of counts"));
        assert!(msg.contains("base_PsfFlux_instFlux"));
    }
}
