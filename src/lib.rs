pub mod audit;
pub mod config;
pub mod data;
pub mod error;
pub mod repo;

pub use data::model::{Catalog, Column, FieldDescriptor, FieldRole};
pub use error::{AuditError, CatalogError, RepoError};
pub use repo::{DataId, DataRepository, FileRepository, InMemoryRepository};
