/// Data layer: catalog types, file I/O, and quality masks.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Catalog (+ unit schema if present)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Catalog  │  named columns, equal length, optional FieldDescriptors
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  flag columns → per-row eligibility mask
///   └──────────┘
/// ```
///
/// `writer` goes the other way (Catalog → Parquet) for the sample generator.

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
