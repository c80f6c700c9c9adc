/// Flux validation: unit check, range check, and the acceptance cases that
/// drive them.
///
/// ```text
///   DataRepository ──get──▶ Catalog
///                              │
///            ┌─────────────────┼──────────────────┐
///            ▼                                    ▼
///       ┌─────────┐                        ┌────────────┐
///       │  units  │ schema → count?        │   rules    │ per dataset type
///       └─────────┘                        └────────────┘
///                                                 │
///                                                 ▼
///                       range (thresholds) + data::filter (masks)
///                                                 │
///                                                 ▼
///                                          ┌────────────┐
///                                          │   report   │ % bad per column
///                                          └────────────┘
/// ```
///
/// `cases` strings these together per acceptance test.

pub mod cases;
pub mod range;
pub mod report;
pub mod rules;
pub mod units;

pub use cases::{builtin_cases, find_case, AcceptanceCase, Auditor, CaseOutcome, Step, StepOutcome};
pub use report::{evaluate, ValidationReport};
pub use rules::{DatasetRules, RuleTable};
pub use units::{classify_units, UnitReport};
