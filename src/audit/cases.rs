//! Acceptance cases: which datasets to fetch and which checks to run on them.

use std::io::Write;

use serde::Serialize;

use super::report::{evaluate, ValidationReport};
use super::rules::RuleTable;
use super::units::{classify_units, UnitReport};
use crate::data::model::Catalog;
use crate::error::{AuditError, Result};
use crate::repo::{DataId, DataRepository};

/// Printed when a dataset cannot be found for the requested identifier.
pub const INVALID_DATA_ID: &str = "Invalid dataId. Please check and try again.";

/// One check within a case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Every instFlux field of a schema-bearing catalog must be in counts.
    /// `extra_dimensions` are merged into the case's data id first and stay
    /// there for later steps.
    UnitCheck {
        dataset_type: String,
        extra_dimensions: DataId,
    },
    /// Bad-flux percentages for a flat table, labelled by one dimension.
    FluxCheck {
        dataset_type: String,
        label_dimension: String,
    },
}

impl Step {
    pub fn unit_check(dataset_type: &str) -> Self {
        Step::UnitCheck {
            dataset_type: dataset_type.to_string(),
            extra_dimensions: DataId::new(),
        }
    }

    pub fn flux_check(dataset_type: &str, label_dimension: &str) -> Self {
        Step::FluxCheck {
            dataset_type: dataset_type.to_string(),
            label_dimension: label_dimension.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptanceCase {
    pub id: String,
    pub description: String,
    pub data_id: DataId,
    pub steps: Vec<Step>,
}

pub const SKYMAP: &str = "hsc_rings_v1";
pub const TRACT: i64 = 9697;
pub const VISIT: i64 = 36180;

/// The acceptance cases run by default, with their fixed data ids.
pub fn builtin_cases() -> Vec<AcceptanceCase> {
    vec![
        AcceptanceCase {
            id: "LVV-T28".into(),
            description: "calexp source catalog units and sourceTable flux range".into(),
            data_id: DataId::new()
                .with("instrument", "HSC")
                .with("visit", VISIT)
                .with("detector", 5),
            steps: vec![
                Step::unit_check("src"),
                Step::flux_check("sourceTable", "visit"),
            ],
        },
        AcceptanceCase {
            id: "LVV-T28-forced".into(),
            description: "forcedSourceTable flux range on a coadd patch".into(),
            data_id: DataId::new()
                .with("instrument", "HSC")
                .with("tract", TRACT)
                .with("patch", 13)
                .with("band", "i")
                .with("skymap", SKYMAP),
            steps: vec![Step::flux_check("forcedSourceTable", "patch")],
        },
        AcceptanceCase {
            id: "LVV-T1947-DiaSource".into(),
            description: "difference-image source units and diaSourceTable flux range".into(),
            data_id: DataId::new()
                .with("instrument", "HSC")
                .with("visit", VISIT)
                .with("detector", 40),
            steps: vec![
                Step::unit_check("goodSeeingDiff_diaSrc"),
                Step::UnitCheck {
                    dataset_type: "forced_src_diaObject".into(),
                    extra_dimensions: DataId::new()
                        .with("skymap", SKYMAP)
                        .with("tract", TRACT),
                },
                Step::flux_check("diaSourceTable", "visit"),
            ],
        },
        AcceptanceCase {
            id: "LVV-T1947-DiaObject".into(),
            description: "diaObjectTable_tract per-band flux statistics range".into(),
            data_id: DataId::new()
                .with("instrument", "HSC")
                .with("tract", TRACT)
                .with("band", "i")
                .with("detector", 40)
                .with("visit", VISIT)
                .with("skymap", SKYMAP),
            steps: vec![Step::flux_check("diaObjectTable_tract", "tract")],
        },
    ]
}

/// Look up a built-in case by id.
pub fn find_case(id: &str) -> Result<AcceptanceCase> {
    builtin_cases()
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| AuditError::UnknownCase(id.to_string()))
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    UnitsPassed {
        dataset_type: String,
        report: UnitReport,
    },
    FluxReported {
        dataset_type: String,
        report: ValidationReport,
    },
    /// The dataset was not found for this data id; nothing was computed.
    Skipped {
        dataset_type: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub case_id: String,
    pub data_id: DataId,
    pub steps: Vec<StepOutcome>,
}

impl CaseOutcome {
    pub fn skipped(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, StepOutcome::Skipped { .. }))
            .count()
    }

    /// Flux report of `dataset_type`, if that step ran.
    pub fn flux_report(&self, dataset_type: &str) -> Option<&ValidationReport> {
        self.steps.iter().find_map(|s| match s {
            StepOutcome::FluxReported {
                dataset_type: t,
                report,
            } if t == dataset_type => Some(report),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs acceptance cases against an injected repository and rule table.
pub struct Auditor<'a> {
    repo: &'a dyn DataRepository,
    rules: &'a RuleTable,
}

impl<'a> Auditor<'a> {
    pub fn new(repo: &'a dyn DataRepository, rules: &'a RuleTable) -> Self {
        Auditor { repo, rules }
    }

    /// Run every step of `case`, printing the report to `out`.
    ///
    /// Missing datasets skip their step; a unit-check failure or any other
    /// error ends the run.
    pub fn run_case<W: Write>(&self, case: &AcceptanceCase, out: &mut W) -> Result<CaseOutcome> {
        log::info!("running {}: {}", case.id, case.description);
        let mut data_id = case.data_id.clone();
        writeln!(out, "Input dataId:  {data_id}")?;

        let mut steps = Vec::with_capacity(case.steps.len());
        for step in &case.steps {
            let outcome = match step {
                Step::UnitCheck {
                    dataset_type,
                    extra_dimensions,
                } => {
                    data_id.extend(extra_dimensions);
                    self.unit_check(dataset_type, &data_id, out)?
                }
                Step::FluxCheck {
                    dataset_type,
                    label_dimension,
                } => self.flux_check(dataset_type, label_dimension, &data_id, out)?,
            };
            steps.push(outcome);
        }

        let outcome = CaseOutcome {
            case_id: case.id.clone(),
            data_id,
            steps,
        };
        if outcome.skipped() > 0 {
            log::warn!("{}: {} step(s) skipped", case.id, outcome.skipped());
        }
        Ok(outcome)
    }

    /// Fetch a dataset, downgrading "not found / invalid id" to [`Fetched::Missing`].
    fn fetch<W: Write>(&self, dataset_type: &str, data_id: &DataId, out: &mut W) -> Result<Fetched> {
        match self.repo.get(dataset_type, data_id) {
            Ok(catalog) => Ok(Fetched::Found(catalog)),
            Err(e) if e.is_missing() => {
                writeln!(out, "{INVALID_DATA_ID}")?;
                log::warn!("skipping {dataset_type}: {e}");
                Ok(Fetched::Missing(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn unit_check<W: Write>(
        &self,
        dataset_type: &str,
        data_id: &DataId,
        out: &mut W,
    ) -> Result<StepOutcome> {
        let catalog = match self.fetch(dataset_type, data_id, out)? {
            Fetched::Found(catalog) => catalog,
            Fetched::Missing(reason) => return Ok(skipped(dataset_type, reason)),
        };

        writeln!(out, "\nChecking {dataset_type}...\n")?;
        let schema = catalog
            .schema
            .as_deref()
            .ok_or_else(|| AuditError::MissingSchema(dataset_type.to_string()))?;
        let report = classify_units(schema);
        report.render(out)?;

        if !report.all_count() {
            return Err(AuditError::UnitCheckFailed {
                dataset_type: dataset_type.to_string(),
                fields: report.failing_fields(),
            });
        }
        writeln!(
            out,
            "\n All {dataset_type} instFlux entries have units of counts:  true"
        )?;
        Ok(StepOutcome::UnitsPassed {
            dataset_type: dataset_type.to_string(),
            report,
        })
    }

    fn flux_check<W: Write>(
        &self,
        dataset_type: &str,
        label_dimension: &str,
        data_id: &DataId,
        out: &mut W,
    ) -> Result<StepOutcome> {
        let rules = self.rules.get(dataset_type)?;
        let catalog = match self.fetch(dataset_type, data_id, out)? {
            Fetched::Found(catalog) => catalog,
            Fetched::Missing(reason) => return Ok(skipped(dataset_type, reason)),
        };

        let label = data_id
            .get(label_dimension)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string());
        writeln!(out, "\nChecking flux values for {label_dimension} {label}, {dataset_type}")?;

        let report = evaluate(&catalog, rules)?;
        report.render(out)?;
        Ok(StepOutcome::FluxReported {
            dataset_type: dataset_type.to_string(),
            report,
        })
    }
}

enum Fetched {
    Found(Catalog),
    Missing(String),
}

fn skipped(dataset_type: &str, reason: String) -> StepOutcome {
    StepOutcome::Skipped {
        dataset_type: dataset_type.to_string(),
        reason,
    }
}
