//! Per-dataset-type flux rules.
//!
//! Each table's flux columns, flag dependencies and thresholds are plain data
//! here; [`evaluate`](super::report::evaluate) is the only code that reads them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::range::Thresholds;
use crate::data::filter::FluxGate;
use crate::error::{AuditError, Result};

/// Bright limit shared by every table, in AB magnitudes.
pub const BRIGHT_MAG_AB: f64 = -5.0;

/// Faint flux limit used by the source, DiaSource and forced-source tables.
pub const FAINT_FLUX_NJY: f64 = -1e6;

/// Faint flux limit used by the DiaObject table.
pub const DIA_OBJECT_FAINT_FLUX_NJY: f64 = -1e12;

/// Flux rules for one dataset type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRules {
    pub dataset_type: String,
    /// Column names, or name stems when `bands` is set.
    pub flux_columns: Vec<String>,
    /// Photometric bands; each stem is checked as `<band>_<stem>`.
    #[serde(default)]
    pub bands: Option<Vec<String>>,
    /// Flags that must all be clear for any flux column to count.
    #[serde(default)]
    pub base_flags: Vec<String>,
    /// Gate applied to columns without an override.
    pub default_gate: FluxGate,
    /// Stem → gate, for columns that borrow another measurement's flag.
    #[serde(default)]
    pub gate_overrides: BTreeMap<String, FluxGate>,
    pub faint_flux_njy: f64,
    #[serde(default = "default_bright_mag")]
    pub bright_mag_ab: f64,
}

fn default_bright_mag() -> f64 {
    BRIGHT_MAG_AB
}

impl DatasetRules {
    pub fn gate_for(&self, stem: &str) -> &FluxGate {
        self.gate_overrides.get(stem).unwrap_or(&self.default_gate)
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::from_limits(self.faint_flux_njy, self.bright_mag_ab)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Calibrated-exposure source table.
pub fn source_table() -> DatasetRules {
    DatasetRules {
        dataset_type: "sourceTable".into(),
        flux_columns: names(&[
            "calibFlux", "ap03Flux", "ap06Flux", "ap09Flux", "ap12Flux", "ap17Flux", "ap25Flux",
            "ap35Flux", "ap50Flux", "ap70Flux", "psfFlux", "gaussianFlux",
        ]),
        bands: None,
        base_flags: names(&[
            "detect_isPrimary",
            "pixelFlags_saturatedCenter",
            "centroid_flag",
            "sky_source",
        ]),
        default_gate: FluxGate::Companion,
        gate_overrides: BTreeMap::from([(
            "calibFlux".to_string(),
            FluxGate::AllClear(names(&["ap12Flux_flag"])),
        )]),
        faint_flux_njy: FAINT_FLUX_NJY,
        bright_mag_ab: BRIGHT_MAG_AB,
    }
}

/// Difference-image source table.
pub fn dia_source_table() -> DatasetRules {
    let psf = FluxGate::AllClear(names(&["psfFlux_flag"]));
    DatasetRules {
        dataset_type: "diaSourceTable".into(),
        flux_columns: names(&["apFlux", "psfFlux", "scienceFlux", "dipoleMeanFlux"]),
        bands: None,
        base_flags: names(&[
            "pixelFlags_bad",
            "pixelFlags_suspect",
            "pixelFlags_saturatedCenter",
            "pixelFlags_interpolated",
            "pixelFlags_interpolatedCenter",
            "pixelFlags_edge",
        ]),
        default_gate: FluxGate::Companion,
        gate_overrides: BTreeMap::from([
            ("scienceFlux".to_string(), psf.clone()),
            ("dipoleMeanFlux".to_string(), psf),
            (
                "trailFlux".to_string(),
                FluxGate::AllClear(names(&["shape_flag"])),
            ),
        ]),
        faint_flux_njy: FAINT_FLUX_NJY,
        bright_mag_ab: BRIGHT_MAG_AB,
    }
}

/// Forced photometry on coadd patches.  Either PSF measurement succeeding
/// is enough for both flux columns.
pub fn forced_source_table() -> DatasetRules {
    DatasetRules {
        dataset_type: "forcedSourceTable".into(),
        flux_columns: names(&["psfFlux", "psfDiffFlux"]),
        bands: None,
        base_flags: names(&["detect_isPrimary", "pixelFlags_saturatedCenter"]),
        default_gate: FluxGate::AnyClear(names(&["psfFlux_flag", "psfDiffFlux_flag"])),
        gate_overrides: BTreeMap::new(),
        faint_flux_njy: FAINT_FLUX_NJY,
        bright_mag_ab: BRIGHT_MAG_AB,
    }
}

/// Per-tract DiaObject summary statistics, one column set per band.
pub fn dia_object_table() -> DatasetRules {
    DatasetRules {
        dataset_type: "diaObjectTable_tract".into(),
        flux_columns: names(&[
            "psfFluxMAD",
            "psfFluxMean",
            "scienceFluxMean",
            "psfFluxMin",
            "psfFluxMax",
            "psfFluxPercentile05",
            "psfFluxPercentile25",
            "psfFluxPercentile50",
            "psfFluxPercentile75",
            "psfFluxPercentile95",
            "psfFluxSigma",
            "scienceFluxSigma",
        ]),
        bands: Some(names(&["g", "r", "i", "z", "y"])),
        base_flags: Vec::new(),
        default_gate: FluxGate::Ungated,
        gate_overrides: BTreeMap::new(),
        faint_flux_njy: DIA_OBJECT_FAINT_FLUX_NJY,
        bright_mag_ab: BRIGHT_MAG_AB,
    }
}

/// Dataset type → rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: BTreeMap<String, DatasetRules>,
}

impl RuleTable {
    pub fn builtin() -> Self {
        let mut table = RuleTable::default();
        for rules in [
            source_table(),
            dia_source_table(),
            forced_source_table(),
            dia_object_table(),
        ] {
            table.insert(rules);
        }
        table
    }

    /// Add or replace the rules for `rules.dataset_type`.
    pub fn insert(&mut self, rules: DatasetRules) {
        self.rules.insert(rules.dataset_type.clone(), rules);
    }

    pub fn get(&self, dataset_type: &str) -> Result<&DatasetRules> {
        self.rules
            .get(dataset_type)
            .ok_or_else(|| AuditError::NoRules(dataset_type.to_string()))
    }

    pub fn dataset_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Built-in rules with entries from a JSON array of [`DatasetRules`]
    /// layered on top.
    pub fn with_overrides(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        let overrides: Vec<DatasetRules> =
            serde_json::from_str(&text).context("parsing rules file")?;
        let mut table = Self::builtin();
        for rules in overrides {
            rules
                .thresholds()
                .with_context(|| format!("rules for '{}'", rules.dataset_type))?;
            log::info!("overriding flux rules for {}", rules.dataset_type);
            table.insert(rules);
        }
        Ok(table)
    }
}
