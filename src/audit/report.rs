use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use super::range::Thresholds;
use super::rules::DatasetRules;
use crate::data::filter::quality_mask;
use crate::data::model::Catalog;
use crate::error::Result;

/// Header printed above each block of flux columns.
pub const REPORT_HEADER: &str = "flux column          % of bad flux values";

/// Bad-value statistics for one flux column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnResult {
    pub column: String,
    /// Rows that are eligible and out of range.
    pub bad_rows: usize,
    /// Every row of the catalog; this is the denominator.
    pub total_rows: usize,
    pub percentage: f64,
}

/// One block of results, one per band for multi-band tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSection {
    pub band: Option<String>,
    pub columns: Vec<ColumnResult>,
}

/// Flux validation result for one catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub dataset_type: String,
    pub thresholds: Thresholds,
    pub sections: Vec<BandSection>,
}

/// `100 * bad / total`; an empty catalog has nothing bad.
pub fn bad_percentage(bad: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        bad as f64 / total as f64 * 100.0
    }
}

/// Count rows flagged out-of-range that the mask keeps.
pub fn count_bad(out_of_range: &[bool], mask: &[bool]) -> usize {
    out_of_range
        .iter()
        .zip(mask)
        .filter(|&(&bad, &keep)| bad && keep)
        .count()
}

/// Evaluate every flux column named by `rules` against `catalog`.
pub fn evaluate(catalog: &Catalog, rules: &DatasetRules) -> Result<ValidationReport> {
    let thresholds = rules.thresholds()?;
    let total = catalog.len();
    if total == 0 {
        log::warn!("{}: catalog is empty, reporting 0% everywhere", rules.dataset_type);
    }

    let bands: Vec<Option<&str>> = match &rules.bands {
        Some(bands) => bands.iter().map(|b| Some(b.as_str())).collect(),
        None => vec![None],
    };

    let mut sections = Vec::with_capacity(bands.len());
    for band in bands {
        let mut columns = Vec::with_capacity(rules.flux_columns.len());
        for stem in &rules.flux_columns {
            let column = match band {
                Some(b) => format!("{b}_{stem}"),
                None => stem.clone(),
            };
            let flux = catalog.flux(&column)?;
            let mask = quality_mask(catalog, &rules.base_flags, rules.gate_for(stem), &column)?;
            let bad_rows = count_bad(&thresholds.classify(&flux), &mask);
            log::debug!("{column}: {bad_rows}/{total} bad");
            columns.push(ColumnResult {
                percentage: bad_percentage(bad_rows, total),
                column,
                bad_rows,
                total_rows: total,
            });
        }
        sections.push(BandSection {
            band: band.map(str::to_string),
            columns,
        });
    }

    Ok(ValidationReport {
        dataset_type: rules.dataset_type.clone(),
        thresholds,
        sections,
    })
}

impl ValidationReport {
    /// Column name → percentage of bad values.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        self.sections
            .iter()
            .flat_map(|s| &s.columns)
            .map(|c| (c.column.clone(), c.percentage))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnResult> {
        self.sections
            .iter()
            .flat_map(|s| &s.columns)
            .find(|c| c.column == name)
    }

    /// Text table: a header per section, then one line per column.
    pub fn render<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for section in &self.sections {
            writeln!(out, "\n{REPORT_HEADER}\n")?;
            for c in &section.columns {
                writeln!(out, "{:20} {:>7} %", c.column, format_sig2(c.percentage))?;
            }
        }
        Ok(())
    }
}

/// Format with two significant figures, never in exponent form.
pub fn format_sig2(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value:.1}");
    }
    let mut magnitude = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(1 - magnitude);
    let digits = (value * scale).round();
    // 9.96 rounds up to 10: one more integer digit, one less decimal
    if digits.abs() >= 100.0 {
        magnitude += 1;
    }
    let decimals = (1 - magnitude).max(0) as usize;
    let rounded = digits / scale;
    format!("{rounded:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::rules::{dia_object_table, forced_source_table, source_table};
    use crate::data::filter::FluxGate;
    use crate::data::model::Column;
    use crate::error::{AuditError, CatalogError};

    fn single_column_rules() -> DatasetRules {
        DatasetRules {
            dataset_type: "sourceTable".into(),
            flux_columns: vec!["psfFlux".into()],
            bands: None,
            base_flags: vec!["pixelFlags_saturatedCenter".into()],
            default_gate: FluxGate::Ungated,
            gate_overrides: BTreeMap::new(),
            faint_flux_njy: -1e6,
            bright_mag_ab: -5.0,
        }
    }

    fn catalog(flux: Vec<f64>, saturated: Vec<bool>) -> Catalog {
        Catalog::from_columns(vec![
            ("psfFlux".to_string(), Column::Float(flux)),
            ("pixelFlags_saturatedCenter".to_string(), Column::Bool(saturated)),
        ])
        .unwrap()
    }

    #[test]
    fn all_in_range_is_zero() {
        let cat = catalog(vec![0.0, 10.0, -1e6, 3e14], vec![false; 4]);
        let report = evaluate(&cat, &single_column_rules()).unwrap();
        assert_eq!(report.percentages()["psfFlux"], 0.0);
    }

    #[test]
    fn all_eligible_and_out_of_range_is_hundred() {
        let cat = catalog(vec![-2e6, 1e15, -1e9], vec![false; 3]);
        let report = evaluate(&cat, &single_column_rules()).unwrap();
        assert_eq!(report.percentages()["psfFlux"], 100.0);
    }

    #[test]
    fn denominator_is_all_rows_not_eligible_rows() {
        // two eligible rows, both bad, two masked rows in range
        let cat = catalog(vec![-2e6, 1e15, 5.0, 6.0], vec![false, false, true, true]);
        let report = evaluate(&cat, &single_column_rules()).unwrap();
        let c = report.column("psfFlux").unwrap();
        assert_eq!(c.bad_rows, 2);
        assert_eq!(c.total_rows, 4);
        assert_eq!(c.percentage, 50.0);
    }

    #[test]
    fn empty_catalog_reports_zero() {
        let cat = catalog(Vec::new(), Vec::new());
        let report = evaluate(&cat, &single_column_rules()).unwrap();
        assert_eq!(report.percentages()["psfFlux"], 0.0);
    }

    #[test]
    fn banded_rules_expand_column_names() {
        let mut rules = dia_object_table();
        rules.bands = Some(vec!["g".into(), "r".into()]);
        rules.flux_columns = vec!["psfFluxMean".into()];
        let cat = Catalog::from_columns(vec![
            ("g_psfFluxMean".to_string(), Column::Float(vec![1.0, -2e12])),
            ("r_psfFluxMean".to_string(), Column::Float(vec![1.0, 2.0])),
        ])
        .unwrap();
        let report = evaluate(&cat, &rules).unwrap();
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].band.as_deref(), Some("g"));
        assert_eq!(report.percentages()["g_psfFluxMean"], 50.0);
        assert_eq!(report.percentages()["r_psfFluxMean"], 0.0);
    }

    #[test]
    fn diaobject_faint_limit_is_looser() {
        let mut rules = dia_object_table();
        rules.bands = Some(vec!["i".into()]);
        rules.flux_columns = vec!["psfFluxMin".into()];
        let cat = Catalog::from_columns(vec![(
            "i_psfFluxMin".to_string(),
            Column::Float(vec![-5e6, -5e11, -5e12, 0.0]),
        )])
        .unwrap();
        let report = evaluate(&cat, &rules).unwrap();
        // only -5e12 is below -1e12
        assert_eq!(report.percentages()["i_psfFluxMin"], 25.0);
    }

    #[test]
    fn forced_source_or_gate() {
        let rules = forced_source_table();
        let cat = Catalog::from_columns(vec![
            ("psfFlux".to_string(), Column::Float(vec![-2e6; 4])),
            ("psfDiffFlux".to_string(), Column::Float(vec![0.0; 4])),
            ("psfFlux_flag".to_string(), Column::Bool(vec![false, true, false, true])),
            ("psfDiffFlux_flag".to_string(), Column::Bool(vec![false, false, true, true])),
            ("detect_isPrimary".to_string(), Column::Int(vec![0; 4])),
            ("pixelFlags_saturatedCenter".to_string(), Column::Int(vec![0; 4])),
        ])
        .unwrap();
        let report = evaluate(&cat, &rules).unwrap();
        // only the row with both flags set is excluded
        assert_eq!(report.column("psfFlux").unwrap().bad_rows, 3);
        assert_eq!(report.percentages()["psfFlux"], 75.0);
        assert_eq!(report.percentages()["psfDiffFlux"], 0.0);
    }

    #[test]
    fn missing_flag_column_propagates() {
        let rules = source_table();
        let cat = Catalog::from_columns(vec![(
            "calibFlux".to_string(),
            Column::Float(vec![1.0]),
        )])
        .unwrap();
        let err = evaluate(&cat, &rules).unwrap_err();
        assert!(matches!(err, AuditError::Catalog(CatalogError::MissingColumn(_))));
    }

    #[test]
    fn sig2_formatting() {
        assert_eq!(format_sig2(0.0), "0.0");
        assert_eq!(format_sig2(30.0), "30");
        assert_eq!(format_sig2(33.333), "33");
        assert_eq!(format_sig2(2.5), "2.5");
        assert_eq!(format_sig2(0.012345), "0.012");
        assert_eq!(format_sig2(100.0), "100");
        assert_eq!(format_sig2(99.7), "100");
        assert_eq!(format_sig2(9.96), "10");
        assert_eq!(format_sig2(0.0996), "0.10");
        assert_eq!(format_sig2(0.996), "1.0");
    }

    #[test]
    fn render_layout() {
        let cat = catalog(vec![-2e6, 1.0, 2.0], vec![false; 3]);
        let report = evaluate(&cat, &single_column_rules()).unwrap();
        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(REPORT_HEADER));
        let line = text
            .lines()
            .find(|l| l.starts_with("psfFlux"))
            .expect("psfFlux line");
        assert_eq!(line.len(), 30, "{line:?}");
        assert!(line.ends_with(" 33 %"), "{line:?}");
    }
}
