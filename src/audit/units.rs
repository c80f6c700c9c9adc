use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::data::model::FieldDescriptor;

/// Unit every instrumental flux field is expected to carry.
pub const EXPECTED_UNIT: &str = "count";

/// Outcome of checking one instFlux field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitClassification {
    pub field: String,
    pub unit: String,
    pub is_count: bool,
}

/// Whether a field takes part in the unit check: the name contains
/// `instFlux` and neither `flag` nor `Cov`.
pub fn is_inst_flux_field(name: &str) -> bool {
    name.contains("instFlux") && !name.contains("flag") && !name.contains("Cov")
}

/// Classify every instFlux field of `schema`, in schema order.
pub fn classify_units(schema: &[FieldDescriptor]) -> UnitReport {
    let fields = schema
        .iter()
        .filter(|f| is_inst_flux_field(&f.name))
        .map(|f| UnitClassification {
            field: f.name.clone(),
            unit: f.unit.clone(),
            is_count: f.unit.contains(EXPECTED_UNIT),
        })
        .collect();
    UnitReport { fields }
}

/// Unit-check result for one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub fields: Vec<UnitClassification>,
}

impl UnitReport {
    /// Field name → "unit is count".
    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.fields
            .iter()
            .map(|c| (c.field.clone(), c.is_count))
            .collect()
    }

    /// True when every checked field is in counts (vacuously true if empty).
    pub fn all_count(&self) -> bool {
        self.fields.iter().all(|c| c.is_count)
    }

    pub fn failing_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|c| !c.is_count)
            .map(|c| c.field.clone())
            .collect()
    }

    /// One line per checked field: name, then unit.
    pub fn render<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for c in &self.fields {
            writeln!(out, "{:60}..... {:20}", c.field, c.unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(entries: &[(&str, &str)]) -> Vec<FieldDescriptor> {
        entries
            .iter()
            .map(|(n, u)| FieldDescriptor::new(*n, *u))
            .collect()
    }

    #[test]
    fn err_field_included_flag_excluded() {
        let report = classify_units(&schema(&[
            ("g_instFlux", "count"),
            ("g_instFluxErr", "count"),
            ("g_instFlux_flag", ""),
        ]));
        let map = report.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("g_instFlux"), Some(&true));
        // "instFluxErr" has no "Cov", so the literal filter keeps it
        assert_eq!(map.get("g_instFluxErr"), Some(&true));
        assert!(!map.contains_key("g_instFlux_flag"));
        assert!(report.all_count());
    }

    #[test]
    fn covariance_and_unrelated_fields_absent() {
        let report = classify_units(&schema(&[
            ("base_SdssShape_instFlux_xx_Cov", "count*pixel^2"),
            ("coord_ra", "rad"),
            ("base_PsfFlux_instFlux", "nJy"),
        ]));
        let map = report.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("base_PsfFlux_instFlux"), Some(&false));
        assert!(!report.all_count());
        assert_eq!(report.failing_fields(), vec!["base_PsfFlux_instFlux"]);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let report = classify_units(&schema(&[
            ("g_InstFlux", "count"),
            ("g_instFlux_Flag", "Count"),
        ]));
        // "Flag" is not "flag", so the second field is checked, and "Count" is not "count"
        assert_eq!(report.to_map().len(), 1);
        assert_eq!(report.to_map().get("g_instFlux_Flag"), Some(&false));
    }

    #[test]
    fn empty_schema_passes() {
        let report = classify_units(&[]);
        assert!(report.to_map().is_empty());
        assert!(report.all_count());
    }

    #[test]
    fn render_pads_field_name() {
        let report = classify_units(&schema(&[("g_instFlux", "count")]));
        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("g_instFlux "));
        assert!(text.contains("..... count"));
        assert_eq!(text.lines().count(), 1);
    }
}
