use serde::{Deserialize, Serialize};

use super::model::Catalog;
use crate::error::CatalogError;

// ---------------------------------------------------------------------------
// Flux gate: which flag(s) decide whether a flux measurement is usable
// ---------------------------------------------------------------------------

/// Per-flux-column validity gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluxGate {
    /// The companion `<column>_flag` must be clear.
    Companion,
    /// No per-column gate; only the base flags apply.
    #[serde(alias = "none")]
    Ungated,
    /// Every listed flag must be clear.
    AllClear(Vec<String>),
    /// At least one listed flag must be clear.
    AnyClear(Vec<String>),
}

impl FluxGate {
    /// Flag column names this gate reads for `column`.
    pub fn flag_columns(&self, column: &str) -> Vec<String> {
        match self {
            FluxGate::Companion => vec![companion_flag(column)],
            FluxGate::Ungated => Vec::new(),
            FluxGate::AllClear(flags) | FluxGate::AnyClear(flags) => flags.clone(),
        }
    }
}

/// Name of the "measurement failed" flag paired with a flux column.
pub fn companion_flag(column: &str) -> String {
    format!("{column}_flag")
}

// ---------------------------------------------------------------------------
// Mask construction
// ---------------------------------------------------------------------------

/// Rows where every flag in `flags` is clear.  An empty list keeps every row.
pub fn all_clear(catalog: &Catalog, flags: &[String]) -> Result<Vec<bool>, CatalogError> {
    let mut mask = vec![true; catalog.len()];
    for flag in flags {
        for (m, clear) in mask.iter_mut().zip(catalog.flag_clear(flag)?) {
            *m &= clear;
        }
    }
    Ok(mask)
}

/// Rows where at least one flag in `flags` is clear.  An empty list keeps
/// every row.
pub fn any_clear(catalog: &Catalog, flags: &[String]) -> Result<Vec<bool>, CatalogError> {
    if flags.is_empty() {
        return Ok(vec![true; catalog.len()]);
    }
    let mut mask = vec![false; catalog.len()];
    for flag in flags {
        for (m, clear) in mask.iter_mut().zip(catalog.flag_clear(flag)?) {
            *m |= clear;
        }
    }
    Ok(mask)
}

/// Mask produced by a single flux gate for `column`.
pub fn gate_mask(catalog: &Catalog, gate: &FluxGate, column: &str) -> Result<Vec<bool>, CatalogError> {
    match gate {
        FluxGate::Companion => all_clear(catalog, &[companion_flag(column)]),
        FluxGate::Ungated => Ok(vec![true; catalog.len()]),
        FluxGate::AllClear(flags) => all_clear(catalog, flags),
        FluxGate::AnyClear(flags) => any_clear(catalog, flags),
    }
}

/// Eligibility mask for one flux column: base flags AND the column's gate.
///
/// `true` means the row takes part in the range check.
pub fn quality_mask(
    catalog: &Catalog,
    base_flags: &[String],
    gate: &FluxGate,
    column: &str,
) -> Result<Vec<bool>, CatalogError> {
    let base = all_clear(catalog, base_flags)?;
    let gated = gate_mask(catalog, gate, column)?;
    Ok(base.into_iter().zip(gated).map(|(b, g)| b && g).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn flags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> Catalog {
        Catalog::from_columns(vec![
            ("psfFlux".to_string(), Column::Float(vec![1.0; 4])),
            ("psfFlux_flag".to_string(), Column::Bool(vec![false, true, false, true])),
            ("psfDiffFlux_flag".to_string(), Column::Bool(vec![false, false, true, true])),
            ("detect_isPrimary".to_string(), Column::Int(vec![0, 0, 0, 1])),
            ("pixelFlags_saturatedCenter".to_string(), Column::Int(vec![0, 0, 1, 0])),
        ])
        .unwrap()
    }

    #[test]
    fn any_nonzero_base_flag_excludes_row() {
        let cat = catalog();
        let mask = all_clear(&cat, &flags(&["detect_isPrimary", "pixelFlags_saturatedCenter"])).unwrap();
        assert_eq!(mask, vec![true, true, false, false]);
    }

    #[test]
    fn any_clear_fails_only_when_all_flags_set() {
        let cat = catalog();
        let mask = any_clear(&cat, &flags(&["psfFlux_flag", "psfDiffFlux_flag"])).unwrap();
        assert_eq!(mask, vec![true, true, true, false]);
    }

    #[test]
    fn companion_gate_uses_column_flag() {
        let cat = catalog();
        let mask = gate_mask(&cat, &FluxGate::Companion, "psfFlux").unwrap();
        assert_eq!(mask, vec![true, false, true, false]);
    }

    #[test]
    fn quality_mask_ands_base_and_gate() {
        let cat = catalog();
        let gate = FluxGate::AnyClear(flags(&["psfFlux_flag", "psfDiffFlux_flag"]));
        let mask = quality_mask(
            &cat,
            &flags(&["detect_isPrimary", "pixelFlags_saturatedCenter"]),
            &gate,
            "psfFlux",
        )
        .unwrap();
        assert_eq!(mask, vec![true, true, false, false]);
    }

    #[test]
    fn ungated_without_base_keeps_everything() {
        let cat = catalog();
        let mask = quality_mask(&cat, &[], &FluxGate::Ungated, "psfFlux").unwrap();
        assert_eq!(mask, vec![true; 4]);
    }

    #[test]
    fn missing_flag_is_an_error() {
        let cat = catalog();
        let err = gate_mask(&cat, &FluxGate::Companion, "apFlux").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn(n) if n == "apFlux_flag"));
    }

    #[test]
    fn gate_serializes_snake_case() {
        let gate = FluxGate::AllClear(flags(&["ap12Flux_flag"]));
        let json = serde_json::to_string(&gate).unwrap();
        assert_eq!(json, r#"{"all_clear":["ap12Flux_flag"]}"#);
        let back: FluxGate = serde_json::from_str(r#""companion""#).unwrap();
        assert_eq!(back, FluxGate::Companion);
    }

    #[test]
    fn none_is_accepted_for_ungated() {
        let gate: FluxGate = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(gate, FluxGate::Ungated);
        assert_eq!(serde_json::to_string(&gate).unwrap(), r#""ungated""#);
    }
}
