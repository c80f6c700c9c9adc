//! Command-line and environment configuration.
//!
//! With no arguments the run matches the fixed acceptance setup: the RC2
//! collection under `/repo/main`, every built-in case, built-in rules.

use std::path::PathBuf;

use clap::Parser;

use crate::audit::cases::{builtin_cases, find_case, AcceptanceCase};
use crate::audit::rules::RuleTable;
use crate::error::Result;
use crate::repo::FileRepository;

pub const DEFAULT_REPO: &str = "/repo/main";
pub const DEFAULT_COLLECTION: &str = "HSC/runs/RC2/w_2023_39/DM-40985";

/// Flux-unit and flux-range acceptance checks for photometry catalogs
#[derive(Parser, Debug, Clone)]
#[command(name = "flux-audit")]
#[command(version)]
pub struct Args {
    /// Data repository root
    #[arg(long, default_value = DEFAULT_REPO, env = "FLUX_AUDIT_REPO")]
    pub repo: PathBuf,

    /// Collection within the repository
    #[arg(long, default_value = DEFAULT_COLLECTION, env = "FLUX_AUDIT_COLLECTION")]
    pub collection: String,

    /// Acceptance case to run (repeatable); all cases when omitted
    #[arg(long = "case", value_name = "ID")]
    pub cases: Vec<String>,

    /// JSON file of flux rules overriding the built-in ones
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Write the structured reports to this JSON file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

impl Args {
    pub fn repository(&self) -> FileRepository {
        FileRepository::new(&self.repo, &self.collection)
    }

    pub fn rule_table(&self) -> anyhow::Result<RuleTable> {
        match &self.rules {
            Some(path) => RuleTable::with_overrides(path),
            None => Ok(RuleTable::builtin()),
        }
    }

    pub fn selected_cases(&self) -> Result<Vec<AcceptanceCase>> {
        if self.cases.is_empty() {
            return Ok(builtin_cases());
        }
        self.cases.iter().map(|id| find_case(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;

    #[test]
    fn no_arguments_reproduce_fixed_setup() {
        let args = Args::try_parse_from(["flux-audit"]).unwrap();
        if std::env::var_os("FLUX_AUDIT_REPO").is_none() {
            assert_eq!(args.repo, PathBuf::from(DEFAULT_REPO));
        }
        assert_eq!(args.selected_cases().unwrap().len(), 4);
        assert!(args.rules.is_none());
        assert!(args.json.is_none());
    }

    #[test]
    fn repository_root_joins_collection() {
        let args = Args::try_parse_from([
            "flux-audit",
            "--repo",
            "/data/butler",
            "--collection",
            "HSC/runs/test",
        ])
        .unwrap();
        assert_eq!(
            args.repository().root(),
            PathBuf::from("/data/butler/HSC/runs/test").as_path()
        );
    }

    #[test]
    fn case_selection() {
        let args = Args::try_parse_from([
            "flux-audit",
            "--case",
            "LVV-T28-forced",
            "--case",
            "LVV-T28",
        ])
        .unwrap();
        let ids: Vec<String> = args
            .selected_cases()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["LVV-T28-forced", "LVV-T28"]);

        let bad = Args::try_parse_from(["flux-audit", "--case", "nope"]).unwrap();
        assert!(matches!(bad.selected_cases(), Err(AuditError::UnknownCase(_))));
    }
}
