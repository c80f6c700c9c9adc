use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

use flux_audit::audit::{Auditor, CaseOutcome};
use flux_audit::config::Args;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::info!("flux-audit {}", env!("CARGO_PKG_VERSION"));

    let repo = args.repository();
    log::info!("repository: {}", repo.root().display());
    let rules = args.rule_table().context("loading flux rules")?;
    let cases = args.selected_cases()?;

    let auditor = Auditor::new(&repo, &rules);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut outcomes: Vec<CaseOutcome> = Vec::with_capacity(cases.len());
    for case in &cases {
        let outcome = auditor
            .run_case(case, &mut out)
            .with_context(|| format!("acceptance case {}", case.id))?;
        writeln!(out, "\n-------------------------------------------------\n")?;
        outcomes.push(outcome);
    }
    out.flush()?;

    let skipped: usize = outcomes.iter().map(CaseOutcome::skipped).sum();
    if skipped > 0 {
        log::warn!("{skipped} step(s) skipped for missing datasets");
    }

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&outcomes).context("serializing reports")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote reports to {}", path.display());
    }

    Ok(())
}
