//! Write a small synthetic data repository covering every dataset the
//! built-in acceptance cases read.
//!
//! Usage: `generate_sample [OUT_DIR]` (default `sample_repo`), then
//! `flux-audit --repo OUT_DIR --collection sample`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use flux_audit::audit::cases::{builtin_cases, Step};
use flux_audit::audit::rules::{DatasetRules, RuleTable};
use flux_audit::data::filter::companion_flag;
use flux_audit::data::writer::write_parquet;
use flux_audit::{Catalog, Column, DataId, FieldDescriptor, FileRepository};

const ROWS: usize = 2000;
const COLLECTION: &str = "sample";

/// Minimal deterministic PRNG (splitmix64 seeded xorshift*).
struct SampleRng {
    state: u64,
}

impl SampleRng {
    fn new(seed: u64) -> Self {
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        SampleRng {
            state: (z ^ (z >> 31)) | 1,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Log-normal-ish source fluxes in nJy with a sprinkling of garbage values.
fn flux_column(rng: &mut SampleRng, rows: usize) -> Column {
    Column::Float(
        (0..rows)
            .map(|_| {
                if rng.chance(0.01) {
                    -5e12
                } else if rng.chance(0.005) {
                    1e15
                } else {
                    10f64.powf(rng.gauss(3.5, 0.8)) + rng.gauss(0.0, 50.0)
                }
            })
            .collect(),
    )
}

fn flag_column(rng: &mut SampleRng, rows: usize, p: f64) -> Column {
    Column::Bool((0..rows).map(|_| rng.chance(p)).collect())
}

fn push_unique(columns: &mut Vec<(String, Column)>, name: String, col: Column) {
    if !columns.iter().any(|(n, _)| *n == name) {
        columns.push((name, col));
    }
}

/// A flat table satisfying `rules`: every flux column, its gate flags and the
/// base flags.
fn flat_table(rules: &DatasetRules, rng: &mut SampleRng) -> Result<Catalog> {
    let mut columns: Vec<(String, Column)> = Vec::new();

    let bands: Vec<Option<&str>> = match &rules.bands {
        Some(b) => b.iter().map(|b| Some(b.as_str())).collect(),
        None => vec![None],
    };
    for band in bands {
        for stem in &rules.flux_columns {
            let column = match band {
                Some(b) => format!("{b}_{stem}"),
                None => stem.clone(),
            };
            push_unique(&mut columns, column.clone(), flux_column(rng, ROWS));
            for flag in rules.gate_for(stem).flag_columns(&column) {
                push_unique(&mut columns, flag, flag_column(rng, ROWS, 0.03));
            }
        }
    }
    for flag in &rules.base_flags {
        push_unique(&mut columns, flag.clone(), flag_column(rng, ROWS, 0.1));
    }
    Ok(Catalog::from_columns(columns)?)
}

/// A schema-bearing measurement catalog with instFlux fields in counts.
fn schema_catalog(rng: &mut SampleRng) -> Result<Catalog> {
    let algorithms = [
        "base_PsfFlux",
        "base_GaussianFlux",
        "base_CircularApertureFlux_12_0",
        "ext_photometryKron_KronFlux",
    ];
    let mut columns = vec![(
        "coord_ra".to_string(),
        Column::Float((0..ROWS).map(|_| rng.next_f64() * std::f64::consts::TAU).collect()),
    )];
    let mut schema = vec![FieldDescriptor::new("coord_ra", "rad")];

    for alg in algorithms {
        for (suffix, unit) in [("instFlux", "count"), ("instFluxErr", "count")] {
            let name = format!("{alg}_{suffix}");
            columns.push((name.clone(), flux_column(rng, ROWS)));
            schema.push(FieldDescriptor::new(name, unit));
        }
        let flag = companion_flag(alg);
        columns.push((flag.clone(), flag_column(rng, ROWS, 0.03)));
        schema.push(FieldDescriptor::new(flag, ""));
    }
    columns.push((
        "base_SdssShape_instFlux_xx_Cov".to_string(),
        flux_column(rng, ROWS),
    ));
    schema.push(FieldDescriptor::new(
        "base_SdssShape_instFlux_xx_Cov",
        "count*pixel^2",
    ));

    Ok(Catalog::from_columns(columns)?.with_schema(schema))
}

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_repo"));
    let repo = FileRepository::new(&out_dir, COLLECTION);
    let rule_table = RuleTable::builtin();
    let mut rng = SampleRng::new(42);

    let mut written = 0;
    for case in builtin_cases() {
        let mut data_id: DataId = case.data_id.clone();
        for step in &case.steps {
            let (dataset_type, catalog) = match step {
                Step::UnitCheck {
                    dataset_type,
                    extra_dimensions,
                } => {
                    data_id.extend(extra_dimensions);
                    (dataset_type, schema_catalog(&mut rng)?)
                }
                Step::FluxCheck { dataset_type, .. } => {
                    let rules = rule_table.get(dataset_type)?;
                    (dataset_type, flat_table(rules, &mut rng)?)
                }
            };
            let path = repo.path_for(dataset_type, &data_id, "parquet")?;
            write_parquet(&catalog, &path)
                .with_context(|| format!("writing {dataset_type}"))?;
            println!(
                "{:24} {:>6} rows {:>4} columns → {}",
                dataset_type,
                catalog.len(),
                catalog.column_names.len(),
                path.display()
            );
            written += 1;
        }
    }

    println!(
        "Wrote {written} datasets; run: flux-audit --repo {} --collection {COLLECTION}",
        out_dir.display()
    );
    Ok(())
}
