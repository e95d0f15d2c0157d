mod constants;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use verloc_core::evaluation::{self, EvaluationSummary, NodeError};
use verloc_core::measurement::{self, MeasurementTable, NodeRecord};
use verloc_core::pipeline::{self, BatchReport, SharedInputs};
use verloc_core::regions::CountrySet;
use verloc_core::schedule;
use verloc_core::{Config, GeoPoint, NodeId};

use constants::*;

#[derive(Parser, Debug)]
#[command(about = "Localize and verify every node of a measured network")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    /// Overrides `referencesPerNode` from the config.
    #[arg(long)]
    references: Option<usize>,

    /// Overrides `workers` from the config.
    #[arg(long)]
    workers: Option<usize>,

    /// Hex epoch beacon the schedule seeds are derived from.
    #[arg(long, default_value = DEFAULT_BEACON_HEX)]
    beacon: String,

    /// Print the full report as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this file.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    nodes: usize,
    measurement_pairs: usize,
    references_per_node: usize,
    workers: usize,
    grid_resolution_m: f64,
    propagation_model: String,
    countries: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleShortfall {
    node: NodeId,
    partners: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisOutput {
    params: Params,
    shortfalls: Vec<ScheduleShortfall>,
    summary: EvaluationSummary,
    batch: BatchReport,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("verloc=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(r) = args.references {
        cfg.references_per_node = r;
    }
    if let Some(w) = args.workers {
        cfg.workers = w;
    }
    cfg.validate()?;

    let beacon = hex::decode(args.beacon.trim()).map_err(|e| anyhow!("beacon is not hex: {e}"))?;
    let sources = &cfg.data_sources;
    let catalogue = measurement::load_catalogue(&sources.nodes_path)
        .with_context(|| format!("loading catalogue {}", sources.nodes_path.display()))?;
    let table = MeasurementTable::load_jsonl(&sources.measurements_path)
        .with_context(|| format!("loading measurements {}", sources.measurements_path.display()))?;
    let countries = match &sources.countries_path {
        Some(path) => CountrySet::load(path)
            .with_context(|| format!("loading countries {}", path.display()))?,
        None => CountrySet::embedded_europe()?,
    };
    info!(
        nodes = catalogue.len(),
        pairs = table.len(),
        countries = countries.len(),
        "inputs loaded"
    );

    let seeds: Vec<Vec<u8>> = catalogue.iter().map(|r| schedule_seed(&beacon, r)).collect();
    let locations: Vec<GeoPoint> = catalogue.iter().map(NodeRecord::location).collect();
    let built = schedule::build_network_schedule(&seeds, cfg.references_per_node, Some(&locations));
    let bundles = measurement::assemble_bundles(&catalogue, &built.schedule, &table);

    let params = Params {
        nodes: catalogue.len(),
        measurement_pairs: table.len(),
        references_per_node: cfg.references_per_node,
        workers: cfg.workers,
        grid_resolution_m: cfg.grid_resolution_m,
        propagation_model: cfg.propagation_model.to_string(),
        countries: countries.len(),
    };
    let shared = Arc::new(SharedInputs::new(countries, &cfg));
    let batch = pipeline::run_batch(bundles, Arc::clone(&shared), cfg.workers);
    let summary = evaluation::evaluate(&batch, &catalogue, &shared.countries);

    let output = AnalysisOutput {
        params,
        shortfalls: built
            .shortfalls
            .iter()
            .map(|&(node, partners)| ScheduleShortfall { node, partners })
            .collect(),
        summary,
        batch,
    };

    if let Some(path) = &args.out {
        let text = serde_json::to_string_pretty(&output)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    print_summary(&output);
    Ok(())
}

fn schedule_seed(beacon: &[u8], record: &NodeRecord) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(beacon);
    if record.identity.is_empty() {
        hasher.update(record.id.to_string().as_bytes());
    } else {
        hasher.update(record.identity.as_bytes());
    }
    hasher.finalize().to_vec()
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(x) => format!("{x:.precision$}"),
        None => "n/a".to_string(),
    }
}

fn print_summary(output: &AnalysisOutput) {
    let p = &output.params;
    let s = &output.summary;
    println!("VerLoc analysis");
    println!("  nodes:      {}", p.nodes);
    println!("  pairs:      {}", p.measurement_pairs);
    println!("  references: {}", p.references_per_node);
    println!("  model:      {}", p.propagation_model);
    println!("  grid:       {:.0} m", p.grid_resolution_m);
    println!("  elapsed:    {} ms on {} workers", output.batch.elapsed_ms, p.workers);
    if !output.shortfalls.is_empty() {
        println!("  short schedules: {}", output.shortfalls.len());
    }

    println!("\nLocalization:");
    println!("- localized {}/{}", s.localized, s.nodes);
    println!(
        "- error km mean={} median={}",
        fmt_opt(s.mean_error_km, 1),
        fmt_opt(s.median_error_km, 1)
    );
    println!("- country accuracy {}", fmt_opt(s.localization_country_accuracy, 3));

    println!("\nVerification:");
    println!("- accuracy {}", fmt_opt(s.verification_accuracy, 3));
    println!("- inconclusive {}", s.inconclusive);
    println!("- mean confidence {}", fmt_opt(s.mean_confidence, 3));

    let mut worst: Vec<&NodeError> = s
        .per_node
        .iter()
        .filter(|n| n.location_error_km.is_some())
        .collect();
    worst.sort_by(|a, b| {
        let ea = a.location_error_km.unwrap_or_default();
        let eb = b.location_error_km.unwrap_or_default();
        eb.total_cmp(&ea)
    });
    if !worst.is_empty() {
        println!("\nLargest location errors:");
        for n in worst.iter().take(SUMMARY_WORST_NODES) {
            println!(
                "- node {} error={} km confidence={:.2} estimated={}",
                n.node,
                fmt_opt(n.location_error_km, 1),
                n.confidence,
                n.estimated_country.as_deref().unwrap_or("-")
            );
        }
    }
}
