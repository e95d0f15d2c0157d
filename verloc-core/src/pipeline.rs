use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::confidence::{self, ConfidenceReport};
use crate::localize::{self, Estimate, LocalizerSettings};
use crate::measurement::NodeBundle;
use crate::regions::CountrySet;
use crate::verify::{self, Decision, Stage, VerifierSettings};
use crate::{Config, NodeId};

#[derive(Debug, Clone)]
pub struct SharedInputs {
    pub countries: CountrySet,
    pub localizer: LocalizerSettings,
    pub verifier: VerifierSettings,
}

impl SharedInputs {
    pub fn new(countries: CountrySet, cfg: &Config) -> Self {
        Self {
            countries,
            localizer: LocalizerSettings::from(cfg),
            verifier: VerifierSettings::from(cfg),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub node: NodeId,
    pub country: String,
    pub references: usize,
    pub estimate: Option<Estimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_error: Option<String>,
    pub decision: Decision,
    pub verification_stage: Stage,
    pub surviving_cells: usize,
    pub country_weights: Vec<(String, f64)>,
    pub confidence: ConfidenceReport,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub nodes: Vec<NodeReport>,
    pub elapsed_ms: u128,
}

pub fn analyze_node(bundle: &NodeBundle, shared: &SharedInputs) -> NodeReport {
    let (estimate, estimate_error) = match localize::estimate_location(
        &bundle.my_times,
        &bundle.their_times,
        &bundle.reference_locations,
        &shared.localizer,
    ) {
        Ok(est) => (Some(est), None),
        Err(err) => {
            warn!(node = bundle.node, error = %err, "no location estimate");
            (None, Some(err.to_string()))
        }
    };
    let outcome = verify::verify_bundle(bundle, &shared.countries, shared.verifier);
    NodeReport {
        node: bundle.node,
        country: bundle.country.clone(),
        references: bundle.len(),
        estimate,
        estimate_error,
        decision: outcome.decision,
        verification_stage: outcome.stage,
        surviving_cells: outcome.filtered_grid.len(),
        country_weights: outcome.country_weights,
        confidence: confidence::score_bundle(bundle),
    }
}

pub fn run_batch(
    bundles: Vec<NodeBundle>,
    shared: Arc<SharedInputs>,
    workers: usize,
) -> BatchReport {
    let started = Instant::now();
    let total = bundles.len();
    let workers = workers.clamp(1, total.max(1));
    let bundles = Arc::new(bundles);
    let (tx, rx) = mpsc::channel::<(usize, NodeReport)>();

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let tx = tx.clone();
        let bundles = Arc::clone(&bundles);
        let shared = Arc::clone(&shared);
        handles.push(thread::spawn(move || {
            for idx in (worker..bundles.len()).step_by(workers) {
                let report = analyze_node(&bundles[idx], &shared);
                if tx.send((idx, report)).is_err() {
                    return;
                }
            }
        }));
    }
    drop(tx);

    let mut slots: Vec<Option<NodeReport>> = vec![None; total];
    for (idx, report) in rx {
        slots[idx] = Some(report);
    }
    for handle in handles {
        if handle.join().is_err() {
            error!("analysis worker panicked");
        }
    }

    let nodes: Vec<NodeReport> = slots.into_iter().flatten().collect();
    if nodes.len() != total {
        warn!(expected = total, got = nodes.len(), "batch incomplete");
    }
    let elapsed_ms = started.elapsed().as_millis();
    info!(nodes = nodes.len(), workers, elapsed_ms, "batch finished");
    BatchReport { nodes, elapsed_ms }
}
