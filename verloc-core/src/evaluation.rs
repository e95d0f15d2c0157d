use std::collections::HashMap;

use serde::Serialize;

use crate::constants::M_PER_KM;
use crate::geo;
use crate::measurement::NodeRecord;
use crate::pipeline::BatchReport;
use crate::regions::CountrySet;
use crate::NodeId;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeError {
    pub node: NodeId,
    pub location_error_km: Option<f64>,
    pub confidence: f64,
    pub fast_violations: f64,
    pub slow_violations: f64,
    pub compute_ms: Option<f64>,
    pub estimated_country: Option<String>,
    pub decision_correct: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub nodes: usize,
    pub localized: usize,
    pub mean_error_km: Option<f64>,
    pub median_error_km: Option<f64>,
    pub localization_country_accuracy: Option<f64>,
    pub verification_accuracy: Option<f64>,
    pub inconclusive: usize,
    pub mean_confidence: Option<f64>,
    pub per_node: Vec<NodeError>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn share(hits: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

pub fn evaluate(
    batch: &BatchReport,
    catalogue: &[NodeRecord],
    countries: &CountrySet,
) -> EvaluationSummary {
    let truth: HashMap<NodeId, &NodeRecord> = catalogue.iter().map(|r| (r.id, r)).collect();
    let mut per_node = Vec::with_capacity(batch.nodes.len());
    let mut errors = Vec::new();
    let mut confidences = Vec::new();
    let (mut country_hits, mut localized, mut decided_hits, mut inconclusive) = (0, 0, 0, 0);

    for report in &batch.nodes {
        let Some(record) = truth.get(&report.node) else {
            continue;
        };
        let truth_location = record.location();
        let estimated = report.estimate.as_ref().map(|e| e.location);
        let location_error_km = estimated
            .and_then(|p| geo::distance(&truth_location, &p))
            .map(|m| m / M_PER_KM);
        let estimated_country = estimated
            .and_then(|p| countries.country_of(&p))
            .map(str::to_string);

        if let Some(err) = location_error_km {
            errors.push(err);
        }
        if estimated.is_some() {
            localized += 1;
            if estimated_country.as_deref() == Some(record.country.as_str()) {
                country_hits += 1;
            }
        }
        let decision_correct = report.decision.country() == Some(record.country.as_str());
        if decision_correct {
            decided_hits += 1;
        }
        if report.decision.country().is_none() {
            inconclusive += 1;
        }
        confidences.push(report.confidence.confidence);

        per_node.push(NodeError {
            node: report.node,
            location_error_km,
            confidence: report.confidence.confidence,
            fast_violations: report.confidence.fast_violations,
            slow_violations: report.confidence.slow_violations,
            compute_ms: report.estimate.as_ref().map(|e| e.elapsed.as_secs_f64() * 1000.0),
            estimated_country,
            decision_correct,
        });
    }

    errors.sort_by(f64::total_cmp);
    EvaluationSummary {
        nodes: per_node.len(),
        localized,
        mean_error_km: mean(&errors),
        median_error_km: median(&errors),
        localization_country_accuracy: share(country_hits, localized),
        verification_accuracy: share(decided_hits, per_node.len()),
        inconclusive,
        mean_confidence: mean(&confidences),
        per_node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceReport;
    use crate::geo::GeoPoint;
    use crate::localize::Estimate;
    use crate::pipeline::NodeReport;
    use crate::verify::{Decision, Stage};
    use std::time::Duration;

    const TEST_BERLIN: (f64, f64) = (52.52, 13.40);
    const TEST_PARIS: (f64, f64) = (48.86, 2.35);

    fn record(id: NodeId, (lat, lon): (f64, f64), country: &str) -> NodeRecord {
        NodeRecord {
            id,
            lat,
            lon,
            country: country.to_string(),
            identity: String::new(),
        }
    }

    fn report(
        node: NodeId,
        estimate: Option<(f64, f64)>,
        decision: Decision,
        confidence: f64,
    ) -> NodeReport {
        NodeReport {
            node,
            country: String::new(),
            references: 3,
            estimate: estimate.map(|p| Estimate {
                location: GeoPoint::from(p),
                rmse: 0.0,
                iterations: 1,
                elapsed: Duration::from_millis(2),
            }),
            estimate_error: None,
            decision,
            verification_stage: Stage::Decided,
            surviving_cells: 1,
            country_weights: Vec::new(),
            confidence: ConfidenceReport {
                confidence,
                ..ConfidenceReport::default()
            },
        }
    }

    #[test]
    fn summary_over_mixed_batch() {
        let catalogue = vec![record(0, TEST_BERLIN, "Germany"), record(1, TEST_PARIS, "France")];
        let batch = BatchReport {
            nodes: vec![
                report(0, Some(TEST_BERLIN), Decision::Country("Germany".into()), 1.0),
                report(1, Some(TEST_BERLIN), Decision::Inconclusive, 0.5),
            ],
            elapsed_ms: 0,
        };
        let countries = CountrySet::embedded_europe().unwrap();
        let summary = evaluate(&batch, &catalogue, &countries);

        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.localized, 2);
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(summary.verification_accuracy, Some(0.5));
        assert_eq!(summary.localization_country_accuracy, Some(0.5));
        assert_eq!(summary.mean_confidence, Some(0.75));
        assert_eq!(summary.per_node[0].location_error_km, Some(0.0));
        assert_eq!(summary.per_node[0].estimated_country.as_deref(), Some("Germany"));
        // Berlin to Paris is roughly 880 km.
        let far = summary.per_node[1].location_error_km.unwrap();
        assert!((850.0..910.0).contains(&far), "{far}");
        assert_eq!(summary.median_error_km, Some(far / 2.0));
    }

    #[test]
    fn missing_estimate_is_not_localized() {
        let catalogue = vec![record(0, TEST_BERLIN, "Germany")];
        let batch = BatchReport {
            nodes: vec![
                report(0, None, Decision::Country("Germany".into()), 0.0),
                report(7, None, Decision::Inconclusive, 0.0),
            ],
            elapsed_ms: 0,
        };
        let summary = evaluate(&batch, &catalogue, &CountrySet::embedded_europe().unwrap());
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.localized, 0);
        assert_eq!(summary.mean_error_km, None);
        assert_eq!(summary.localization_country_accuracy, None);
        assert_eq!(summary.verification_accuracy, Some(1.0));
        assert!(summary.per_node[0].compute_ms.is_none());
    }
}
