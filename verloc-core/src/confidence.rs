use serde::Serialize;

use crate::constants::*;
use crate::geo::{self, GeoPoint};
use crate::measurement::NodeBundle;

/// km/s, grace margin applied.
pub fn lower_bound_speed(distance_m: f64) -> f64 {
    let raw = (LOWER_BOUND_A * (LOWER_BOUND_B * distance_m).exp()
        - LOWER_BOUND_C * (-LOWER_BOUND_D * distance_m).exp())
        / M_PER_KM;
    raw * (1.0 - CONFIDENCE_GRACE_FACTOR)
}

pub fn upper_bound_speed() -> f64 {
    2.0 / 3.0 * SPEED_OF_LIGHT_M_S / M_PER_KM
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedClass {
    pub confident: bool,
    pub fast: bool,
    pub slow: bool,
}

/// A speed exactly at the upper bound counts as too fast.
pub fn classify_speeds(my_speed: f64, their_speed: f64, lower: f64, upper: f64) -> SpeedClass {
    let within = |s: f64| s > lower && s < upper;
    SpeedClass {
        confident: within(my_speed) && within(their_speed),
        fast: my_speed >= upper || their_speed >= upper,
        slow: my_speed < lower || their_speed < lower,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub confidence: f64,
    pub fast_violations: f64,
    pub slow_violations: f64,
    pub references: usize,
}

pub fn compute_confidence(
    location: &GeoPoint,
    refs: &[GeoPoint],
    my_times: &[f64],
    their_times: &[f64],
) -> ConfidenceReport {
    let upper = upper_bound_speed();
    let (mut confident, mut fast, mut slow, mut n) = (0usize, 0usize, 0usize, 0usize);
    for ((r, mine), theirs) in refs.iter().zip(my_times).zip(their_times) {
        let Some(d) = geo::distance(location, r) else {
            continue;
        };
        let class = classify_speeds(
            d / mine / M_PER_KM,
            d / theirs / M_PER_KM,
            lower_bound_speed(d),
            upper,
        );
        n += 1;
        confident += class.confident as usize;
        fast += class.fast as usize;
        slow += class.slow as usize;
    }
    if n == 0 {
        return ConfidenceReport::default();
    }
    let rate = |k: usize| k as f64 / n as f64;
    ConfidenceReport {
        confidence: rate(confident),
        fast_violations: rate(fast),
        slow_violations: rate(slow),
        references: n,
    }
}

pub fn score_bundle(bundle: &NodeBundle) -> ConfidenceReport {
    compute_confidence(
        &bundle.location,
        &bundle.reference_locations,
        &bundle.my_times,
        &bundle.their_times,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_HOME: GeoPoint = GeoPoint::new(50.11, 8.68);
    const TEST_REF: GeoPoint = GeoPoint::new(52.52, 13.40);

    #[test]
    fn exactly_upper_bound_is_fast() {
        let upper = upper_bound_speed();
        let class = classify_speeds(upper, upper / 2.0, 1.0, upper);
        assert!(class.fast);
        assert!(!class.confident);
    }

    #[test]
    fn below_lower_bound_is_slow() {
        let class = classify_speeds(9.99, 50_000.0, 10.0, upper_bound_speed());
        assert!(class.slow);
        assert!(!class.fast);
        assert!(!class.confident);
    }

    #[test]
    fn strictly_between_is_confident() {
        let class = classify_speeds(50_000.0, 60_000.0, 10.0, upper_bound_speed());
        assert_eq!(
            class,
            SpeedClass {
                confident: true,
                fast: false,
                slow: false
            }
        );
    }

    #[test]
    fn lower_bound_applies_grace() {
        let d = 500_000.0;
        let raw = (LOWER_BOUND_A * (LOWER_BOUND_B * d).exp()
            - LOWER_BOUND_C * (-LOWER_BOUND_D * d).exp())
            / 1000.0;
        assert!((lower_bound_speed(d) - 0.8 * raw).abs() < 1e-9);
        assert!(lower_bound_speed(d) < upper_bound_speed());
    }

    #[test]
    fn node_score_from_measurements() {
        let d = geo::distance(&TEST_HOME, &TEST_REF).unwrap();
        let plausible = d / 100_000_000.0;
        let too_fast = d / (SPEED_OF_LIGHT_M_S * 0.9);
        let report = compute_confidence(
            &TEST_HOME,
            &[TEST_REF, TEST_REF],
            &[plausible, too_fast],
            &[plausible, plausible],
        );
        assert_eq!(report.references, 2);
        assert_eq!(report.confidence, 0.5);
        assert_eq!(report.fast_violations, 0.5);
        assert_eq!(report.slow_violations, 0.0);
    }

    #[test]
    fn no_references_scores_zero() {
        let report = compute_confidence(&TEST_HOME, &[], &[], &[]);
        assert_eq!(report, ConfidenceReport::default());
    }
}
