use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::geo::{self, GeoPoint};
use crate::propagation::PropagationModel;
use crate::{BoundingBox, Config};

#[derive(Debug, Clone, Copy)]
pub struct LocalizerSettings {
    pub bounds: BoundingBox,
    pub fallback_guess: GeoPoint,
    pub max_iterations: usize,
    pub model: PropagationModel,
}

impl Default for LocalizerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for LocalizerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            bounds: cfg.bounding_box,
            fallback_guess: cfg.fallback_guess,
            max_iterations: cfg.optimizer_max_iterations,
            model: cfg.propagation_model,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub location: GeoPoint,
    pub rmse: f64,
    pub iterations: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// `None` for fewer than three distinct points or a zero-area polygon.
pub fn polygon_centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    let mut distinct: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        if !distinct.contains(p) {
            distinct.push(*p);
        }
    }
    if distinct.len() < 3 {
        return None;
    }

    let n = points.len();
    let (mut area2, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let cross = a.lat * b.lon - b.lat * a.lon;
        area2 += cross;
        cx += (a.lat + b.lat) * cross;
        cy += (a.lon + b.lon) * cross;
    }
    if area2.abs() < f64::EPSILON {
        return None;
    }
    Some(GeoPoint::new(cx / (3.0 * area2), cy / (3.0 * area2)))
}

pub fn initial_guess(refs: &[GeoPoint], settings: &LocalizerSettings) -> GeoPoint {
    let guess = polygon_centroid(refs).unwrap_or(settings.fallback_guess);
    settings.bounds.clamp(guess)
}

/// Weights are the L1-normalized inverse times.
pub fn error_rmse(
    candidate: &GeoPoint,
    mean_times: &[f64],
    refs: &[GeoPoint],
    model: PropagationModel,
) -> Result<f64> {
    if mean_times.len() != refs.len() || refs.is_empty() {
        return Err(Error::OptimizationFailure(format!(
            "{} times for {} references",
            mean_times.len(),
            refs.len()
        )));
    }
    let inv_sum: f64 = mean_times.iter().map(|t| 1.0 / t).sum();
    let mut sq = 0.0;
    for (t, r) in mean_times.iter().zip(refs) {
        let estimated = geo::try_distance(candidate, r)?;
        let measured = t * model.implied_speed(estimated);
        let weight = (1.0 / t) / inv_sum;
        sq += ((estimated - measured) * weight).powi(2);
    }
    Ok((sq / refs.len() as f64).sqrt())
}

pub fn mean_times(my_times: &[f64], their_times: &[f64]) -> Vec<f64> {
    my_times
        .iter()
        .zip(their_times)
        .map(|(a, b)| (a + b) / 2.0)
        .collect()
}

pub fn estimate_location(
    my_times: &[f64],
    their_times: &[f64],
    refs: &[GeoPoint],
    settings: &LocalizerSettings,
) -> Result<Estimate> {
    let started = Instant::now();
    if refs.is_empty() || my_times.len() != refs.len() || their_times.len() != refs.len() {
        return Err(Error::OptimizationFailure(format!(
            "mismatched inputs: {} / {} times for {} references",
            my_times.len(),
            their_times.len(),
            refs.len()
        )));
    }
    let times = mean_times(my_times, their_times);
    if let Some(bad) = times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
        return Err(Error::OptimizationFailure(format!("non-positive mean time {bad}")));
    }

    let start = initial_guess(refs, settings);
    let objective = |p: [f64; 2]| {
        error_rmse(&GeoPoint::new(p[0], p[1]), &times, refs, settings.model)
            .unwrap_or(f64::INFINITY)
    };
    let (best, rmse, iterations) =
        nelder_mead(objective, start, &settings.bounds, settings.max_iterations);
    if !rmse.is_finite() {
        return Err(Error::OptimizationFailure(
            "objective is undefined everywhere the search went".into(),
        ));
    }
    let elapsed = started.elapsed();
    debug!(lat = best.lat, lon = best.lon, rmse, iterations, ?elapsed, "localization finished");
    Ok(Estimate {
        location: best,
        rmse,
        iterations,
        elapsed,
    })
}

fn clamp(p: [f64; 2], b: &BoundingBox) -> [f64; 2] {
    [p[0].clamp(b.lat_min, b.lat_max), p[1].clamp(b.lon_min, b.lon_max)]
}

fn lerp(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])]
}

/// Every trial point is clamped into `bounds`.
fn nelder_mead<F>(
    mut f: F,
    start: GeoPoint,
    bounds: &BoundingBox,
    max_iterations: usize,
) -> (GeoPoint, f64, usize)
where
    F: FnMut([f64; 2]) -> f64,
{
    let x0 = [start.lat, start.lon];
    let mut simplex: Vec<([f64; 2], f64)> = Vec::with_capacity(3);
    simplex.push((x0, f(x0)));
    for axis in 0..2 {
        let mut v = x0;
        v[axis] += OPTIMIZER_INITIAL_STEP_DEG;
        let mut v = clamp(v, bounds);
        if v == x0 {
            v[axis] -= OPTIMIZER_INITIAL_STEP_DEG;
            v = clamp(v, bounds);
        }
        simplex.push((v, f(v)));
    }

    let mut iterations = 0;
    while iterations < max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, worst) = (simplex[0], simplex[2]);
        let x_spread = simplex[1..]
            .iter()
            .map(|(x, _)| (x[0] - best.0[0]).abs().max((x[1] - best.0[1]).abs()))
            .fold(0.0, f64::max);
        let f_spread = (worst.1 - best.1).abs();
        if x_spread <= OPTIMIZER_XATOL_DEG && f_spread <= OPTIMIZER_FATOL_M {
            break;
        }
        iterations += 1;

        let centroid = lerp(simplex[0].0, simplex[1].0, 0.5);
        let reflected = clamp(lerp(centroid, worst.0, -1.0), bounds);
        let fr = f(reflected);

        if fr < best.1 {
            let expanded = clamp(lerp(centroid, worst.0, -2.0), bounds);
            let fe = f(expanded);
            simplex[2] = if fe < fr { (expanded, fe) } else { (reflected, fr) };
            continue;
        }
        if fr < simplex[1].1 {
            simplex[2] = (reflected, fr);
            continue;
        }
        let (contracted, fc) = if fr < worst.1 {
            let c = clamp(lerp(centroid, reflected, 0.5), bounds);
            (c, f(c))
        } else {
            let c = clamp(lerp(centroid, worst.0, 0.5), bounds);
            (c, f(c))
        };
        if fc < worst.1.min(fr) {
            simplex[2] = (contracted, fc);
            continue;
        }
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = clamp(lerp(best.0, vertex.0, 0.5), bounds);
            *vertex = (shrunk, f(shrunk));
        }
    }
    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, fx) = simplex[0];
    (GeoPoint::new(x[0], x[1]), fx, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TRUTH: GeoPoint = GeoPoint::new(50.11, 8.68);
    const TEST_REFS: [GeoPoint; 6] = [
        GeoPoint::new(52.52, 13.40),
        GeoPoint::new(48.86, 2.35),
        GeoPoint::new(48.21, 16.37),
        GeoPoint::new(52.37, 4.90),
        GeoPoint::new(50.08, 14.42),
        GeoPoint::new(47.37, 8.54),
    ];

    const TEST_MODELS: [PropagationModel; 3] = [
        PropagationModel::TwoThirdsC,
        PropagationModel::OneThirdC,
        PropagationModel::Empirical,
    ];

    fn synthetic_times(truth: &GeoPoint, refs: &[GeoPoint], model: PropagationModel) -> Vec<f64> {
        refs.iter()
            .map(|r| model.modelled_time(geo::distance(truth, r).unwrap()))
            .collect()
    }

    #[test]
    fn centroid_of_square() {
        let square = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 2.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(2.0, 0.0),
        ];
        let c = polygon_centroid(&square).unwrap();
        assert!((c.lat - 1.0).abs() < 1e-12 && (c.lon - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_polygon_falls_back_into_box() {
        let settings = LocalizerSettings::default();
        let two = [GeoPoint::new(50.0, 8.0), GeoPoint::new(51.0, 9.0), GeoPoint::new(50.0, 8.0)];
        let line = [GeoPoint::new(50.0, 8.0), GeoPoint::new(51.0, 9.0), GeoPoint::new(52.0, 10.0)];
        assert!(polygon_centroid(&two).is_none());
        assert!(polygon_centroid(&line).is_none());
        let guess = initial_guess(&line, &settings);
        assert!(settings.bounds.contains(&guess));
        assert_eq!(guess, settings.bounds.clamp(GeoPoint::new(0.0, 0.0)));
    }

    #[test]
    fn rmse_vanishes_at_truth() {
        for model in TEST_MODELS {
            let times = synthetic_times(&TEST_TRUTH, &TEST_REFS, model);
            let at_truth = error_rmse(&TEST_TRUTH, &times, &TEST_REFS, model).unwrap();
            let away = error_rmse(&GeoPoint::new(45.0, 0.0), &times, &TEST_REFS, model).unwrap();
            assert!(at_truth < 1e-3, "{model}: got {at_truth}");
            assert!(away > 1.0, "{model}: got {away}");
        }
    }

    #[test]
    fn recovers_synthetic_location() {
        let times = synthetic_times(&TEST_TRUTH, &TEST_REFS, PropagationModel::Empirical);
        let settings = LocalizerSettings::default();
        let est = estimate_location(&times, &times, &TEST_REFS, &settings).unwrap();
        let err = geo::distance(&est.location, &TEST_TRUTH).unwrap();
        assert!(err < 10_000.0, "estimate off by {err} m: {:?}", est.location);
        assert!(est.iterations <= DEFAULT_OPTIMIZER_MAX_ITERATIONS);
    }

    #[test]
    fn recovers_synthetic_location_under_every_model() {
        for model in TEST_MODELS {
            let times = synthetic_times(&TEST_TRUTH, &TEST_REFS, model);
            let settings = LocalizerSettings {
                model,
                ..Default::default()
            };
            let est = estimate_location(&times, &times, &TEST_REFS, &settings).unwrap();
            let err = geo::distance(&est.location, &TEST_TRUTH).unwrap();
            assert!(err < 10_000.0, "{model}: off by {err} m at {:?}", est.location);
        }
    }

    #[test]
    fn mismatched_model_leaves_a_residual() {
        let times = synthetic_times(&TEST_TRUTH, &TEST_REFS, PropagationModel::TwoThirdsC);
        let rmse = |model| error_rmse(&TEST_TRUTH, &times, &TEST_REFS, model).unwrap();
        let matched = rmse(PropagationModel::TwoThirdsC);
        let other = rmse(PropagationModel::OneThirdC);
        assert!(matched < 1e-3);
        assert!(other > 1_000.0, "got {other}");
    }

    #[test]
    fn estimate_stays_in_box() {
        // Times far too long for any point inside the box.
        let times = vec![0.5; TEST_REFS.len()];
        let settings = LocalizerSettings::default();
        let est = estimate_location(&times, &times, &TEST_REFS, &settings).unwrap();
        assert!(settings.bounds.contains(&est.location));
    }

    #[test]
    fn empty_or_mismatched_inputs_fail() {
        let settings = LocalizerSettings::default();
        assert!(matches!(
            estimate_location(&[], &[], &[], &settings),
            Err(Error::OptimizationFailure(_))
        ));
        assert!(matches!(
            estimate_location(&[0.01], &[0.01, 0.02], &TEST_REFS[..2], &settings),
            Err(Error::OptimizationFailure(_))
        ));
        assert!(matches!(
            estimate_location(&[0.0, 0.01], &[0.0, 0.01], &TEST_REFS[..2], &settings),
            Err(Error::OptimizationFailure(_))
        ));
    }
}
