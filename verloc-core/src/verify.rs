//! The crop is centred on the claimed location, not on the reference, so a
//! node lying about its position ends up with an empty grid and an
//! inconclusive decision.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::geo::{self, GeoPoint};
use crate::measurement::NodeBundle;
use crate::propagation::{two_thirds_c_distance, PropagationModel};
use crate::regions::CountrySet;
use crate::{Config, NodeId};

/// Grids are never built wider than half a meridian around the seed.
const MAX_GRID_RADIUS_M: f64 = 20_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Sorted,
    GridBuilt,
    Cropped,
    Weighted,
    Decided,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Country(String),
    Inconclusive,
}

impl Decision {
    pub fn country(&self) -> Option<&str> {
        match self {
            Self::Country(name) => Some(name),
            Self::Inconclusive => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Country(name) => f.write_str(name),
            Self::Inconclusive => write!(f, "{INCONCLUSIVE}"),
        }
    }
}

/// A country name, or the `-1` sentinel.
impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Country(name) => serializer.serialize_str(name),
            Self::Inconclusive => serializer.serialize_i32(INCONCLUSIVE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedReference {
    pub distance_limit_m: f64,
    pub partner: NodeId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridCell {
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct VerifierSettings {
    pub grid_resolution_m: f64,
    pub stuck_limit: usize,
    pub time_budget: Option<Duration>,
    pub model: PropagationModel,
    pub crop_to_land: bool,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for VerifierSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            grid_resolution_m: cfg.grid_resolution_m,
            stuck_limit: cfg.verifier_stuck_limit,
            time_budget: cfg.verifier_time_budget_ms.map(Duration::from_millis),
            model: cfg.propagation_model,
            crop_to_land: cfg.crop_to_land,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub decision: Decision,
    pub filtered_grid: Vec<GridCell>,
    pub country_weights: Vec<(String, f64)>,
    pub stage: Stage,
    pub crop_rounds: usize,
    pub cropped_area_km2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl VerificationOutcome {
    fn failed(reason: String) -> Self {
        Self {
            decision: Decision::Inconclusive,
            filtered_grid: Vec::new(),
            country_weights: Vec::new(),
            stage: Stage::Failed,
            crop_rounds: 0,
            cropped_area_km2: None,
            failure: Some(reason),
        }
    }
}

pub struct Verifier<'a> {
    my_times: &'a [f64],
    their_times: &'a [f64],
    schedule: &'a [NodeId],
    refs: &'a [GeoPoint],
    claimed: GeoPoint,
    countries: &'a CountrySet,
    settings: VerifierSettings,
    stage: Stage,
    sorted: Vec<RankedReference>,
    lat_grid: Vec<GeoPoint>,
    grid: Vec<GeoPoint>,
    cropped_area: Option<f64>,
    weights: Vec<f64>,
}

impl<'a> Verifier<'a> {
    pub fn new(
        my_times: &'a [f64],
        their_times: &'a [f64],
        schedule: &'a [NodeId],
        refs: &'a [GeoPoint],
        claimed: GeoPoint,
        countries: &'a CountrySet,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            my_times,
            their_times,
            schedule,
            refs,
            claimed,
            countries,
            settings,
            stage: Stage::Init,
            sorted: Vec::new(),
            lat_grid: Vec::new(),
            grid: Vec::new(),
            cropped_area: None,
            weights: Vec::new(),
        }
    }

    pub fn for_bundle(
        bundle: &'a NodeBundle,
        countries: &'a CountrySet,
        settings: VerifierSettings,
    ) -> Self {
        Self::new(
            &bundle.my_times,
            &bundle.their_times,
            &bundle.references,
            &bundle.reference_locations,
            bundle.location,
            countries,
            settings,
        )
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn sorted_propagation(&self) -> &[RankedReference] {
        &self.sorted
    }

    pub fn lat_grid(&self) -> &[GeoPoint] {
        &self.lat_grid
    }

    pub fn grid(&self) -> &[GeoPoint] {
        &self.grid
    }

    pub fn cropped_area(&self) -> Option<f64> {
        self.cropped_area
    }

    pub fn sort_by_time(&mut self) -> Result<()> {
        let n = self.my_times.len();
        if n == 0 {
            return Err(Error::VerificationInconclusive("no measurements to verify against".into()));
        }
        if self.their_times.len() != n || self.schedule.len() != n || self.refs.len() != n {
            return Err(Error::VerificationInconclusive(format!(
                "misaligned inputs: {n} / {} times, {} partners, {} locations",
                self.their_times.len(),
                self.schedule.len(),
                self.refs.len()
            )));
        }
        let mut sorted: Vec<RankedReference> = (0..n)
            .map(|i| RankedReference {
                distance_limit_m: two_thirds_c_distance(
                    (self.my_times[i] + self.their_times[i]) / 2.0,
                ),
                partner: self.schedule[i],
                index: i,
            })
            .collect();
        sorted.sort_by(|a, b| a.distance_limit_m.total_cmp(&b.distance_limit_m));
        self.sorted = sorted;
        self.stage = Stage::Sorted;
        Ok(())
    }

    fn line(
        &self,
        center: &GeoPoint,
        bearing: f64,
        steps: impl Iterator<Item = usize>,
    ) -> Vec<GeoPoint> {
        steps
            .map(|i| geo::destination(center, bearing, self.settings.grid_resolution_m * i as f64))
            .collect()
    }

    /// North far to near, the reference, then south near to far.
    pub fn compute_lat_grid(&mut self, reference: GeoPoint, num_points: usize) {
        let mut lat_grid = self.line(&reference, 0.0, (1..=num_points).rev());
        lat_grid.push(reference);
        lat_grid.extend(self.line(&reference, 180.0, 1..=num_points));
        self.lat_grid = lat_grid;
    }

    pub fn compute_full_grid(&mut self, num_points: usize) {
        let mut grid = Vec::with_capacity(self.lat_grid.len() * (2 * num_points + 1));
        for point in &self.lat_grid {
            grid.extend(self.line(point, -90.0, (1..=num_points).rev()));
            grid.push(*point);
            grid.extend(self.line(point, 90.0, 1..=num_points));
        }
        self.grid = grid;
        self.stage = Stage::GridBuilt;
    }

    fn area_km2(&self, cells: usize) -> f64 {
        cells as f64 * (0.5 * self.settings.grid_resolution_m).powi(2) / M2_PER_KM2
    }

    /// Applied only when it shrinks the area below `area_memory`.
    pub fn crop_full_grid(&mut self, distance_limit_m: f64, area_memory: f64) -> Option<f64> {
        let claimed = self.claimed;
        let cropped: Vec<GeoPoint> = self
            .grid
            .iter()
            .filter(|cell| geo::distance(&claimed, cell).is_some_and(|d| d <= distance_limit_m))
            .copied()
            .collect();
        let area = self.area_km2(cropped.len());
        self.stage = Stage::Cropped;
        if area < area_memory {
            self.grid = cropped;
            self.cropped_area = Some(area);
            Some(area)
        } else {
            None
        }
    }

    pub fn crop_to_land(&mut self) {
        let countries = self.countries;
        self.grid.retain(|cell| countries.on_land(cell));
        self.cropped_area = Some(self.area_km2(self.grid.len()));
    }

    fn propagation_time_to(&self, from: &GeoPoint, cell: &GeoPoint) -> f64 {
        geo::distance(from, cell).map_or(0.0, |d| self.settings.model.modelled_time(d))
    }

    pub fn weight_cropped_area(&mut self) -> &[f64] {
        self.stage = Stage::Weighted;
        if self.grid.is_empty() {
            self.weights.clear();
            return &self.weights;
        }

        let mut diffs: Vec<Vec<f64>> = Vec::with_capacity(self.sorted.len());
        for rank in &self.sorted {
            let reference = self.refs[rank.index];
            let mine = self.my_times[rank.index];
            let theirs = self.their_times[rank.index];
            diffs.push(
                self.grid
                    .iter()
                    .map(|cell| {
                        let t = self.propagation_time_to(&reference, cell);
                        ((t - mine).abs() + (t - theirs).abs()) / 2.0
                    })
                    .collect(),
            );
        }

        let neutral = vec![NEUTRAL_WEIGHT; self.grid.len()];
        let global_max = diffs.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(global_max.is_finite() && global_max > 0.0) {
            self.weights = neutral;
            return &self.weights;
        }

        let refs = diffs.len() as f64;
        let means: Vec<f64> = (0..self.grid.len())
            .map(|cell| diffs.iter().map(|row| row[cell] / global_max).sum::<f64>() / refs)
            .collect();
        let min = means.iter().copied().fold(f64::INFINITY, f64::min);
        let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        self.weights = if span.is_finite() && span > 0.0 {
            means.iter().map(|m| 1.0 - (m - min) / span).collect()
        } else {
            neutral
        };
        &self.weights
    }

    fn weighted_grid(&self) -> Vec<GridCell> {
        self.grid
            .iter()
            .zip(&self.weights)
            .map(|(p, w)| GridCell {
                lat: p.lat,
                lon: p.lon,
                weight: *w,
            })
            .collect()
    }

    /// Strictly largest positive total wins; first country seen wins ties.
    pub fn decide_country(&self) -> Result<(String, Vec<(String, f64)>)> {
        let mut cells = self.weighted_grid();
        cells.sort_by(|a, b| a.weight.total_cmp(&b.weight));

        let mut totals: Vec<(String, f64)> = Vec::new();
        for cell in &cells {
            let point = GeoPoint::new(cell.lat, cell.lon);
            for name in self.countries.countries_at(&point) {
                match totals.iter_mut().find(|(n, _)| n == name) {
                    Some((_, total)) => *total += cell.weight,
                    None => totals.push((name.to_string(), cell.weight)),
                }
            }
        }

        let mut winner: Option<&str> = None;
        let mut best = 0.0;
        for (name, total) in &totals {
            if *total > best {
                best = *total;
                winner = Some(name.as_str());
            }
        }
        match winner {
            Some(name) => Ok((name.to_string(), totals.clone())),
            None => Err(Error::VerificationInconclusive(format!(
                "no country with positive weight among {} cells",
                cells.len()
            ))),
        }
    }

    pub fn verify_location(mut self) -> VerificationOutcome {
        if let Err(err) = self.sort_by_time() {
            warn!(error = %err, "verification sort failed");
            return VerificationOutcome::failed(err.to_string());
        }

        let deadline = self.settings.time_budget.map(|b| Instant::now() + b);
        let mut failure = None;
        let mut area_memory = f64::INFINITY;
        let mut stuck = 0;
        let mut rounds = 0;
        let mut previous: Option<GeoPoint> = None;

        for rank in self.sorted.clone() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(rounds, "verification time budget exhausted");
                failure = Some("time budget exhausted".to_string());
                break;
            }
            let Some(location) = self.refs.get(rank.index).copied() else {
                failure = Some(format!("reference {} has no location", rank.index));
                break;
            };

            let Some(prev) = previous else {
                if location == self.claimed {
                    continue;
                }
                let radius = rank.distance_limit_m.min(MAX_GRID_RADIUS_M);
                let num_points = (radius / self.settings.grid_resolution_m).floor() as usize;
                if num_points > MAX_GRID_HALF_WIDTH {
                    let resolution = self.settings.grid_resolution_m;
                    warn!(num_points, resolution, "grid too fine");
                    failure = Some(format!(
                        "grid of {num_points} points per side exceeds {MAX_GRID_HALF_WIDTH}"
                    ));
                    break;
                }
                self.compute_lat_grid(location, num_points);
                self.compute_full_grid(num_points);
                if let Some(area) = self.crop_full_grid(rank.distance_limit_m, area_memory) {
                    area_memory = area;
                }
                debug!(partner = rank.partner, num_points, area_memory, "grid seeded");
                previous = Some(location);
                continue;
            };

            if location != prev {
                rounds += 1;
                match self.crop_full_grid(rank.distance_limit_m, area_memory) {
                    Some(area) => {
                        area_memory = area;
                        stuck = 0;
                    }
                    None => stuck += 1,
                }
                debug!(partner = rank.partner, rounds, stuck, area_memory, "crop round");
                if stuck >= self.settings.stuck_limit {
                    break;
                }
            }
            previous = Some(location);
        }

        if self.settings.crop_to_land {
            self.crop_to_land();
        }
        self.weight_cropped_area();
        let filtered_grid = self.weighted_grid();

        let (decision, country_weights, stage) = match self.decide_country() {
            Ok((name, weights)) => (Decision::Country(name), weights, Stage::Decided),
            Err(err) => {
                warn!(error = %err, "verification inconclusive");
                failure.get_or_insert_with(|| err.to_string());
                (Decision::Inconclusive, Vec::new(), Stage::Failed)
            }
        };

        VerificationOutcome {
            decision,
            filtered_grid,
            country_weights,
            stage,
            crop_rounds: rounds,
            cropped_area_km2: self.cropped_area,
            failure,
        }
    }
}

pub fn verify_bundle(
    bundle: &NodeBundle,
    countries: &CountrySet,
    settings: VerifierSettings,
) -> VerificationOutcome {
    Verifier::for_bundle(bundle, countries, settings).verify_location()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CLAIMED: GeoPoint = GeoPoint::new(50.11, 8.68);
    const TEST_REFS: [GeoPoint; 6] = [
        GeoPoint::new(47.37, 8.54),
        GeoPoint::new(52.37, 4.90),
        GeoPoint::new(50.08, 14.42),
        GeoPoint::new(52.52, 13.40),
        GeoPoint::new(48.86, 2.35),
        GeoPoint::new(48.21, 16.37),
    ];
    const TEST_SCHEDULE: [NodeId; 6] = [1, 2, 3, 4, 5, 6];

    fn countries() -> CountrySet {
        CountrySet::embedded_europe().unwrap()
    }

    fn synthetic_times(truth: &GeoPoint) -> Vec<f64> {
        times_under(truth, PropagationModel::Empirical)
    }

    fn times_under(truth: &GeoPoint, model: PropagationModel) -> Vec<f64> {
        TEST_REFS
            .iter()
            .map(|r| model.modelled_time(geo::distance(truth, r).unwrap()))
            .collect()
    }

    fn verify_synthetic(
        times: &[f64],
        set: &CountrySet,
        s: VerifierSettings,
    ) -> VerificationOutcome {
        Verifier::new(times, times, &TEST_SCHEDULE, &TEST_REFS, TEST_CLAIMED, set, s)
            .verify_location()
    }

    fn best_cell(outcome: &VerificationOutcome) -> GeoPoint {
        let best = outcome
            .filtered_grid
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .unwrap();
        GeoPoint::new(best.lat, best.lon)
    }

    fn settings() -> VerifierSettings {
        VerifierSettings {
            grid_resolution_m: 100_000.0,
            ..VerifierSettings::default()
        }
    }

    #[test]
    fn empty_measurements_are_inconclusive() {
        let set = countries();
        let outcome =
            Verifier::new(&[], &[], &[], &[], TEST_CLAIMED, &set, settings()).verify_location();
        assert_eq!(outcome.decision, Decision::Inconclusive);
        assert!(outcome.filtered_grid.is_empty());
        assert_eq!(outcome.stage, Stage::Failed);
        assert_eq!(serde_json::to_value(&outcome.decision).unwrap(), serde_json::json!(-1));
    }

    #[test]
    fn sort_ranks_by_two_thirds_c_distance() {
        let set = countries();
        let mine = [0.004, 0.001, 0.002];
        let theirs = [0.004, 0.003, 0.002];
        let schedule = [7, 8, 9];
        let refs = &TEST_REFS[..3];
        let mut v = Verifier::new(&mine, &theirs, &schedule, refs, TEST_CLAIMED, &set, settings());
        v.sort_by_time().unwrap();
        let order: Vec<NodeId> = v.sorted_propagation().iter().map(|r| r.partner).collect();
        assert_eq!(order, vec![8, 9, 7]);
        let first = v.sorted_propagation()[0];
        assert!((first.distance_limit_m - two_thirds_c_distance(0.002)).abs() < 1e-6);
        assert_eq!(v.stage(), Stage::Sorted);
    }

    #[test]
    fn grid_layout_is_square_around_seed() {
        let set = countries();
        let mut v = Verifier::new(&[], &[], &[], &[], TEST_CLAIMED, &set, settings());
        let seed = GeoPoint::new(48.0, 10.0);
        v.compute_lat_grid(seed, 3);
        assert_eq!(v.lat_grid().len(), 7);
        assert_eq!(v.lat_grid()[3], seed);
        assert!(v.lat_grid()[0].lat > v.lat_grid()[1].lat);
        assert!(v.lat_grid()[6].lat < seed.lat);
        v.compute_full_grid(3);
        assert_eq!(v.grid().len(), 49);
        assert_eq!(v.grid()[3 * 7 + 3], seed);
        assert!(v.grid()[3 * 7].lon < seed.lon);
    }

    #[test]
    fn crop_only_applies_when_area_shrinks() {
        let set = countries();
        let mut v = Verifier::new(&[], &[], &[], &[], TEST_CLAIMED, &set, settings());
        v.compute_lat_grid(TEST_CLAIMED, 5);
        v.compute_full_grid(5);
        let full = v.grid().len();
        let area = v.crop_full_grid(250_000.0, f64::INFINITY).unwrap();
        assert!(v.grid().len() < full);
        assert!((area - v.grid().len() as f64 * 2_500.0).abs() < 1e-9);
        assert!(v.crop_full_grid(10_000_000.0, area).is_none());
        assert_eq!(v.cropped_area(), Some(area));
    }

    #[test]
    fn consistent_claim_keeps_cells_near_truth() {
        let set = countries();
        let times = synthetic_times(&TEST_CLAIMED);
        let outcome = verify_synthetic(&times, &set, settings());
        assert!(!outcome.filtered_grid.is_empty());
        assert!(outcome.filtered_grid.iter().all(|c| (0.0..=1.0).contains(&c.weight)));
        let off = geo::distance(&best_cell(&outcome), &TEST_CLAIMED).unwrap();
        assert!(off < 150_000.0, "best cell {off} m from truth");
        match &outcome.decision {
            Decision::Country(name) => assert!(set.has_country(name)),
            Decision::Inconclusive => panic!("expected a country, failure: {:?}", outcome.failure),
        }
        assert_eq!(outcome.stage, Stage::Decided);
    }

    #[test]
    fn constant_speed_models_weight_cells_near_truth() {
        let set = countries();
        for model in [PropagationModel::TwoThirdsC, PropagationModel::OneThirdC] {
            let times = times_under(&TEST_CLAIMED, model);
            let s = VerifierSettings {
                model,
                ..settings()
            };
            let outcome = verify_synthetic(&times, &set, s);
            let weights: Vec<f64> = outcome.filtered_grid.iter().map(|c| c.weight).collect();
            assert!(weights.len() > 1, "{model}: {:?}", outcome.failure);
            assert!(weights.iter().any(|w| *w != weights[0]), "{model}: flat weights");
            let off = geo::distance(&best_cell(&outcome), &TEST_CLAIMED).unwrap();
            assert!(off < 150_000.0, "{model}: best cell {off} m from truth");
        }
    }

    #[test]
    fn oversized_grid_is_refused() {
        let set = countries();
        let times = synthetic_times(&TEST_CLAIMED);
        let s = VerifierSettings {
            grid_resolution_m: 1.0,
            ..settings()
        };
        let outcome = verify_synthetic(&times, &set, s);
        assert_eq!(outcome.decision, Decision::Inconclusive);
        assert!(outcome.filtered_grid.is_empty());
        assert!(outcome.failure.unwrap().contains("exceeds"));
    }

    #[test]
    fn crop_centers_on_claimed_location() {
        // Documented behaviour: the crop radius is drawn around the claimed
        // location, so a node measuring like the Rhine-Main area but claiming
        // Madrid has every cell cropped away and cannot be confirmed.
        let set = countries();
        let refs = [
            GeoPoint::new(49.99, 8.27),
            GeoPoint::new(49.87, 8.65),
            GeoPoint::new(50.08, 8.24),
        ];
        let times = [0.0005, 0.0005, 0.0005];
        let s = VerifierSettings {
            grid_resolution_m: 10_000.0,
            ..VerifierSettings::default()
        };

        let honest = Verifier::new(&times, &times, &[1, 2, 3], &refs, TEST_CLAIMED, &set, s)
            .verify_location();
        assert!(!honest.filtered_grid.is_empty());

        let liar = GeoPoint::new(40.42, -3.70);
        let outcome =
            Verifier::new(&times, &times, &[1, 2, 3], &refs, liar, &set, s).verify_location();
        assert_eq!(outcome.decision, Decision::Inconclusive);
        assert!(outcome.filtered_grid.is_empty());
        assert_eq!(outcome.cropped_area_km2, Some(0.0));
    }

    #[test]
    fn references_at_claimed_location_do_not_seed() {
        let set = countries();
        let refs = [TEST_CLAIMED, TEST_CLAIMED];
        let times = [0.001, 0.001];
        let outcome = Verifier::new(&times, &times, &[1, 2], &refs, TEST_CLAIMED, &set, settings())
            .verify_location();
        assert_eq!(outcome.decision, Decision::Inconclusive);
        assert!(outcome.filtered_grid.is_empty());
    }

    #[test]
    fn stuck_limit_stops_cropping() {
        let set = countries();
        let times = synthetic_times(&TEST_CLAIMED);
        let mut s = settings();
        s.stuck_limit = 1;
        let outcome = verify_synthetic(&times, &set, s);
        // Limits grow with rank, so the first later round cannot shrink the grid.
        assert_eq!(outcome.crop_rounds, 1);
    }

    #[test]
    fn zero_budget_stops_before_seeding() {
        let set = countries();
        let times = synthetic_times(&TEST_CLAIMED);
        let mut s = settings();
        s.time_budget = Some(Duration::ZERO);
        let outcome = verify_synthetic(&times, &set, s);
        assert_eq!(outcome.decision, Decision::Inconclusive);
        assert_eq!(outcome.failure.as_deref(), Some("time budget exhausted"));
    }

    #[test]
    fn degenerate_weights_are_neutral() {
        let set = countries();
        let refs = [GeoPoint::new(48.0, 10.0)];
        let times = [0.0];
        let mut v = Verifier::new(&times, &times, &[1], &refs, TEST_CLAIMED, &set, settings());
        v.sort_by_time().unwrap();
        v.compute_lat_grid(refs[0], 0);
        v.compute_full_grid(0);
        // Single cell at the reference: modelled and measured times are both 0.
        assert_eq!(v.weight_cropped_area(), &[NEUTRAL_WEIGHT]);
    }

    #[test]
    fn decide_prefers_larger_total_and_first_seen_on_tie() {
        let set = countries();
        let mut v = Verifier::new(&[], &[], &[], &[], TEST_CLAIMED, &set, settings());
        // Two cells in Germany, one in France.
        v.grid = vec![
            GeoPoint::new(52.52, 13.40),
            GeoPoint::new(48.86, 2.35),
            GeoPoint::new(50.11, 8.68),
        ];
        v.weights = vec![0.4, 0.7, 0.4];
        let (winner, totals) = v.decide_country().unwrap();
        assert_eq!(winner, "Germany");
        assert_eq!(totals[0].0, "Germany");

        v.weights = vec![0.35, 0.7, 0.35];
        let (winner, _) = v.decide_country().unwrap();
        assert_eq!(winner, "Germany");

        v.weights = vec![0.0, 0.0, 0.0];
        assert!(matches!(v.decide_country(), Err(Error::VerificationInconclusive(_))));
    }

    #[test]
    fn crop_to_land_drops_sea_cells() {
        let set = countries();
        let mut v = Verifier::new(&[], &[], &[], &[], TEST_CLAIMED, &set, settings());
        v.grid = vec![GeoPoint::new(52.52, 13.40), GeoPoint::new(45.0, -20.0)];
        v.crop_to_land();
        assert_eq!(v.grid(), &[GeoPoint::new(52.52, 13.40)]);
    }
}
