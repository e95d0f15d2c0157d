use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod confidence;
pub mod constants;
pub mod error;
pub mod evaluation;
pub mod geo;
pub mod ledger;
pub mod localize;
pub mod measurement;
pub mod network;
pub mod pipeline;
pub mod propagation;
pub mod regions;
pub mod schedule;
pub mod verify;
pub mod vrf;

pub use error::{Error, Result};
pub use geo::GeoPoint;
pub use propagation::PropagationModel;

use constants::*;

pub type NodeId = u32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSources {
    pub nodes_path: PathBuf,
    pub measurements_path: PathBuf,
    /// Embedded outlines when absent.
    #[serde(default)]
    pub countries_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            lat_min: DEFAULT_BOX_LAT_MIN,
            lon_min: DEFAULT_BOX_LON_MIN,
            lat_max: DEFAULT_BOX_LAT_MAX,
            lon_max: DEFAULT_BOX_LON_MAX,
        }
    }
}

impl BoundingBox {
    pub fn contains(&self, p: &GeoPoint) -> bool {
        (self.lat_min..=self.lat_max).contains(&p.lat)
            && (self.lon_min..=self.lon_max).contains(&p.lon)
    }

    pub fn clamp(&self, p: GeoPoint) -> GeoPoint {
        GeoPoint::new(
            p.lat.clamp(self.lat_min, self.lat_max),
            p.lon.clamp(self.lon_min, self.lon_max),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub data_sources: DataSources,
    #[serde(default = "default_grid_resolution_m")]
    pub grid_resolution_m: f64,
    #[serde(default)]
    pub propagation_model: PropagationModel,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default = "default_fallback_guess")]
    pub fallback_guess: GeoPoint,
    #[serde(default = "default_optimizer_max_iterations")]
    pub optimizer_max_iterations: usize,
    #[serde(default = "default_stuck_limit")]
    pub verifier_stuck_limit: usize,
    #[serde(default)]
    pub verifier_time_budget_ms: Option<u64>,
    #[serde(default)]
    pub crop_to_land: bool,
    #[serde(default = "default_references_per_node")]
    pub references_per_node: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        let cfg: Config = serde_json::from_slice(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_sources(data_sources: DataSources) -> Self {
        Self {
            data_sources,
            grid_resolution_m: default_grid_resolution_m(),
            propagation_model: PropagationModel::default(),
            bounding_box: BoundingBox::default(),
            fallback_guess: default_fallback_guess(),
            optimizer_max_iterations: default_optimizer_max_iterations(),
            verifier_stuck_limit: default_stuck_limit(),
            verifier_time_budget_ms: None,
            crop_to_land: false,
            references_per_node: default_references_per_node(),
            workers: default_workers(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let resolution = self.grid_resolution_m;
        if !(resolution.is_finite() && resolution >= MIN_GRID_RESOLUTION_M) {
            return Err(Error::Config(format!(
                "gridResolutionM must be at least {MIN_GRID_RESOLUTION_M}, got {resolution}"
            )));
        }
        let b = &self.bounding_box;
        if !(b.lat_min < b.lat_max && b.lon_min < b.lon_max) {
            return Err(Error::Config("boundingBox min must be below max".into()));
        }
        if !GeoPoint::new(b.lat_min, b.lon_min).is_valid()
            || !GeoPoint::new(b.lat_max, b.lon_max).is_valid()
        {
            return Err(Error::Config("boundingBox outside world range".into()));
        }
        if self.optimizer_max_iterations == 0 {
            return Err(Error::Config("optimizerMaxIterations must be > 0".into()));
        }
        if self.verifier_stuck_limit == 0 {
            return Err(Error::Config("verifierStuckLimit must be > 0".into()));
        }
        if self.references_per_node == 0 {
            return Err(Error::Config("referencesPerNode must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_sources(DataSources::default())
    }
}

pub fn now_unix_ms() -> i64 {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (dur.as_secs() as i64) * 1000 + (dur.subsec_millis() as i64)
}

fn default_grid_resolution_m() -> f64 {
    DEFAULT_GRID_RESOLUTION_M
}

fn default_fallback_guess() -> GeoPoint {
    GeoPoint::new(0.0, 0.0)
}

fn default_optimizer_max_iterations() -> usize {
    DEFAULT_OPTIMIZER_MAX_ITERATIONS
}

fn default_stuck_limit() -> usize {
    DEFAULT_STUCK_LIMIT
}

fn default_references_per_node() -> usize {
    DEFAULT_REFERENCES_PER_NODE
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
