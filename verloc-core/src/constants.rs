pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;
pub const M_PER_KM: f64 = 1000.0;
pub const M2_PER_KM2: f64 = 1_000_000.0;

// WGS-84
pub const WGS84_A: f64 = 6_378_137.0;
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
pub const VINCENTY_MAX_ITERATIONS: usize = 200;
pub const VINCENTY_TOLERANCE: f64 = 1e-12;

pub const WORLD_LAT_MAX: f64 = 90.0;
pub const WORLD_LON_MAX: f64 = 180.0;

// Empirical propagation curve, distance in metres.
pub const EMPIRICAL_A: f64 = 5.817e7;
pub const EMPIRICAL_B: f64 = 1.645e-7;
pub const EMPIRICAL_C: f64 = 4.785e7;
pub const EMPIRICAL_D: f64 = 2.812e-6;

// Empirical lower-bound speed curve used by the confidence scorer.
pub const LOWER_BOUND_A: f64 = 5.934e7;
pub const LOWER_BOUND_B: f64 = 1.742e-7;
pub const LOWER_BOUND_C: f64 = 4.529e7;
pub const LOWER_BOUND_D: f64 = 2.564e-6;
pub const CONFIDENCE_GRACE_FACTOR: f64 = 0.2;

pub const DEFAULT_GRID_RESOLUTION_M: f64 = 50_000.0;
pub const MIN_GRID_RESOLUTION_M: f64 = 1_000.0;
/// Meridian points on either side of the seed; the mesh is (2n+1)^2 cells.
pub const MAX_GRID_HALF_WIDTH: usize = 500;
pub const DEFAULT_STUCK_LIMIT: usize = 5;
pub const NEUTRAL_WEIGHT: f64 = 0.5;
/// Decision sentinel for an inconclusive verification.
pub const INCONCLUSIVE: i32 = -1;

// Continental bounding box (Europe) used by the localizer.
pub const DEFAULT_BOX_LAT_MIN: f64 = 27.6375;
pub const DEFAULT_BOX_LON_MIN: f64 = -18.1706;
pub const DEFAULT_BOX_LAT_MAX: f64 = 60.8444;
pub const DEFAULT_BOX_LON_MAX: f64 = 40.1797;

pub const DEFAULT_OPTIMIZER_MAX_ITERATIONS: usize = 400;
pub const OPTIMIZER_XATOL_DEG: f64 = 1e-6;
pub const OPTIMIZER_FATOL_M: f64 = 1e-3;
pub const OPTIMIZER_INITIAL_STEP_DEG: f64 = 1.0;

pub const DEFAULT_REFERENCES_PER_NODE: usize = 40;
pub const SCHEDULE_ATTEMPTS_PER_SLOT: usize = 64;

pub const EPOCH_BEACON_LEN: usize = 10;
pub const GENESIS_PREVIOUS_HASH: &str = "genesis block";
pub const GENESIS_PROOF: u64 = 100;
