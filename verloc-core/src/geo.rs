use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn checked(lat: f64, lon: f64) -> Result<Self> {
        let p = Self { lat, lon };
        if p.is_valid() {
            Ok(p)
        } else {
            Err(Error::InputUnavailable(format!(
                "coordinates out of range: lat={lat} lon={lon}"
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= WORLD_LAT_MAX
            && self.lon.abs() <= WORLD_LON_MAX
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

fn semi_minor() -> f64 {
    WGS84_A * (1.0 - WGS84_F)
}

fn series_a_b(cos_sq_alpha: f64) -> (f64, f64) {
    let b = semi_minor();
    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - b * b) / (b * b);
    let big_a =
        1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    (big_a, big_b)
}

fn delta_sigma(big_b: f64, sin_sigma: f64, cos_sigma: f64, cos_2sigma_m: f64) -> f64 {
    let c2 = cos_2sigma_m * cos_2sigma_m;
    big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * c2)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * c2)))
}

/// `None` when the iteration does not converge (nearly antipodal points).
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> Option<f64> {
    if a == b {
        return Some(0.0);
    }
    let f = WGS84_F;
    let l = (b.lon - a.lon).to_radians();
    let u1 = ((1.0 - f) * a.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * b.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let prev = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - prev).abs() < VINCENTY_TOLERANCE {
            let (big_a, big_b) = series_a_b(cos_sq_alpha);
            let ds = delta_sigma(big_b, sin_sigma, cos_sigma, cos_2sigma_m);
            let s = semi_minor() * big_a * (sigma - ds);
            return if s.is_finite() { Some(s) } else { None };
        }
    }
    None
}

pub fn try_distance(a: &GeoPoint, b: &GeoPoint) -> Result<f64> {
    distance(a, b).ok_or_else(|| {
        Error::InputUnavailable(format!(
            "geodesic distance did not converge between ({}, {}) and ({}, {})",
            a.lat, a.lon, b.lat, b.lon
        ))
    })
}

/// Bearing in degrees clockwise from north.
pub fn destination(origin: &GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let f = WGS84_F;
    let b = semi_minor();
    let alpha1 = bearing_deg.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - f) * origin.lat.to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;
    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let (big_a, big_b) = series_a_b(cos_sq_alpha);

    let base = distance_m / (b * big_a);
    let mut sigma = base;
    let mut cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    for _ in 0..VINCENTY_MAX_ITERATIONS {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        let (sin_sigma, cos_sigma) = sigma.sin_cos();
        let prev = sigma;
        sigma = base + delta_sigma(big_b, sin_sigma, cos_sigma, cos_2sigma_m);
        if (sigma - prev).abs() < VINCENTY_TOLERANCE {
            break;
        }
    }

    let (sin_sigma, cos_sigma) = sigma.sin_cos();
    let x = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + x * x).sqrt());
    let lambda =
        (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

    GeoPoint {
        lat: lat2.to_degrees(),
        lon: normalize_lon(origin.lon + l.to_degrees()),
    }
}

fn normalize_lon(lon: f64) -> f64 {
    let mut out = (lon + 180.0) % 360.0;
    if out < 0.0 {
        out += 360.0;
    }
    out - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_EPSILON_M: f64 = 0.5;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = GeoPoint::new(52.52, 13.40);
        assert_eq!(distance(&p, &p), Some(0.0));
    }

    #[test]
    fn matches_reference_flinders_peak_buninyong() {
        // Vincenty's published test line, converted to WGS-84 reference values.
        let a = GeoPoint::new(-37.951_033_416, 144.424_867_888);
        let b = GeoPoint::new(-37.652_821_139, 143.926_495_528);
        let d = distance(&a, &b).unwrap();
        assert!((d - 54_972.271).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let d = distance(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 1.0)).unwrap();
        assert!((d - 111_319.491).abs() < TEST_EPSILON_M, "got {d}");
    }

    #[test]
    fn antipodal_points_are_unavailable() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.5, 179.7);
        assert!(distance(&a, &b).is_none());
        assert!(matches!(try_distance(&a, &b), Err(Error::InputUnavailable(_))));
    }

    #[test]
    fn destination_round_trips_with_distance() {
        let origin = GeoPoint::new(48.8566, 2.3522);
        for bearing in [0.0, 90.0, 180.0, -90.0, 37.0] {
            let p = destination(&origin, bearing, 150_000.0);
            let back = distance(&origin, &p).unwrap();
            assert!((back - 150_000.0).abs() < TEST_EPSILON_M, "bearing {bearing}: {back}");
        }
    }

    #[test]
    fn destination_north_keeps_longitude() {
        let origin = GeoPoint::new(50.0, 10.0);
        let p = destination(&origin, 0.0, 50_000.0);
        assert!(p.lat > origin.lat);
        assert!((p.lon - origin.lon).abs() < 1e-9);
    }

    #[test]
    fn checked_rejects_out_of_range() {
        assert!(GeoPoint::checked(91.0, 0.0).is_err());
        assert!(GeoPoint::checked(0.0, -181.0).is_err());
        assert!(GeoPoint::checked(45.0, 7.0).is_ok());
    }
}
