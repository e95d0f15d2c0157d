use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::geo::GeoPoint;

const EMBEDDED_EUROPE: &str = include_str!("../data/europe.geojson");

// [lon, lat], GeoJSON order.
type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone)]
struct Polygon {
    outer: Ring,
    holes: Vec<Ring>,
}

impl Polygon {
    fn from_rings(mut rings: Vec<Ring>) -> Option<Self> {
        if rings.is_empty() {
            return None;
        }
        let outer = rings.remove(0);
        Some(Self {
            outer,
            holes: rings,
        })
    }

    fn contains(&self, lon: f64, lat: f64) -> bool {
        ring_contains(&self.outer, lon, lat)
            && !self.holes.iter().any(|h| ring_contains(h, lon, lat))
    }
}

// Points exactly on an edge may fall either way.
fn ring_contains(ring: &[[f64; 2]], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for (i, vi) in ring.iter().enumerate() {
        let vj = ring[j];
        let (xi, yi) = (vi[0], vi[1]);
        let (xj, yj) = (vj[0], vj[1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug, Clone)]
pub struct CountryPolygon {
    pub name: String,
    parts: Vec<Polygon>,
}

impl CountryPolygon {
    pub fn contains(&self, p: &GeoPoint) -> bool {
        self.parts.iter().any(|part| part.contains(p.lon, p.lat))
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: Properties,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Properties {
    name: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default)]
pub struct CountrySet {
    countries: Vec<CountryPolygon>,
}

impl CountrySet {
    pub fn from_geojson(text: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        let mut countries = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let parts: Vec<Polygon> = match feature.geometry {
                Geometry::Polygon { coordinates } => {
                    Polygon::from_rings(coordinates).into_iter().collect()
                }
                Geometry::MultiPolygon { coordinates } => coordinates
                    .into_iter()
                    .filter_map(Polygon::from_rings)
                    .collect(),
                Geometry::Unsupported => {
                    warn!(country = %feature.properties.name, "unsupported geometry, skipped");
                    continue;
                }
            };
            countries.push(CountryPolygon {
                name: feature.properties.name,
                parts,
            });
        }
        if countries.is_empty() {
            return Err(Error::InputUnavailable("no country polygons found".into()));
        }
        Ok(Self { countries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_geojson(&fs::read_to_string(path)?)
    }

    pub fn embedded_europe() -> Result<Self> {
        Self::from_geojson(EMBEDDED_EUROPE)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountryPolygon> {
        self.countries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.countries.iter().map(|c| c.name.as_str())
    }

    pub fn has_country(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub fn countries_at<'a>(&'a self, p: &GeoPoint) -> impl Iterator<Item = &'a str> + 'a {
        let p = *p;
        self.countries
            .iter()
            .filter(move |c| c.contains(&p))
            .map(|c| c.name.as_str())
    }

    pub fn country_of(&self, p: &GeoPoint) -> Option<&str> {
        self.countries_at(p).next()
    }

    pub fn on_land(&self, p: &GeoPoint) -> bool {
        self.country_of(p).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CITIES: &[(&str, f64, f64, &str)] = &[
        ("Berlin", 52.52, 13.40, "Germany"),
        ("Madrid", 40.42, -3.70, "Spain"),
        ("Paris", 48.86, 2.35, "France"),
        ("London", 51.51, -0.13, "United Kingdom"),
        ("Prague", 50.08, 14.42, "Czech Republic"),
        ("Vienna", 48.21, 16.37, "Austria"),
        ("Warsaw", 52.23, 21.01, "Poland"),
        ("Kyiv", 50.45, 30.52, "Ukraine"),
    ];

    #[test]
    fn embedded_set_has_fifteen_countries() {
        let set = CountrySet::embedded_europe().unwrap();
        assert_eq!(set.len(), 15);
        assert!(set.has_country("Switzerland"));
        assert!(!set.has_country("Portugal"));
    }

    #[test]
    fn capitals_fall_in_their_country() {
        let set = CountrySet::embedded_europe().unwrap();
        for (city, lat, lon, country) in TEST_CITIES {
            let p = GeoPoint::new(*lat, *lon);
            assert_eq!(set.country_of(&p), Some(*country), "{city}");
        }
    }

    #[test]
    fn open_sea_is_not_land() {
        let set = CountrySet::embedded_europe().unwrap();
        assert!(!set.on_land(&GeoPoint::new(45.0, -20.0)));
        assert_eq!(set.countries_at(&GeoPoint::new(45.0, -20.0)).count(), 0);
    }

    #[test]
    fn country_name_outlives_the_query_point() {
        let set = CountrySet::embedded_europe().unwrap();
        let name = {
            let p = GeoPoint::new(52.52, 13.40);
            set.country_of(&p)
        };
        assert_eq!(name, Some("Germany"));
        let names: Vec<&str> = [GeoPoint::new(48.86, 2.35)]
            .iter()
            .filter_map(|p| set.country_of(p))
            .collect();
        assert_eq!(names, ["France"]);
    }

    #[test]
    fn holes_are_excluded() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"Ring"},"geometry":{"type":"Polygon",
             "coordinates":[[[0,0],[10,0],[10,10],[0,10],[0,0]],[[4,4],[6,4],[6,6],[4,6],[4,4]]]}},
            {"type":"Feature","properties":{"name":"Line"},"geometry":{"type":"LineString",
             "coordinates":[[0,0],[1,1]]}}
        ]}"#;
        let set = CountrySet::from_geojson(text).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.country_of(&GeoPoint::new(2.0, 2.0)), Some("Ring"));
        assert_eq!(set.country_of(&GeoPoint::new(5.0, 5.0)), None);
    }

    #[test]
    fn empty_collection_is_unavailable() {
        let err = CountrySet::from_geojson(r#"{"type":"FeatureCollection","features":[]}"#);
        assert!(matches!(err, Err(Error::InputUnavailable(_))));
    }
}
