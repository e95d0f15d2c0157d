use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::schedule::Schedule;
use crate::NodeId;

/// Ids must be dense, `0..len`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[serde(default)]
    pub identity: String,
}

impl NodeRecord {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

pub fn load_catalogue<P: AsRef<Path>>(path: P) -> Result<Vec<NodeRecord>> {
    let file = File::open(path)?;
    let records: Vec<NodeRecord> = serde_json::from_reader(BufReader::new(file))?;
    check_catalogue(records)
}

pub fn check_catalogue(mut records: Vec<NodeRecord>) -> Result<Vec<NodeRecord>> {
    records.sort_by_key(|r| r.id);
    for (idx, rec) in records.iter().enumerate() {
        if rec.id as usize != idx {
            return Err(Error::Config(format!(
                "catalogue ids must be dense: expected {idx}, found {}",
                rec.id
            )));
        }
        GeoPoint::checked(rec.lat, rec.lon)?;
    }
    Ok(records)
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub from: NodeId,
    pub to: NodeId,
    pub raw_timings: Vec<f64>,
}

impl Measurement {
    pub fn min_rtt(&self) -> Option<f64> {
        self.raw_timings
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn summary(&self) -> Option<SampleSummary> {
        summarize(&self.raw_timings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub min: f64,
    pub p05: f64,
    pub median: f64,
}

pub fn summarize(samples: &[f64]) -> Option<SampleSummary> {
    let mut s: Vec<f64> = samples.iter().copied().filter(|t| t.is_finite()).collect();
    if s.is_empty() {
        return None;
    }
    s.sort_by(|a, b| a.total_cmp(b));
    Some(SampleSummary {
        min: s[0],
        p05: s[((s.len() - 1) as f64 * 0.05).floor() as usize],
        median: s[s.len() / 2],
    })
}

/// A missing time falls back to the minimum of that direction's samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub from_index: NodeId,
    pub to_index: NodeId,
    #[serde(default)]
    pub time_from_to: Option<f64>,
    #[serde(default)]
    pub time_to_from: Option<f64>,
    #[serde(default)]
    pub samples_from_to: Vec<f64>,
    #[serde(default)]
    pub samples_to_from: Vec<f64>,
}

impl MeasurementRecord {
    fn forward(&self) -> Option<f64> {
        self.time_from_to.or_else(|| {
            Measurement {
                from: self.from_index,
                to: self.to_index,
                raw_timings: self.samples_from_to.clone(),
            }
            .min_rtt()
        })
    }

    fn backward(&self) -> Option<f64> {
        self.time_to_from.or_else(|| {
            Measurement {
                from: self.to_index,
                to: self.from_index,
                raw_timings: self.samples_to_from.clone(),
            }
            .min_rtt()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    pairs: HashMap<(NodeId, NodeId), (f64, f64)>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn insert(&mut self, from: NodeId, to: NodeId, time_from_to: f64, time_to_from: f64) {
        self.pairs.insert((from, to), (time_from_to, time_to_from));
    }

    pub fn insert_record(&mut self, rec: &MeasurementRecord) -> Result<()> {
        match (rec.forward(), rec.backward()) {
            (Some(ft), Some(tf)) => {
                self.insert(rec.from_index, rec.to_index, ft, tf);
                Ok(())
            }
            _ => Err(Error::InputUnavailable(format!(
                "pair {} -> {} has no timings",
                rec.from_index, rec.to_index
            ))),
        }
    }

    pub fn load_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut table = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<MeasurementRecord>(&line)
                .map_err(Error::from)
                .and_then(|rec| table.insert_record(&rec));
            if let Err(err) = parsed {
                warn!(line = lineno + 1, error = %err, "skipping measurement line");
            }
        }
        Ok(table)
    }

    pub fn time_from_to(&self, node: NodeId, other: NodeId) -> Option<f64> {
        self.pairs
            .get(&(node, other))
            .map(|p| p.0)
            .or_else(|| self.pairs.get(&(other, node)).map(|p| p.1))
    }

    pub fn time_to_from(&self, node: NodeId, other: NodeId) -> Option<f64> {
        self.pairs
            .get(&(node, other))
            .map(|p| p.1)
            .or_else(|| self.pairs.get(&(other, node)).map(|p| p.0))
    }

    pub fn pair(&self, node: NodeId, reference: NodeId) -> Result<(f64, f64)> {
        match (self.time_from_to(node, reference), self.time_to_from(node, reference)) {
            (Some(mine), Some(theirs)) => Ok((mine, theirs)),
            _ => Err(Error::InputUnavailable(format!(
                "no measurement between {node} and {reference}"
            ))),
        }
    }
}

/// The four reference vectors are aligned index for index.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBundle {
    pub node: NodeId,
    /// Catalogue position; the verifier treats it as the claimed location.
    pub location: GeoPoint,
    pub country: String,
    pub references: Vec<NodeId>,
    pub my_times: Vec<f64>,
    pub their_times: Vec<f64>,
    pub reference_locations: Vec<GeoPoint>,
}

impl NodeBundle {
    pub fn new(node: NodeId, location: GeoPoint, country: impl Into<String>) -> Self {
        Self {
            node,
            location,
            country: country.into(),
            ..Self::default()
        }
    }

    pub fn push_reference(
        &mut self,
        reference: NodeId,
        location: GeoPoint,
        mine: f64,
        theirs: f64,
    ) {
        self.references.push(reference);
        self.reference_locations.push(location);
        self.my_times.push(mine);
        self.their_times.push(theirs);
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        let n = self.references.len();
        self.my_times.len() == n
            && self.their_times.len() == n
            && self.reference_locations.len() == n
    }
}

pub fn assemble_bundles(
    catalogue: &[NodeRecord],
    schedule: &Schedule,
    table: &MeasurementTable,
) -> Vec<NodeBundle> {
    catalogue
        .iter()
        .map(|rec| {
            let mut bundle = NodeBundle::new(rec.id, rec.location(), rec.country.clone());
            for &partner in schedule.partners(rec.id) {
                let Some(partner_rec) = catalogue.get(partner as usize) else {
                    debug!(node = rec.id, partner, "partner missing from catalogue");
                    continue;
                };
                match table.pair(rec.id, partner) {
                    Ok((mine, theirs)) => {
                        bundle.push_reference(partner, partner_rec.location(), mine, theirs)
                    }
                    Err(err) => debug!(node = rec.id, partner, error = %err, "skipping reference"),
                }
            }
            bundle
        })
        .collect()
}
