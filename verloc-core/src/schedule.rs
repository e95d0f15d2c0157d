//! Partner chain: `h_{i+1} = SHA256(hex(SHA256(h_i)))` as a 256-bit integer
//! modulo the network size; the next input is its decimal rendering.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::constants::SCHEDULE_ATTEMPTS_PER_SLOT;
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::NodeId;

#[derive(Debug, Clone)]
pub struct HashChain {
    input: Vec<u8>,
}

impl HashChain {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            input: seed.to_vec(),
        }
    }
}

impl Iterator for HashChain {
    type Item = BigUint;

    fn next(&mut self) -> Option<BigUint> {
        let hex_hash = hex::encode(Sha256::digest(&self.input));
        let value = BigUint::from_bytes_be(&Sha256::digest(hex_hash.as_bytes()));
        self.input = value.to_str_radix(10).into_bytes();
        Some(value)
    }
}

pub fn candidates(seed: &[u8], network_size: usize) -> impl Iterator<Item = NodeId> {
    let modulus = BigUint::from(network_size.max(1));
    HashChain::new(seed).filter_map(move |v| (v % &modulus).to_u32())
}

fn attempt_budget(target: usize) -> usize {
    SCHEDULE_ATTEMPTS_PER_SLOT * target.max(1)
}

fn fill_from_chain<F>(
    seed: &[u8],
    own: NodeId,
    list: &mut Vec<NodeId>,
    target: usize,
    network_size: usize,
    mut accept: F,
) -> Result<()>
where
    F: FnMut(&[NodeId], NodeId) -> bool,
{
    if list.len() >= target {
        return Ok(());
    }
    let budget = attempt_budget(target);
    for (attempt, candidate) in candidates(seed, network_size).take(budget).enumerate() {
        if candidate == own || list.contains(&candidate) || !accept(list, candidate) {
            continue;
        }
        list.push(candidate);
        if list.len() >= target {
            debug!(node = own, attempts = attempt + 1, "schedule complete");
            return Ok(());
        }
    }
    Err(Error::ScheduleExhausted {
        partial: list.clone(),
        target,
        attempts: budget,
    })
}

pub fn generate_schedule(
    seed_hash: &[u8],
    own: NodeId,
    target_count: usize,
    network_size: usize,
) -> Result<Vec<NodeId>> {
    let mut list = Vec::with_capacity(target_count);
    fill_from_chain(seed_hash, own, &mut list, target_count, network_size, |_, _| true)?;
    Ok(list)
}

pub fn generate_schedule_with_locations(
    seed_hash: &[u8],
    own: NodeId,
    target_count: usize,
    locations: &[GeoPoint],
) -> Result<Vec<NodeId>> {
    let mut list = Vec::with_capacity(target_count);
    fill_from_chain(seed_hash, own, &mut list, target_count, locations.len(), |chosen, c| {
        distinct_location(locations, chosen, c)
    })?;
    Ok(list)
}

fn distinct_location(locations: &[GeoPoint], chosen: &[NodeId], candidate: NodeId) -> bool {
    let Some(loc) = locations.get(candidate as usize) else {
        return false;
    };
    !chosen
        .iter()
        .any(|id| locations.get(*id as usize) == Some(loc))
}

#[derive(Debug, Clone)]
pub struct PartnerArena {
    capacity: usize,
    lists: Vec<Vec<NodeId>>,
}

impl PartnerArena {
    pub fn new(network_size: usize, capacity: usize) -> Self {
        Self {
            capacity,
            lists: vec![Vec::with_capacity(capacity); network_size],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn partners(&self, node: NodeId) -> &[NodeId] {
        self.lists.get(node as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn room(&self, node: NodeId) -> usize {
        self.capacity.saturating_sub(self.partners(node).len())
    }

    pub fn try_push(&mut self, node: NodeId, partner: NodeId) -> bool {
        if node == partner || partner as usize >= self.lists.len() {
            return false;
        }
        let capacity = self.capacity;
        match self.lists.get_mut(node as usize) {
            Some(list) if list.len() < capacity && !list.contains(&partner) => {
                list.push(partner);
                true
            }
            _ => false,
        }
    }

    pub fn into_schedule(self) -> Schedule {
        Schedule { lists: self.lists }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schedule {
    lists: Vec<Vec<NodeId>>,
}

impl Schedule {
    pub fn from_lists(lists: Vec<Vec<NodeId>>) -> Self {
        Self { lists }
    }

    pub fn partners(&self, node: NodeId) -> &[NodeId] {
        self.lists.get(node as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn network_size(&self) -> usize {
        self.lists.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> {
        self.lists
            .iter()
            .enumerate()
            .map(|(i, l)| (i as NodeId, l.as_slice()))
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.lists.iter().map(Vec::len).collect()
    }
}

#[derive(Debug)]
pub struct NetworkSchedule {
    pub schedule: Schedule,
    pub shortfalls: Vec<(NodeId, usize)>,
}

/// Each node tops its own list up first, then joins every partner's list
/// that still has room.
pub fn build_network_schedule(
    seeds: &[Vec<u8>],
    target_count: usize,
    locations: Option<&[GeoPoint]>,
) -> NetworkSchedule {
    let network_size = seeds.len();
    let mut arena = PartnerArena::new(network_size, target_count);
    let mut shortfalls = Vec::new();

    for (idx, seed) in seeds.iter().enumerate() {
        let node = idx as NodeId;
        let mut list = arena.partners(node).to_vec();
        let drawn = fill_from_chain(seed, node, &mut list, target_count, network_size, |chosen, c| {
            locations.map_or(true, |locs| distinct_location(locs, chosen, c))
        });
        if let Err(err) = drawn {
            warn!(node, error = %err, "partial schedule");
            shortfalls.push((node, list.len()));
        }
        for partner in list {
            arena.try_push(node, partner);
        }
        for partner in arena.partners(node).to_vec() {
            arena.try_push(partner, node);
        }
    }

    NetworkSchedule {
        schedule: arena.into_schedule(),
        shortfalls,
    }
}
