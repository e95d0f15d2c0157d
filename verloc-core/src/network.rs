use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::constants::EPOCH_BEACON_LEN;
use crate::error::{Error, Result};
use crate::ledger::{Payload, Transaction, TransactionKind};
use crate::schedule;
use crate::vrf::{self, Proof, VrfHash, VrfKeypair, VrfOutput, PUBLIC_KEY_LEN};
use crate::NodeId;

pub type EpochBeacon = [u8; EPOCH_BEACON_LEN];

pub struct Node {
    pub id: NodeId,
    keys: VrfKeypair,
    last_update_epoch: Option<u64>,
    epoch_blocks: BTreeMap<u64, u64>,
    output: Option<VrfOutput>,
    schedule: Vec<NodeId>,
}

impl Node {
    pub fn new<R: RngCore + CryptoRng>(id: NodeId, rng: &mut R) -> Self {
        Self::from_keypair(id, VrfKeypair::generate(rng))
    }

    pub fn from_keypair(id: NodeId, keys: VrfKeypair) -> Self {
        Self {
            id,
            keys,
            last_update_epoch: None,
            epoch_blocks: BTreeMap::new(),
            output: None,
            schedule: Vec::new(),
        }
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.keys.public_key()
    }

    pub fn last_update_epoch(&self) -> Option<u64> {
        self.last_update_epoch
    }

    pub fn epoch_block(&self, epoch: u64) -> Option<u64> {
        self.epoch_blocks.get(&epoch).copied()
    }

    pub fn output(&self) -> Option<&VrfOutput> {
        self.output.as_ref()
    }

    pub fn schedule(&self) -> &[NodeId] {
        &self.schedule
    }

    pub fn compute_random_output(
        &mut self,
        beacon: &[u8],
        epoch: u64,
        block_id: u64,
    ) -> Result<Transaction> {
        let output = self.keys.evaluate(beacon)?;
        let payload = Payload::RandomOutput(output.proof.to_base64(), output.hash.to_base64());
        self.output = Some(output);
        self.last_update_epoch = Some(epoch);
        self.epoch_blocks.insert(epoch, block_id);
        Ok(Transaction {
            kind: TransactionKind::RandomOutput,
            content: BTreeMap::from([(self.id, payload)]),
            epoch_index: epoch,
        })
    }

    /// On exhaustion the node keeps the partial schedule; the caller may still
    /// publish it with [`Node::schedule_transaction`].
    pub fn generate_schedule(
        &mut self,
        target: usize,
        epoch: u64,
        network_size: usize,
    ) -> Result<Transaction> {
        let hash = match (&self.output, self.last_update_epoch) {
            (Some(out), Some(e)) if e == epoch => out.hash,
            _ => {
                return Err(Error::CryptoInvalid(format!(
                    "node {} has no VRF output for epoch {epoch}",
                    self.id
                )))
            }
        };
        match schedule::generate_schedule(hash.as_bytes(), self.id, target, network_size) {
            Ok(partners) => {
                debug!(node = self.id, epoch, partners = partners.len(), "schedule derived");
                self.schedule = partners;
                Ok(self.schedule_transaction(epoch))
            }
            Err(Error::ScheduleExhausted {
                partial,
                target,
                attempts,
            }) => {
                self.schedule = partial.clone();
                Err(Error::ScheduleExhausted {
                    partial,
                    target,
                    attempts,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn schedule_transaction(&self, epoch: u64) -> Transaction {
        Transaction {
            kind: TransactionKind::Schedule,
            content: BTreeMap::from([(self.id, Payload::Schedule(self.schedule.clone()))]),
            epoch_index: epoch,
        }
    }
}

pub struct Network {
    nodes: Vec<Node>,
    public_keys: BTreeMap<NodeId, String>,
}

impl Network {
    pub fn new<R: RngCore + CryptoRng>(size: usize, rng: &mut R) -> Self {
        let nodes = (0..size).map(|i| Node::new(i as NodeId, rng)).collect();
        Self::from_nodes(nodes)
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let public_keys = nodes
            .iter()
            .map(|n| (n.id, BASE64.encode(n.public_key())))
            .collect();
        Self { nodes, public_keys }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn take_nodes(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.nodes)
    }

    pub fn restore(&mut self, mut nodes: Vec<Node>) {
        nodes.sort_by_key(|n| n.id);
        self.nodes = nodes;
    }

    pub fn public_keys(&self) -> &BTreeMap<NodeId, String> {
        &self.public_keys
    }

    pub fn initialization_transaction(&self) -> Transaction {
        let content = self
            .public_keys
            .iter()
            .map(|(id, pk)| (*id, Payload::PublicKey(pk.clone())))
            .collect();
        Transaction {
            kind: TransactionKind::Initialization,
            content,
            epoch_index: 0,
        }
    }

    pub fn generate_epoch_beacon<R: RngCore + CryptoRng>(rng: &mut R) -> EpochBeacon {
        let mut beacon = [0u8; EPOCH_BEACON_LEN];
        rng.fill_bytes(&mut beacon);
        beacon
    }

    fn decoded_public_key(&self, node: NodeId) -> Result<[u8; PUBLIC_KEY_LEN]> {
        let encoded = self
            .public_keys
            .get(&node)
            .ok_or_else(|| Error::InputUnavailable(format!("no public key for node {node}")))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| Error::CryptoInvalid(format!("public key of node {node}: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| {
                Error::CryptoInvalid(format!("public key of node {node} has wrong length"))
            })
    }

    pub fn verify_random_output(
        &self,
        node: NodeId,
        proof_b64: &str,
        beacon: &[u8],
    ) -> Result<VrfHash> {
        let pk = self.decoded_public_key(node)?;
        let proof = Proof::from_base64(proof_b64)?;
        vrf::verify(&pk, &proof, beacon)
    }

    pub fn audit_random_outputs(&self, tx: &Transaction, beacon: &[u8]) -> Result<()> {
        for (node, payload) in &tx.content {
            let Payload::RandomOutput(proof, hash) = payload else {
                continue;
            };
            let recovered = self.verify_random_output(*node, proof, beacon)?;
            if recovered.to_base64() != *hash {
                warn!(node, "published VRF hash does not match proof");
                return Err(Error::CryptoInvalid(format!(
                    "node {node} published a hash its proof does not yield"
                )));
            }
        }
        Ok(())
    }
}
