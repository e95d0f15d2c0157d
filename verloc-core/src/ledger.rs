use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::error::{Error, Result};
use crate::{now_unix_ms, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    RandomOutput,
    Schedule,
    Initialization,
}

/// Untagged, so exported JSON reads `[proof, hash]`, a partner list or a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    RandomOutput(String, String),
    Schedule(Vec<NodeId>),
    PublicKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub content: BTreeMap<NodeId, Payload>,
    pub epoch_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Stringified fields in declaration order.
    pub fn hash(&self) -> Result<String> {
        let transactions = serde_json::to_string(&self.transactions)?;
        let block_string = format!(
            "{}{}{}{}{}",
            self.index, self.timestamp, transactions, self.proof, self.previous_hash
        );
        Ok(hex::encode(Sha256::digest(block_string.as_bytes())))
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        let genesis = Block {
            index: 1,
            timestamp: unix_seconds(),
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        };
        Self {
            chain: vec![genesis],
            pending: Vec::new(),
        }
    }

    pub fn from_blocks(chain: Vec<Block>) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::InputUnavailable("ledger has no genesis block".into()));
        }
        Ok(Self {
            chain,
            pending: Vec::new(),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn last_block(&self) -> &Block {
        // The chain always holds at least the genesis block.
        &self.chain[self.chain.len() - 1]
    }

    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Result<&Block> {
        let previous_hash = match previous_hash {
            Some(h) => h,
            None => self.last_block().hash()?,
        };
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: unix_seconds(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };
        debug!(
            index = block.index,
            transactions = block.transactions.len(),
            "block sealed"
        );
        self.chain.push(block);
        Ok(self.last_block())
    }

    pub fn new_transaction(
        &mut self,
        kind: TransactionKind,
        content: BTreeMap<NodeId, Payload>,
        epoch_index: u64,
    ) -> u64 {
        self.pending.push(Transaction {
            kind,
            content,
            epoch_index,
        });
        self.last_block().index + 1
    }

    pub fn submit(&mut self, tx: Transaction) -> u64 {
        self.new_transaction(tx.kind, tx.content, tx.epoch_index)
    }

    pub fn verify_integrity(&self) -> Result<()> {
        for (pos, pair) in self.chain.windows(2).enumerate() {
            let (prev, block) = (&pair[0], &pair[1]);
            let expected_index = pos as u64 + 2;
            if block.index != expected_index {
                return Err(Error::LedgerIntegrity {
                    index: block.index,
                    expected: format!("index {expected_index}"),
                    stored: format!("index {}", block.index),
                });
            }
            let expected = prev.hash()?;
            if block.previous_hash != expected {
                return Err(Error::LedgerIntegrity {
                    index: block.index,
                    expected,
                    stored: block.previous_hash.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.chain)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        info!(
            path = %path.as_ref().display(),
            blocks = self.chain.len(),
            "ledger exported"
        );
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_blocks(serde_json::from_slice(&data)?)
    }
}

fn unix_seconds() -> f64 {
    now_unix_ms() as f64 / 1000.0
}
