use std::io;

use crate::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    #[error("schedule exhausted after {attempts} attempts: found {} of {target}", partial.len())]
    ScheduleExhausted {
        partial: Vec<NodeId>,
        target: usize,
        attempts: usize,
    },

    #[error("crypto invalid: {0}")]
    CryptoInvalid(String),

    #[error("optimization failure: {0}")]
    OptimizationFailure(String),

    #[error("verification inconclusive: {0}")]
    VerificationInconclusive(String),

    #[error("ledger integrity violated at block {index}: expected {expected}, stored {stored}")]
    LedgerIntegrity {
        index: u64,
        expected: String,
        stored: String,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
