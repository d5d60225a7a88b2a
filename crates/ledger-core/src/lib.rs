use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod peer;
pub mod pow;
pub mod sync;
pub mod validate;

pub use error::{ChainFault, LedgerError, PeerError};
pub use ledger::{Ledger, MiningJob};
pub use pow::Difficulty;
pub use sync::{ChainResponse, ChainSource, SyncOutcome};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    /// Any JSON number; sign and size are not checked.
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch at commit time.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash_of_previous_block: String,
}

impl Block {
    /// Canonical digest of the whole block, used for linkage.
    pub fn hash(&self) -> String {
        hash::hash_value(self)
    }
}

pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
