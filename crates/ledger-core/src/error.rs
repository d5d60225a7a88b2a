use thiserror::Error;

/// Failures of local ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid peer address {0:?}: no network location")]
    InvalidAddress(String),

    #[error("stale proof for block {expected_index} on {expected_prev}: the next block index is now {actual_index}")]
    StaleProof {
        expected_index: u64,
        expected_prev: String,
        actual_index: u64,
    },

    #[error("nonce {nonce} does not satisfy the difficulty target for block {index}")]
    InvalidProof { index: u64, nonce: u64 },
}

/// Why a single peer's chain was left out of a synchronization pass.
///
/// None of these abort the pass; they are collected and reported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("peer {peer} answered with status {status}")]
    BadResponse { peer: String, status: u16 },

    #[error("peer {peer} sent a malformed payload: {reason}")]
    Malformed { peer: String, reason: String },

    #[error("peer {peer} reported length {reported} but sent {actual} blocks")]
    LengthMismatch {
        peer: String,
        reported: usize,
        actual: usize,
    },

    #[error("peer {peer} sent an invalid chain of length {length}")]
    InvalidChain { peer: String, length: usize },
}

impl PeerError {
    pub fn peer(&self) -> &str {
        match self {
            PeerError::Unreachable { peer, .. }
            | PeerError::BadResponse { peer, .. }
            | PeerError::Malformed { peer, .. }
            | PeerError::LengthMismatch { peer, .. }
            | PeerError::InvalidChain { peer, .. } => peer,
        }
    }
}

/// First defect found in a candidate chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainFault {
    #[error("chain is empty")]
    Empty,

    #[error("block at position {position} carries index {found}")]
    IndexMismatch { position: usize, found: u64 },

    #[error("block {position} does not link to its predecessor")]
    BrokenLink { position: usize },

    #[error("block {position} fails proof-of-work")]
    BadProof { position: usize },
}
