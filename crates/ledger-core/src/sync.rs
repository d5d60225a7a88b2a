//! Longest-valid-chain resolution across peers.
//!
//! Resolution is a free function over explicit inputs (local length, peer
//! list, a [`ChainSource`]) so it can run without holding any ledger lock and
//! against any number of ledgers in one process.

use crate::{validate, Block, Difficulty, PeerError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// A peer's full chain as exported over the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Where peer chains come from. The node fetches them over HTTP.
pub trait ChainSource {
    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<ChainResponse, PeerError>> + Send;
}

/// Result of one resolution pass.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Longest valid chain strictly longer than the local one, if any.
    pub replacement: Option<Vec<Block>>,
    pub best_peer: Option<String>,
    /// Peers whose chain could not be considered.
    pub failures: Vec<PeerError>,
    pub peers_consulted: usize,
}

impl SyncOutcome {
    pub fn found_longer(&self) -> bool {
        self.replacement.is_some()
    }
}

/// Fetch every peer's chain concurrently and pick the longest valid one.
///
/// Only chains strictly longer than both `local_len` and every earlier
/// candidate are considered, so ties keep the local chain (or the first
/// peer, in `peers` order). A failing peer is recorded and skipped.
pub async fn resolve_conflicts<S: ChainSource>(
    local_len: usize,
    peers: &[String],
    source: &S,
    difficulty: &Difficulty,
) -> SyncOutcome {
    let fetches = peers
        .iter()
        .map(|peer| async move { (peer.as_str(), source.fetch_chain(peer).await) });
    let responses = join_all(fetches).await;

    let mut outcome = SyncOutcome {
        peers_consulted: peers.len(),
        ..SyncOutcome::default()
    };
    let mut best_len = local_len;

    for (peer, response) in responses {
        let response = match response.and_then(|r| check_length(peer, r)) {
            Ok(r) => r,
            Err(err) => {
                warn!(%err, "skipping peer");
                outcome.failures.push(err);
                continue;
            }
        };
        let length = response.chain.len();
        if length <= best_len {
            debug!(peer, length, best_len, "peer chain is not longer");
            continue;
        }
        if let Err(fault) = validate::validate(&response.chain, difficulty) {
            let err = PeerError::InvalidChain {
                peer: peer.to_string(),
                length,
            };
            warn!(%err, %fault, "skipping peer");
            outcome.failures.push(err);
            continue;
        }
        best_len = length;
        outcome.best_peer = Some(peer.to_string());
        outcome.replacement = Some(response.chain);
    }

    if let Some(peer) = &outcome.best_peer {
        info!(peer, length = best_len, local_len, "found longer valid chain");
    }
    outcome
}

fn check_length(peer: &str, response: ChainResponse) -> Result<ChainResponse, PeerError> {
    if response.length != response.chain.len() {
        return Err(PeerError::LengthMismatch {
            peer: peer.to_string(),
            reported: response.length,
            actual: response.chain.len(),
        });
    }
    Ok(response)
}
