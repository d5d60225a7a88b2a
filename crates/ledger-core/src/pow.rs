//! Proof-of-work over `(index, previous hash, transactions, nonce)`.
//!
//! The proof digest is SHA-256 of the four fields concatenated in that order
//! (transactions as canonical JSON, numbers in decimal). It is independent of
//! the block digest used for linkage.

use crate::{constants, hash, Transaction};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// Hex prefix a proof digest has to start with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Difficulty(String);

impl Difficulty {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// A prefix of `n` hex zeros.
    pub fn zeros(n: usize) -> Self {
        Self("0".repeat(n))
    }

    pub fn prefix(&self) -> &str {
        &self.0
    }

    pub fn is_met_by(&self, digest: &str) -> bool {
        digest.starts_with(&self.0)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::new(constants::DIFFICULTY_TARGET)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The nonce-independent part of a proof, hashed once and reused per attempt.
#[derive(Clone)]
pub struct ProofTemplate {
    base: Sha256,
}

impl ProofTemplate {
    pub fn new(index: u64, prev_hash: &str, transactions: &[Transaction]) -> Self {
        let mut base = Sha256::new();
        base.update(index.to_string().as_bytes());
        base.update(prev_hash.as_bytes());
        base.update(hash::canonical_json(transactions));
        Self { base }
    }

    pub fn digest(&self, nonce: u64) -> String {
        hex::encode(self.base.clone().chain_update(nonce.to_string()).finalize())
    }

    pub fn satisfied(&self, nonce: u64, difficulty: &Difficulty) -> bool {
        difficulty.is_met_by(&self.digest(nonce))
    }
}

/// Proof digest for one candidate nonce.
pub fn proof_digest(index: u64, prev_hash: &str, transactions: &[Transaction], nonce: u64) -> String {
    ProofTemplate::new(index, prev_hash, transactions).digest(nonce)
}

pub fn difficulty_satisfied(
    index: u64,
    prev_hash: &str,
    transactions: &[Transaction],
    nonce: u64,
    difficulty: &Difficulty,
) -> bool {
    ProofTemplate::new(index, prev_hash, transactions).satisfied(nonce, difficulty)
}

/// Smallest nonce satisfying `difficulty`, searched sequentially from 0.
///
/// Blocks the calling thread until a nonce is found.
pub fn find_nonce(
    index: u64,
    prev_hash: &str,
    transactions: &[Transaction],
    difficulty: &Difficulty,
) -> u64 {
    let template = ProofTemplate::new(index, prev_hash, transactions);
    let mut nonce = 0u64;
    while !template.satisfied(nonce, difficulty) {
        nonce += 1;
    }
    debug!(index, nonce, "found nonce");
    nonce
}

/// Parallel variant of [`find_nonce`] that can be interrupted.
///
/// Nonces are scanned in batches of [`constants::NONCES_PER_BATCH`] across the
/// rayon pool; `should_stop` is polled between batches. Returns the same
/// (smallest) nonce as [`find_nonce`], or `None` once `should_stop` reports true.
pub fn find_nonce_until<F>(
    index: u64,
    prev_hash: &str,
    transactions: &[Transaction],
    difficulty: &Difficulty,
    should_stop: F,
) -> Option<u64>
where
    F: Fn() -> bool,
{
    let template = ProofTemplate::new(index, prev_hash, transactions);
    let mut start = 0u64;
    loop {
        if should_stop() {
            debug!(index, tried = start, "proof search cancelled");
            return None;
        }
        let end = start.saturating_add(constants::NONCES_PER_BATCH);
        let found = (start..end)
            .into_par_iter()
            .find_first(|nonce| template.satisfied(*nonce, difficulty));
        if let Some(nonce) = found {
            debug!(index, nonce, "found nonce");
            return Some(nonce);
        }
        if end == u64::MAX {
            return None;
        }
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn txs() -> Vec<Transaction> {
        vec![
            Transaction::new("Alice", "Bob", 10.0),
            Transaction::new("Bob", "Charlie", 0.1 + 0.2),
        ]
    }

    #[test]
    fn default_difficulty_is_four_zeros() {
        assert_eq!(Difficulty::default().prefix(), "0000");
        assert_eq!(Difficulty::zeros(2), Difficulty::new("00"));
    }

    #[test]
    fn difficulty_matches_prefix_only() {
        let d = Difficulty::zeros(2);
        assert!(d.is_met_by("00ab"));
        assert!(d.is_met_by("000b"));
        assert!(!d.is_met_by("0a0b"));
        assert!(Difficulty::new("").is_met_by("ffff"));
    }

    #[test]
    fn proof_digest_is_sha256_of_concatenated_fields() {
        let transactions = txs();
        let content = format!(
            "{}{}{}{}",
            3,
            "prev",
            String::from_utf8(hash::canonical_json(&transactions)).unwrap(),
            99
        );
        assert_eq!(
            proof_digest(3, "prev", &transactions, 99),
            hash::sha256_hex(content.as_bytes())
        );
    }

    #[test]
    fn find_nonce_returns_minimal_satisfying_nonce() {
        let d = Difficulty::zeros(2);
        let transactions = txs();
        let nonce = find_nonce(1, "prev", &transactions, &d);
        assert!(difficulty_satisfied(1, "prev", &transactions, nonce, &d));
        for earlier in 0..nonce {
            assert!(!difficulty_satisfied(1, "prev", &transactions, earlier, &d));
        }
    }

    #[test]
    fn parallel_search_agrees_with_sequential() {
        let d = Difficulty::zeros(3);
        let transactions = txs();
        let sequential = find_nonce(5, "abc", &transactions, &d);
        let parallel = find_nonce_until(5, "abc", &transactions, &d, || false);
        assert_eq!(parallel, Some(sequential));
    }

    #[test]
    fn search_stops_when_asked() {
        // Practically unreachable target; only cancellation ends the search.
        let d = Difficulty::zeros(64);
        let polls = AtomicUsize::new(0);
        let result = find_nonce_until(0, "x", &[], &d, || polls.fetch_add(1, Ordering::SeqCst) >= 2);
        assert_eq!(result, None);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn proof_depends_on_every_field() {
        let transactions = txs();
        let base = proof_digest(1, "prev", &transactions, 7);
        assert_ne!(base, proof_digest(2, "prev", &transactions, 7));
        assert_ne!(base, proof_digest(1, "prev2", &transactions, 7));
        assert_ne!(base, proof_digest(1, "prev", &transactions[..1], 7));
        assert_ne!(base, proof_digest(1, "prev", &transactions, 8));
    }
}
