//! Stateless chain validation.
//!
//! Works on any slice of blocks, whether built locally or received from a
//! peer. The genesis block is trusted as-is.

use crate::{pow, Block, ChainFault, Difficulty};

/// Check linkage, position and proof-of-work of every block after genesis.
pub fn validate(chain: &[Block], difficulty: &Difficulty) -> Result<(), ChainFault> {
    if chain.is_empty() {
        return Err(ChainFault::Empty);
    }
    for (position, pair) in chain.windows(2).enumerate().map(|(i, w)| (i + 1, w)) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.index != position as u64 {
            return Err(ChainFault::IndexMismatch {
                position,
                found: block.index,
            });
        }
        if block.hash_of_previous_block != prev.hash() {
            return Err(ChainFault::BrokenLink { position });
        }
        if !pow::difficulty_satisfied(
            position as u64,
            &block.hash_of_previous_block,
            &block.transactions,
            block.nonce,
            difficulty,
        ) {
            return Err(ChainFault::BadProof { position });
        }
    }
    Ok(())
}

pub fn is_valid(chain: &[Block], difficulty: &Difficulty) -> bool {
    validate(chain, difficulty).is_ok()
}
