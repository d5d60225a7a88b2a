/// Hex prefix every proof-of-work digest must start with.
pub const DIFFICULTY_TARGET: &str = "0000";
/// Value hashed to produce the genesis block's previous-hash.
pub const GENESIS_SEED: &str = "genesis_block";
/// Sender recorded on the mining reward transaction.
pub const REWARD_SENDER: &str = "0";
pub const REWARD_AMOUNT: f64 = 1.0;
pub const HASH_HEX_SIZE: usize = 64;
/// Nonces tried between cancellation checks during a proof search.
pub const NONCES_PER_BATCH: u64 = 1 << 14;
