pub(crate) const CHAIN_PATH: &str = "/blockchain";
pub(crate) const DEFAULT_PEER_TIMEOUT_MS: u64 = 2_000;
pub(crate) const NODE_ID_BYTES: usize = 16;
