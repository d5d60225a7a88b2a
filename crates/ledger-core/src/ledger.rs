use crate::{
    constants, hash, peer, pow, sync, unix_now, validate, Block, ChainSource, Difficulty,
    LedgerError, SyncOutcome, Transaction,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// One node's replica of the chain together with its pending pool and peers.
///
/// The ledger is a plain value; callers sharing it between tasks wrap it in a
/// lock and keep the lock only for the short mutating calls (see
/// [`Ledger::prepare_mining`] and [`Ledger::commit_mined`]).
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    peers: BTreeSet<String>,
    difficulty: Difficulty,
}

/// Snapshot of what a block will contain, taken under the lock so the proof
/// search can run without it.
#[derive(Clone, Debug, PartialEq)]
pub struct MiningJob {
    pub index: u64,
    pub prev_hash: String,
    pub transactions: Vec<Transaction>,
    pub reward: Transaction,
    pub difficulty: Difficulty,
}

impl MiningJob {
    pub fn search(&self) -> u64 {
        pow::find_nonce(self.index, &self.prev_hash, &self.transactions, &self.difficulty)
    }

    /// Parallel search that gives up once `should_stop` returns true.
    pub fn search_until<F: Fn() -> bool>(&self, should_stop: F) -> Option<u64> {
        pow::find_nonce_until(
            self.index,
            &self.prev_hash,
            &self.transactions,
            &self.difficulty,
            should_stop,
        )
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Ledger at the default difficulty, holding only the genesis block.
    pub fn new() -> Self {
        Self::with_difficulty(Difficulty::default())
    }

    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        let mut ledger = Self {
            chain: Vec::new(),
            pending: Vec::new(),
            peers: BTreeSet::new(),
            difficulty,
        };
        let genesis_hash = hash::hash_value(constants::GENESIS_SEED);
        let nonce = pow::find_nonce(0, &genesis_hash, &[], &ledger.difficulty);
        let genesis = ledger.append_block(nonce, genesis_hash);
        info!(nonce = genesis.nonce, difficulty = %ledger.difficulty, "created genesis block");
        ledger
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds the genesis block")
    }

    /// Queue a transaction; returns the index of the block it will land in.
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
    ) -> u64 {
        self.pending.push(Transaction::new(sender, recipient, amount));
        self.last_block().index + 1
    }

    /// Commit the whole pending pool as the next block.
    ///
    /// The nonce is not checked here; callers are expected to have found it
    /// with [`pow::find_nonce`] for exactly these inputs.
    pub fn append_block(&mut self, nonce: u64, hash_of_previous_block: String) -> Block {
        let block = Block {
            index: self.chain.len() as u64,
            timestamp: unix_now(),
            transactions: std::mem::take(&mut self.pending),
            nonce,
            hash_of_previous_block,
        };
        debug!(index = block.index, txs = block.transactions.len(), "appended block");
        self.chain.push(block.clone());
        block
    }

    /// Register a peer by URL; returns the stored `host:port`.
    pub fn add_node(&mut self, address: &str) -> Result<String, LedgerError> {
        let netloc = peer::network_location(address)
            .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))?;
        if self.peers.insert(netloc.clone()) {
            info!(peer = %netloc, "registered peer");
        }
        Ok(netloc)
    }

    pub fn is_valid(&self) -> bool {
        validate::is_valid(&self.chain, &self.difficulty)
    }

    fn reward(miner: &str) -> Transaction {
        Transaction::new(constants::REWARD_SENDER, miner, constants::REWARD_AMOUNT)
    }

    /// Add the reward for `miner` and snapshot the next block's inputs.
    pub fn prepare_mining(&mut self, miner: &str) -> MiningJob {
        let reward = Self::reward(miner);
        self.pending.push(reward.clone());
        let last = self.last_block();
        MiningJob {
            index: last.index + 1,
            prev_hash: last.hash(),
            transactions: self.pending.clone(),
            reward,
            difficulty: self.difficulty.clone(),
        }
    }

    /// Verify a found nonce against the current tip and commit the job's block.
    ///
    /// Transactions queued while the search ran stay pending.
    pub fn commit_mined(&mut self, job: &MiningJob, nonce: u64) -> Result<Block, LedgerError> {
        let last = self.last_block();
        let tip_moved = last.index + 1 != job.index || last.hash() != job.prev_hash;
        if tip_moved || !self.pending.starts_with(&job.transactions) {
            return Err(LedgerError::StaleProof {
                expected_index: job.index,
                expected_prev: job.prev_hash.clone(),
                actual_index: last.index + 1,
            });
        }
        let proven = pow::difficulty_satisfied(
            job.index,
            &job.prev_hash,
            &job.transactions,
            nonce,
            &job.difficulty,
        );
        if !proven {
            return Err(LedgerError::InvalidProof {
                index: job.index,
                nonce,
            });
        }
        let late = self.pending.split_off(job.transactions.len());
        let block = self.append_block(nonce, job.prev_hash.clone());
        self.pending = late;
        info!(index = block.index, nonce, txs = block.transactions.len(), "mined block");
        Ok(block)
    }

    /// Drop the reward transaction of a job that will not be committed.
    pub fn abandon_mining(&mut self, job: &MiningJob) {
        if let Some(pos) = self.pending.iter().position(|tx| *tx == job.reward) {
            self.pending.remove(pos);
        }
    }

    /// Mine the next block on the calling thread and commit it.
    pub fn mine(&mut self, miner: &str) -> Block {
        self.pending.push(Self::reward(miner));
        let prev_hash = self.last_block().hash();
        let index = self.chain.len() as u64;
        let nonce = pow::find_nonce(index, &prev_hash, &self.pending, &self.difficulty);
        let block = self.append_block(nonce, prev_hash);
        info!(index = block.index, nonce, "mined block");
        block
    }

    /// Replace the chain if `candidate` is strictly longer and valid.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        if let Err(fault) = validate::validate(&candidate, &self.difficulty) {
            warn!(%fault, length = candidate.len(), "rejected replacement chain");
            return false;
        }
        info!(from = self.chain.len(), to = candidate.len(), "replaced chain");
        self.chain = candidate;
        true
    }

    /// Apply the result of a [`sync::resolve_conflicts`] pass.
    pub fn apply_sync(&mut self, outcome: SyncOutcome) -> bool {
        match outcome.replacement {
            Some(chain) => self.replace_chain(chain),
            None => false,
        }
    }

    /// Query every registered peer and adopt the longest valid chain.
    ///
    /// Keeps `&mut self` across the network calls; shared ledgers should call
    /// [`sync::resolve_conflicts`] without the lock and then [`Ledger::apply_sync`].
    pub async fn resolve_conflicts<S: ChainSource>(&mut self, source: &S) -> bool {
        let peers: Vec<String> = self.peers.iter().cloned().collect();
        let outcome =
            sync::resolve_conflicts(self.chain.len(), &peers, source, &self.difficulty).await;
        self.apply_sync(outcome)
    }
}
