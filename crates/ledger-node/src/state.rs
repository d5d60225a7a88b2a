use crate::http_source::HttpChainSource;
use ledger_core::{sync, Block, Ledger, LedgerError};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RwLock<Ledger>>,
    pub node_id: Arc<str>,
    pub peers: HttpChainSource,
    /// Bumped whenever the chain is replaced; an in-flight proof search for
    /// an older epoch is abandoned.
    chain_epoch: Arc<AtomicU64>,
    /// One proof search per node at a time.
    mining: Arc<Mutex<()>>,
    stats: Arc<SyncStats>,
}

#[derive(Debug, Default)]
struct SyncStats {
    runs: AtomicU64,
    replacements: AtomicU64,
    peer_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatsSnapshot {
    pub runs: u64,
    pub replacements: u64,
    pub peer_failures: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("chain was replaced while mining; proof abandoned")]
    Cancelled,
    #[error("proof search task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppState {
    pub fn new(ledger: Ledger, node_id: impl Into<Arc<str>>, peers: HttpChainSource) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            node_id: node_id.into(),
            peers,
            chain_epoch: Arc::new(AtomicU64::new(0)),
            mining: Arc::new(Mutex::new(())),
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub fn sync_stats(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            runs: self.stats.runs.load(Ordering::Relaxed),
            replacements: self.stats.replacements.load(Ordering::Relaxed),
            peer_failures: self.stats.peer_failures.load(Ordering::Relaxed),
        }
    }

    /// Reward this node, search for a proof off the async runtime and commit.
    ///
    /// The ledger lock is held only to snapshot the job and to commit it.
    pub async fn mine(&self) -> Result<Block, MineError> {
        let _guard = self.mining.lock().await;
        let (job, epoch) = {
            let mut ledger = self.ledger.write().await;
            (
                ledger.prepare_mining(&self.node_id),
                self.chain_epoch.load(Ordering::SeqCst),
            )
        };

        let search = tokio::task::spawn_blocking({
            let job = job.clone();
            let chain_epoch = self.chain_epoch.clone();
            move || job.search_until(|| chain_epoch.load(Ordering::SeqCst) != epoch)
        })
        .await;

        let mut ledger = self.ledger.write().await;
        let result = match search {
            Ok(Some(nonce)) => ledger.commit_mined(&job, nonce).map_err(MineError::from),
            Ok(None) => Err(MineError::Cancelled),
            Err(e) => Err(MineError::from(e)),
        };
        if let Err(err) = &result {
            warn!(%err, index = job.index, "mining abandoned");
            ledger.abandon_mining(&job);
        }
        result
    }

    /// One resolution pass against every registered peer.
    ///
    /// Peers are queried without holding the ledger lock; the replacement is
    /// applied afterwards under the write lock.
    pub async fn sync_once(&self) -> bool {
        let (local_len, peers, difficulty) = {
            let ledger = self.ledger.read().await;
            (
                ledger.chain_len(),
                ledger.peers().iter().cloned().collect::<Vec<_>>(),
                ledger.difficulty().clone(),
            )
        };
        let outcome = sync::resolve_conflicts(local_len, &peers, &self.peers, &difficulty).await;

        self.stats.runs.fetch_add(1, Ordering::Relaxed);
        self.stats
            .peer_failures
            .fetch_add(outcome.failures.len() as u64, Ordering::Relaxed);

        if !outcome.found_longer() {
            return false;
        }
        let mut ledger = self.ledger.write().await;
        let changed = ledger.apply_sync(outcome);
        if changed {
            self.chain_epoch.fetch_add(1, Ordering::SeqCst);
            self.stats.replacements.fetch_add(1, Ordering::Relaxed);
            info!(length = ledger.chain_len(), "chain replaced by peer chain");
        }
        changed
    }
}
