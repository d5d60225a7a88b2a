use ledger_core::{
    pow, validate, Block, ChainResponse, ChainSource, Difficulty, Ledger, PeerError, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Several ledgers living in one process, reachable by `host:port`.
#[derive(Clone, Default)]
struct Network {
    nodes: HashMap<String, Arc<RwLock<Ledger>>>,
    /// Chains served verbatim instead of a node's own, e.g. forged ones.
    overrides: HashMap<String, Vec<Block>>,
}

impl Network {
    fn join(&mut self, addr: &str, ledger: Ledger) -> Arc<RwLock<Ledger>> {
        let shared = Arc::new(RwLock::new(ledger));
        self.nodes.insert(addr.to_string(), shared.clone());
        shared
    }
}

impl ChainSource for Network {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, PeerError> {
        if let Some(chain) = self.overrides.get(peer) {
            return Ok(ChainResponse::new(chain.clone()));
        }
        match self.nodes.get(peer) {
            Some(node) => Ok(ChainResponse::new(node.read().await.chain().to_vec())),
            None => Err(PeerError::Unreachable {
                peer: peer.to_string(),
                reason: "no route to host".into(),
            }),
        }
    }
}

fn difficulty() -> Difficulty {
    Difficulty::zeros(2)
}

fn extend(ledger: &mut Ledger, blocks: usize, miner: &str) {
    for _ in 0..blocks {
        ledger.mine(miner);
    }
}

#[test]
fn appended_chain_with_found_nonces_is_valid() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ledger = Ledger::with_difficulty(difficulty());
    for _ in 0..6 {
        for _ in 0..rng.gen_range(0..5) {
            let amount = rng.gen_range(-10.0..100.0);
            ledger.add_transaction(format!("user-{}", rng.gen_range(0..4)), "shop", amount);
        }
        let prev = ledger.last_block().hash();
        let index = ledger.chain_len() as u64;
        let nonce = pow::find_nonce(index, &prev, ledger.pending(), ledger.difficulty());
        ledger.append_block(nonce, prev);
        assert!(ledger.is_valid());
    }
    assert_eq!(ledger.chain_len(), 7);
}

#[test]
fn every_field_mutation_invalidates_chain() {
    let mut ledger = Ledger::with_difficulty(difficulty());
    ledger.add_transaction("a", "b", 4.0);
    extend(&mut ledger, 3, "m");
    let chain = ledger.chain();

    for position in 1..chain.len() {
        let mut c = chain.to_vec();
        c[position].transactions.push(Transaction::new("x", "y", 1.0));
        assert!(!validate::is_valid(&c, &difficulty()), "txs at {position}");

        let mut c = chain.to_vec();
        c[position].nonce = c[position].nonce.wrapping_add(1);
        assert!(!validate::is_valid(&c, &difficulty()), "nonce at {position}");

        let mut c = chain.to_vec();
        c[position].hash_of_previous_block = "f".repeat(64);
        assert!(!validate::is_valid(&c, &difficulty()), "prev hash at {position}");
    }
}

/// Timestamps whose shortest decimal form is hard to read back exactly.
fn awkward_timestamp(i: usize) -> f64 {
    1_760_691_235.610_702_3 + i as f64 * 0.731_000_000_1
}

/// A chain built block by block with fixed timestamps and fractional amounts.
fn chain_with_fixed_timestamps(blocks: usize) -> Vec<Block> {
    let mut genesis = Ledger::with_difficulty(difficulty()).chain()[0].clone();
    genesis.timestamp = awkward_timestamp(0);
    let mut chain = vec![genesis];
    for i in 1..=blocks {
        let prev_hash = chain[i - 1].hash();
        let transactions = vec![
            Transaction::new("alice", "bob", 0.1 * i as f64 + 0.2),
            Transaction::new("0", "miner", 1.0),
        ];
        let nonce = pow::find_nonce(i as u64, &prev_hash, &transactions, &difficulty());
        chain.push(Block {
            index: i as u64,
            timestamp: awkward_timestamp(i),
            transactions,
            nonce,
            hash_of_previous_block: prev_hash,
        });
    }
    chain
}

#[test]
fn chain_survives_json_transfer() {
    let chain = chain_with_fixed_timestamps(24);
    assert!(validate::is_valid(&chain, &difficulty()));

    let wire = serde_json::to_string(&ChainResponse::new(chain.clone())).unwrap();
    let received: ChainResponse = serde_json::from_str(&wire).unwrap();
    assert_eq!(received.length, 25);
    assert_eq!(received.chain, chain);
    for (sent, got) in chain.iter().zip(&received.chain) {
        assert_eq!(sent.timestamp.to_bits(), got.timestamp.to_bits());
        assert_eq!(sent.hash(), got.hash());
    }
    assert_eq!(validate::validate(&received.chain, &difficulty()), Ok(()));
}

#[test]
fn mined_chain_survives_json_transfer() {
    let mut ledger = Ledger::with_difficulty(difficulty());
    for i in 0..20 {
        ledger.add_transaction("alice", "bob", i as f64 / 3.0);
        ledger.mine("miner");
    }
    let wire = serde_json::to_vec(&ChainResponse::new(ledger.chain().to_vec())).unwrap();
    let received: ChainResponse = serde_json::from_slice(&wire).unwrap();
    assert!(validate::is_valid(&received.chain, ledger.difficulty()));
}

#[tokio::test]
async fn adopts_longest_valid_chain_over_longer_forgery() {
    let mut network = Network::default();
    let base = Ledger::with_difficulty(difficulty());

    let mut a = base.clone();
    extend(&mut a, 4, "a");
    assert_eq!(a.chain_len(), 5);

    let mut b = base.clone();
    extend(&mut b, 7, "b");
    let mut forged = b.chain().to_vec();
    forged[3].transactions[0].amount = 1_000.0;
    assert_eq!(forged.len(), 8);

    let mut local = base.clone();
    extend(&mut local, 2, "local");
    local.add_node("http://a:5000").unwrap();
    local.add_node("http://b:5000/").unwrap();

    network.join("a:5000", a.clone());
    network.join("b:5000", b);
    network.overrides.insert("b:5000".into(), forged);

    assert!(local.resolve_conflicts(&network).await);
    assert_eq!(local.chain(), a.chain());
    assert_eq!(local.chain_len(), 5);
}

#[tokio::test]
async fn shorter_or_equal_peers_leave_chain_alone() {
    let mut network = Network::default();
    let base = Ledger::with_difficulty(difficulty());

    let mut local = base.clone();
    extend(&mut local, 3, "local");
    let mut equal = base.clone();
    extend(&mut equal, 3, "equal");
    let mut shorter = base.clone();
    extend(&mut shorter, 1, "short");

    network.join("equal:1", equal);
    network.join("short:1", shorter);
    for peer in ["http://equal:1", "http://short:1", "http://gone:1"] {
        local.add_node(peer).unwrap();
    }

    let before = local.chain().to_vec();
    assert!(!local.resolve_conflicts(&network).await);
    assert_eq!(local.chain(), &before[..]);
}

#[tokio::test]
async fn nodes_converge_without_holding_locks_during_sync() {
    let mut network = Network::default();
    let genesis = Ledger::with_difficulty(difficulty());
    let n1 = network.join("n1:1", genesis.clone());
    let n2 = network.join("n2:1", genesis.clone());
    let n3 = network.join("n3:1", genesis);

    for (node, peers) in [(&n1, ["n2", "n3"]), (&n2, ["n1", "n3"]), (&n3, ["n1", "n2"])] {
        let mut ledger = node.write().await;
        for peer in peers {
            ledger.add_node(&format!("http://{peer}:1")).unwrap();
        }
    }

    // n2 mines the most through the split prepare/search/commit flow.
    for _ in 0..3 {
        let job = n2.write().await.prepare_mining("n2");
        let nonce = tokio::task::spawn_blocking({
            let job = job.clone();
            move || job.search()
        })
        .await
        .unwrap();
        n2.write().await.commit_mined(&job, nonce).unwrap();
    }
    n1.write().await.mine("n1");

    for node in [&n1, &n3] {
        let (len, peers, difficulty) = {
            let ledger = node.read().await;
            let peers: Vec<String> = ledger.peers().iter().cloned().collect();
            (ledger.chain_len(), peers, ledger.difficulty().clone())
        };
        let outcome = ledger_core::sync::resolve_conflicts(len, &peers, &network, &difficulty).await;
        assert!(outcome.failures.is_empty());
        assert!(node.write().await.apply_sync(outcome));
    }

    let reference = n2.read().await.chain().to_vec();
    assert_eq!(reference.len(), 4);
    assert_eq!(n1.read().await.chain(), &reference[..]);
    assert_eq!(n3.read().await.chain(), &reference[..]);
}
