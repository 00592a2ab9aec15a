//! Abstract interfaces of the embedding node.
//!
//! The Template Provider never touches chainstate, mempool or block
//! assembly directly; the node passes capabilities implementing these
//! traits into the constructor. All of them are read-only from the
//! provider's perspective except [`ChainstateManager::process_new_block`].

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use bitcoin::{Block, BlockHash, FeeRate, Weight};

/// Maximum consensus block weight, in weight units.
pub const MAX_BLOCK_WEIGHT: Weight = Weight::MAX_BLOCK;

/// Minimum feerate for transactions included in assembled templates,
/// matching the node's default block-assembly policy.
pub const DEFAULT_BLOCK_MIN_TX_FEE_RATE: FeeRate = FeeRate::from_sat_per_vb_unchecked(1);

/// Validation-facing capabilities of the node.
pub trait ChainstateManager: Send + Sync {
    /// Whether the node is still in initial block download. Templates are
    /// not served during IBD.
    fn is_initial_block_download(&self) -> bool;

    /// Hands a reconstituted solution block to validation, with forced
    /// processing and proof-of-work assumed checked, mirroring how a node
    /// treats blocks it produced templates for.
    fn process_new_block(&self, block: Block) -> bool;
}

/// Mempool-facing capabilities of the node.
pub trait Mempool: Send + Sync {
    /// A monotonic counter bumped on every mempool add/remove. Used to
    /// decide whether a timer tick warrants rebuilding a template.
    fn transactions_updated(&self) -> u64;
}

/// Parameters for one block-assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAssemblerOptions {
    /// Maximum weight of the assembled block. Reduced below the consensus
    /// maximum by the client's coinbase output reserve.
    pub block_max_weight: Weight,
    /// Minimum feerate for included transactions.
    pub block_min_fee_rate: FeeRate,
}

/// A candidate block with the per-transaction fees of its assembly run.
///
/// The block is immutable once produced; solution submission builds a new
/// block from it rather than mutating the cached one.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    /// Fee of each transaction in `block` order, in satoshis. The coinbase
    /// entry is negative, as block assembly reports it.
    pub tx_fees: Vec<i64>,
}

impl BlockTemplate {
    /// Total fees of the template, skipping the negative coinbase entry.
    pub fn total_fees(&self) -> i64 {
        self.tx_fees.iter().filter(|fee| **fee >= 0).sum()
    }
}

#[derive(Debug)]
pub struct BlockAssemblyError(pub String);

impl std::fmt::Display for BlockAssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block assembly failed: {}", self.0)
    }
}

impl std::error::Error for BlockAssemblyError {}

/// Block-assembly capability of the node.
pub trait BlockAssembler: Send + Sync {
    /// Builds a candidate block from the current chain tip and mempool
    /// under the given limits, with a placeholder coinbase script.
    fn create_new_block(
        &self,
        options: BlockAssemblerOptions,
    ) -> Result<BlockTemplate, BlockAssemblyError>;
}

/// Chain-tip observation capability.
///
/// The node signals every tip change through [`TipWatcher::notify`]; the
/// provider's worker thread performs a bounded wait per loop iteration, so
/// a tip change is observed within one iteration. Observation is
/// linearizable with updates through the internal mutex.
#[derive(Debug, Default)]
pub struct TipWatcher {
    best_block: Mutex<Option<BlockHash>>,
    cv: Condvar,
}

impl TipWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new chain tip and wakes the worker thread.
    pub fn notify(&self, hash: BlockHash) {
        let mut best_block = match self.best_block.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *best_block = Some(hash);
        self.cv.notify_all();
    }

    /// Waits up to `timeout` for a tip notification and returns the
    /// current tip, or `None` while the node has not announced one yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BlockHash> {
        let best_block = match self.best_block.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.cv.wait_timeout(best_block, timeout) {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }

    /// The current tip without waiting.
    pub fn current(&self) -> Option<BlockHash> {
        match self.best_block.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::hashes::Hash;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn tip_watcher_wakes_on_notify() {
        let watcher = Arc::new(TipWatcher::new());
        assert_eq!(watcher.wait_timeout(Duration::from_millis(10)), None);

        let hash = BlockHash::from_byte_array([7; 32]);
        let watcher2 = watcher.clone();
        let waiter = std::thread::spawn(move || {
            let start = Instant::now();
            let tip = watcher2.wait_timeout(Duration::from_secs(5));
            (tip, start.elapsed())
        });
        std::thread::sleep(Duration::from_millis(50));
        watcher.notify(hash);
        let (tip, waited) = waiter.join().unwrap();
        assert_eq!(tip, Some(hash));
        assert!(waited < Duration::from_secs(4));
        assert_eq!(watcher.current(), Some(hash));
    }

    #[test]
    fn template_fees_skip_coinbase() {
        let template = BlockTemplate {
            block: Block {
                header: bitcoin::block::Header {
                    version: bitcoin::block::Version::from_consensus(0x2000_0000),
                    prev_blockhash: BlockHash::from_byte_array([0; 32]),
                    merkle_root: bitcoin::TxMerkleNode::from_byte_array([0; 32]),
                    time: 0,
                    bits: bitcoin::CompactTarget::from_consensus(0x1d00_ffff),
                    nonce: 0,
                },
                txdata: vec![],
            },
            tx_fees: vec![-1, 500, 700],
        };
        assert_eq!(template.total_fees(), 1200);
    }
}
