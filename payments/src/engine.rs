//! Owner of the payment state: applies confirmations and rollbacks and
//! hands out immutable snapshots to readers.

use std::sync::{Arc, Mutex, RwLock};

use crate::config::Config;
use crate::entry::MasternodeRegistration;
use crate::error::{PaymentError, PaymentResult};
use crate::hash_types::{BlockHash, ProTxHash};
use crate::history::PaymentHistoryStore;
use crate::query::QueryService;
use crate::record::PaymentRecord;
use crate::registry::PayeeRegistry;
use crate::scheduler::PaymentScheduler;

/// A block that just became part of the active chain, together with the
/// registry changes it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedBlock {
    pub height: u32,
    pub block_hash: BlockHash,
    pub prev_block_hash: BlockHash,
    pub registrations: Vec<MasternodeRegistration>,
    pub deactivations: Vec<ProTxHash>,
}

impl ConnectedBlock {
    pub fn new(height: u32, block_hash: BlockHash, prev_block_hash: BlockHash) -> Self {
        Self {
            height,
            block_hash,
            prev_block_hash,
            registrations: Vec::new(),
            deactivations: Vec::new(),
        }
    }

    pub fn with_registrations(mut self, registrations: Vec<MasternodeRegistration>) -> Self {
        self.registrations = registrations;
        self
    }

    pub fn with_deactivations(mut self, deactivations: Vec<ProTxHash>) -> Self {
        self.deactivations = deactivations;
        self
    }
}

/// Receives chain notifications from the node, exactly once per change of
/// the active chain.
pub trait BlockListener: Send + Sync {
    fn block_connected(&self, block: ConnectedBlock) -> PaymentResult<()>;

    /// Every block above `fork_height` left the active chain.
    fn blocks_disconnected(&self, fork_height: u32) -> PaymentResult<()>;
}

/// Registry and history as of one chain tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentState {
    registry: PayeeRegistry,
    history: PaymentHistoryStore,
}

impl PaymentState {
    fn genesis(minimum_confirmations: u32, genesis_hash: BlockHash) -> Self {
        let mut registry = PayeeRegistry::new(minimum_confirmations);
        registry.apply_changes(0, &[], &[]);
        let mut history = PaymentHistoryStore::new();
        history.append(PaymentRecord {
            height: 0,
            block_hash: genesis_hash,
            masternodes: Vec::new(),
        });
        Self {
            registry,
            history,
        }
    }

    pub fn registry(&self) -> &PayeeRegistry {
        &self.registry
    }

    pub fn history(&self) -> &PaymentHistoryStore {
        &self.history
    }

    pub fn tip_height(&self) -> u32 {
        self.history.tip_height().unwrap_or_default()
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.history.tip().map(|record| record.block_hash).unwrap_or_default()
    }

    /// Builds the record for `block` without touching the state.
    ///
    /// Returns `None` when the block is already the active block at its height.
    fn prepare_connect(
        &self,
        scheduler: &PaymentScheduler,
        block: &ConnectedBlock,
    ) -> PaymentResult<Option<PaymentRecord>> {
        let tip_height = self.tip_height();
        if block.height <= tip_height {
            return match self.history.block_hash_at(block.height) {
                Some(existing) if existing == block.block_hash => Ok(None),
                Some(existing) => Err(PaymentError::DuplicateHeight {
                    height: block.height,
                    existing,
                    incoming: block.block_hash,
                }),
                None => Err(PaymentError::UnknownHeight(block.height)),
            };
        }
        if block.height != tip_height + 1 {
            return Err(PaymentError::NonContiguousHeight {
                expected: tip_height + 1,
                got: block.height,
            });
        }
        if block.prev_block_hash != self.tip_hash() {
            return Err(PaymentError::unknown_block(&block.prev_block_hash));
        }
        self.registry.validate_changes(block.height, &block.registrations, &block.deactivations)?;

        let masternodes = match scheduler.compute_next_payees(&self.registry, block.height, block.prev_block_hash) {
            Err(PaymentError::InsufficientEligiblePayees { height }) => {
                tracing::warn!("No eligible smartnode at height {}, recording block without payees", height);
                Vec::new()
            }
            result => result?,
        };
        let record = PaymentRecord {
            height: block.height,
            block_hash: block.block_hash,
            masternodes,
        };
        self.history.check_confirmed(&record)?;
        Ok(Some(record))
    }

    /// Applies a record built by [`Self::prepare_connect`]. Payments are
    /// recorded before the block's own registry changes.
    fn apply_connect(&mut self, block: &ConnectedBlock, record: PaymentRecord) -> Arc<PaymentRecord> {
        for masternode in &record.masternodes {
            self.registry.mark_paid(&masternode.pro_tx_hash, record.height);
        }
        self.registry.apply_changes(block.height, &block.registrations, &block.deactivations);
        self.history.append(record)
    }

    fn connect(&mut self, scheduler: &PaymentScheduler, block: &ConnectedBlock) -> PaymentResult<Arc<PaymentRecord>> {
        match self.prepare_connect(scheduler, block)? {
            Some(record) => Ok(self.apply_connect(block, record)),
            None => self
                .history
                .get(block.height)
                .cloned()
                .ok_or(PaymentError::UnknownHeight(block.height)),
        }
    }

    fn check_disconnect(&self, fork_height: u32, max_reorg_depth: u32) -> PaymentResult<u32> {
        let depth = self.tip_height().saturating_sub(fork_height);
        if depth > max_reorg_depth {
            return Err(PaymentError::ReorgTooDeep {
                depth,
                max: max_reorg_depth,
            });
        }
        Ok(depth)
    }

    fn disconnect(&mut self, fork_height: u32) -> Vec<Arc<PaymentRecord>> {
        let removed = self.history.invalidate_above(fork_height);
        self.registry.rollback_to(fork_height);
        removed
    }
}

/// Entry point of the payment subsystem.
///
/// Writers (block connection, rollback, reorganization) are serialized and
/// publish a new state atomically. Readers work on an `Arc` snapshot that
/// never changes underneath them.
pub struct PaymentEngine {
    config: Config,
    scheduler: PaymentScheduler,
    state: RwLock<Arc<PaymentState>>,
    writer: Mutex<()>,
}

impl PaymentEngine {
    /// Creates an engine whose chain starts at `genesis_hash`.
    pub fn new(config: Config, genesis_hash: BlockHash) -> PaymentResult<Self> {
        config.validate().map_err(PaymentError::Config)?;
        let params = config.payment_params();
        let state = PaymentState::genesis(params.minimum_confirmations, genesis_hash);
        let scheduler = PaymentScheduler::new(params, config.payees_per_block);
        tracing::info!("Payment engine initialized on {} at genesis {}", config.network, genesis_hash);
        Ok(Self {
            config,
            scheduler,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &PaymentScheduler {
        &self.scheduler
    }

    /// The current state. Later confirmations never alter it.
    pub fn snapshot(&self) -> PaymentResult<Arc<PaymentState>> {
        let guard = self.state.read().map_err(|_| PaymentError::LockPoisoned("state".to_string()))?;
        Ok(Arc::clone(&guard))
    }

    /// Query surface over the current snapshot.
    pub fn query(&self) -> PaymentResult<QueryService> {
        Ok(QueryService::new(self.snapshot()?, self.scheduler.clone(), &self.config))
    }

    /// Records the payees of a newly connected block.
    pub fn connect_block(&self, block: ConnectedBlock) -> PaymentResult<Arc<PaymentRecord>> {
        let _writer = self.writer.lock().map_err(|_| PaymentError::LockPoisoned("writer".to_string()))?;
        let prepared = self.snapshot()?.prepare_connect(&self.scheduler, &block)?;
        let Some(record) = prepared else {
            tracing::debug!("Block {} at height {} already connected", block.block_hash, block.height);
            return self
                .snapshot()?
                .history
                .get(block.height)
                .cloned()
                .ok_or(PaymentError::UnknownHeight(block.height));
        };

        let mut guard = self.state.write().map_err(|_| PaymentError::LockPoisoned("state".to_string()))?;
        let record = Arc::make_mut(&mut guard).apply_connect(&block, record);
        tracing::info!(
            "Connected block {} at height {} paying {} smartnode(s)",
            record.block_hash,
            record.height,
            record.masternodes.len()
        );
        Ok(record)
    }

    /// Drops every block above `fork_height` and reverts the registry to it.
    /// Returns the records that left the active chain.
    pub fn disconnect_to(&self, fork_height: u32) -> PaymentResult<Vec<Arc<PaymentRecord>>> {
        let _writer = self.writer.lock().map_err(|_| PaymentError::LockPoisoned("writer".to_string()))?;
        let depth = self.snapshot()?.check_disconnect(fork_height, self.config.max_reorg_depth)?;
        if depth == 0 {
            return Ok(Vec::new());
        }

        let mut guard = self.state.write().map_err(|_| PaymentError::LockPoisoned("state".to_string()))?;
        let removed = Arc::make_mut(&mut guard).disconnect(fork_height);
        tracing::warn!("Disconnected {} block(s) above height {}", removed.len(), fork_height);
        Ok(removed)
    }

    /// Replaces the chain above `fork_height` with `blocks` in one step.
    ///
    /// Readers observe either the old branch or the new one. On error the
    /// state is left untouched.
    pub fn reorganize(
        &self,
        fork_height: u32,
        blocks: &[ConnectedBlock],
    ) -> PaymentResult<Vec<Arc<PaymentRecord>>> {
        let _writer = self.writer.lock().map_err(|_| PaymentError::LockPoisoned("writer".to_string()))?;
        let current = self.snapshot()?;
        current.check_disconnect(fork_height, self.config.max_reorg_depth)?;

        let mut next = PaymentState::clone(&current);
        let removed = next.disconnect(fork_height);
        let connected = blocks
            .iter()
            .map(|block| next.connect(&self.scheduler, block))
            .collect::<PaymentResult<Vec<_>>>()?;

        let mut guard = self.state.write().map_err(|_| PaymentError::LockPoisoned("state".to_string()))?;
        *guard = Arc::new(next);
        tracing::warn!(
            "Reorganized above height {}: {} block(s) disconnected, {} connected",
            fork_height,
            removed.len(),
            connected.len()
        );
        Ok(connected)
    }
}

impl BlockListener for PaymentEngine {
    fn block_connected(&self, block: ConnectedBlock) -> PaymentResult<()> {
        self.connect_block(block).map(|_| ())
    }

    fn blocks_disconnected(&self, fork_height: u32) -> PaymentResult<()> {
        self.disconnect_to(fork_height).map(|_| ())
    }
}
