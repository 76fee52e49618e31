//! Read-only projections over one payment state snapshot.
//!
//! `winners`, `payments` and the block template embedding all read the same
//! [`PaymentState`], so for a given snapshot they agree with each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::amount::Amount;
use crate::config::Config;
use crate::engine::PaymentState;
use crate::error::PaymentResult;
use crate::hash_types::BlockHash;
use crate::history::BlockRef;
use crate::network::Network;
use crate::record::{MasternodePayment, PayeeOutput, PaymentRecord};
use crate::reward::{block_subsidy, payments_started};
use crate::scheduler::PaymentScheduler;

/// Arguments of `smartnode winners`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WinnersRequest {
    /// Confirmed heights to report, ending at the tip. Defaults to the
    /// configured history depth.
    pub count: Option<u32>,
    /// Keep only winners whose address contains this substring.
    pub filter: Option<String>,
}

/// Arguments of `smartnode payments`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentsRequest {
    /// First block of the window. Defaults to the tip.
    pub start: Option<BlockRef>,
    /// Window length, negative to walk backward. Defaults to one record.
    pub count: Option<i64>,
}

impl PaymentsRequest {
    pub fn new(start: impl Into<BlockRef>) -> Self {
        Self {
            start: Some(start.into()),
            count: None,
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Smartnode outputs for the candidate block on top of the snapshot tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplatePayees {
    pub height: u32,
    pub previous_block_hash: BlockHash,
    pub masternodes: Vec<MasternodePayment>,
    pub payments_started: bool,
    /// Block subsidy of the candidate, before fees.
    pub block_value: Amount,
}

impl BlockTemplatePayees {
    /// Outputs in coinbase order.
    pub fn payees(&self) -> impl Iterator<Item = &PayeeOutput> {
        self.masternodes.iter().flat_map(|masternode| masternode.payees.iter())
    }

    pub fn total_amount(&self) -> Amount {
        self.masternodes.iter().map(MasternodePayment::amount).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MasternodeCount {
    pub total: usize,
    pub enabled: usize,
}

pub struct QueryService {
    state: Arc<PaymentState>,
    scheduler: PaymentScheduler,
    network: Network,
    history_depth: u32,
    projection_depth: u32,
}

impl QueryService {
    pub fn new(state: Arc<PaymentState>, scheduler: PaymentScheduler, config: &Config) -> Self {
        Self {
            state,
            scheduler,
            network: config.network,
            history_depth: config.winners_history_depth,
            projection_depth: config.winners_projection_depth,
        }
    }

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn tip_height(&self) -> u32 {
        self.state.tip_height()
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.state.tip_hash()
    }

    /// Primary payee address per height: recorded winners for the last
    /// `count` confirmed heights, then the scheduler's projection from tip + 1.
    pub fn winners(&self, request: &WinnersRequest) -> PaymentResult<BTreeMap<u32, String>> {
        let tip = self.tip_height();
        let count = request.count.unwrap_or(self.history_depth);
        let first = (tip + 1).saturating_sub(count);

        let mut winners = BTreeMap::new();
        for height in first..=tip {
            let payee = self.state.history().get(height).and_then(|record| record.primary_payee());
            if let Some(payee) = payee {
                winners.insert(height, payee.address.clone());
            }
        }

        let projections = self.scheduler.project_payees(
            self.state.registry(),
            tip,
            self.tip_hash(),
            self.projection_depth.max(1),
        )?;
        for projection in projections {
            if let Some(payee) = projection.masternodes.first().and_then(|masternode| masternode.payees.first()) {
                winners.insert(projection.height, payee.address.clone());
            }
        }

        if let Some(filter) = &request.filter {
            winners.retain(|_, address| address.contains(filter.as_str()));
        }
        Ok(winners)
    }

    /// Primary payee address at `height`, recorded or projected. `None` when
    /// nobody is paid there or `height` lies past the projection window.
    pub fn winner(&self, height: u32) -> PaymentResult<Option<String>> {
        let tip = self.tip_height();
        if height <= tip {
            let record = self.state.history().get(height);
            return Ok(record.and_then(|record| record.primary_payee()).map(|payee| payee.address.clone()));
        }
        if height == tip + 1 {
            let masternodes = self.scheduler.compute_next_payees(self.state.registry(), height, self.tip_hash())?;
            return Ok(primary_address(&masternodes));
        }
        let depth = height - tip;
        if depth > self.projection_depth.max(1) {
            return Ok(None);
        }
        let projections = self.scheduler.project_payees(self.state.registry(), tip, self.tip_hash(), depth)?;
        Ok(projections
            .iter()
            .find(|projection| projection.height == height)
            .and_then(|projection| primary_address(&projection.masternodes)))
    }

    /// Payment records around a block, see [`crate::PaymentHistoryStore::query_range`].
    pub fn payments(&self, request: &PaymentsRequest) -> PaymentResult<Vec<Arc<PaymentRecord>>> {
        let start = request.start.unwrap_or(BlockRef::Height(self.tip_height()));
        self.state.history().query_range(&start, request.count.unwrap_or(1))
    }

    /// Smartnode outputs the next block must carry.
    pub fn block_template_payees(&self) -> PaymentResult<BlockTemplatePayees> {
        let height = self.tip_height() + 1;
        let previous_block_hash = self.tip_hash();
        let masternodes = self.scheduler.compute_next_payees(self.state.registry(), height, previous_block_hash)?;
        let params = self.scheduler.params();
        Ok(BlockTemplatePayees {
            height,
            previous_block_hash,
            masternodes,
            payments_started: payments_started(height, params),
            block_value: block_subsidy(height, params),
        })
    }

    pub fn masternode_count(&self) -> MasternodeCount {
        let registry = self.state.registry();
        MasternodeCount {
            total: registry.len(),
            enabled: registry.active_count(),
        }
    }
}

fn primary_address(masternodes: &[MasternodePayment]) -> Option<String> {
    masternodes.first().and_then(|masternode| masternode.payees.first()).map(|payee| payee.address.clone())
}
