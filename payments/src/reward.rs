//! Block subsidy and the smartnode share of it.

use crate::amount::Amount;
use crate::network::{PaymentParams, SmartnodeShare};

/// Share increases past `payments_increase_height`, as (period offset, divisor).
/// Each step adds `block_value / divisor` once the height is strictly past
/// `payments_increase_height + offset * payments_increase_period`.
const PAYMENT_INCREASE_STEPS: [(u32, u64); 9] =
    [(0, 20), (1, 20), (2, 20), (3, 40), (4, 40), (5, 40), (6, 40), (7, 40), (9, 40)];

/// Whether the coinbase at `height` pays smartnodes.
pub fn payments_started(height: u32, params: &PaymentParams) -> bool {
    height >= params.payments_start_height
}

/// Subsidy for the block at `height`, halving every `subsidy_halving_interval` blocks.
pub fn block_subsidy(height: u32, params: &PaymentParams) -> Amount {
    if params.subsidy_halving_interval == 0 {
        return params.initial_block_subsidy;
    }
    let halvings = height / params.subsidy_halving_interval;
    if halvings >= 64 {
        return Amount::ZERO;
    }
    Amount::from_duffs(params.initial_block_subsidy.to_duffs() >> halvings)
}

/// Portion of `block_value` paid to smartnodes at `height`.
pub fn smartnode_payment(height: u32, block_value: Amount, params: &PaymentParams) -> Amount {
    match &params.smartnode_share {
        SmartnodeShare::Increasing => increasing_payment(height, block_value, params),
        SmartnodeShare::Table(table) => {
            let percentage = table.iter().find(|entry| height <= entry.height).map_or(0, |entry| entry.percentage);
            Amount::from_duffs(block_value.to_duffs() * u64::from(percentage) / 100)
        }
    }
}

/// Starts at 20% and steps up towards 50% as the chain passes the
/// increase schedule.
fn increasing_payment(height: u32, block_value: Amount, params: &PaymentParams) -> Amount {
    let value = block_value.to_duffs();
    let mut payment = value / 5;
    for (offset, divisor) in PAYMENT_INCREASE_STEPS {
        let step_height = params
            .payments_increase_height
            .saturating_add(params.payments_increase_period.saturating_mul(offset));
        if height > step_height {
            payment += value / divisor;
        }
    }
    Amount::from_duffs(payment)
}
