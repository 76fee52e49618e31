//! Confirmed and projected payment records.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::entry::PayoutDestination;
use crate::hash_types::{BlockHash, ProTxHash};

/// A single reward output.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct PayeeOutput {
    pub address: String,
    pub script: Vec<u8>,
    pub amount: Amount,
}

impl PayeeOutput {
    pub fn new(destination: &PayoutDestination, amount: Amount) -> Self {
        Self {
            address: destination.address.clone(),
            script: destination.script.clone(),
            amount,
        }
    }
}

/// The outputs paying one smartnode in a block. Owner output first, then
/// the operator output when the operator takes a cut.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct MasternodePayment {
    pub pro_tx_hash: ProTxHash,
    pub payees: Vec<PayeeOutput>,
}

impl MasternodePayment {
    pub fn amount(&self) -> Amount {
        self.payees.iter().map(|payee| payee.amount).sum()
    }
}

/// Who was paid by the block at `height`. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct PaymentRecord {
    pub height: u32,
    pub block_hash: BlockHash,
    pub masternodes: Vec<MasternodePayment>,
}

impl PaymentRecord {
    pub fn total_amount(&self) -> Amount {
        self.masternodes.iter().map(MasternodePayment::amount).sum()
    }

    /// The first output of the first paid smartnode.
    pub fn primary_payee(&self) -> Option<&PayeeOutput> {
        self.masternodes.first().and_then(|masternode| masternode.payees.first())
    }

    /// All outputs in coinbase order.
    pub fn outputs(&self) -> impl Iterator<Item = &PayeeOutput> {
        self.masternodes.iter().flat_map(|masternode| masternode.payees.iter())
    }
}
