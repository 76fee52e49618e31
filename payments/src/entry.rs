//! Smartnode entries held by the payee registry.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentResult};
use crate::hash_types::ProTxHash;

/// Upper bound of `operator_reward`, in basis points.
pub const MAX_OPERATOR_REWARD: u16 = 10_000;

/// Where a reward output goes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct PayoutDestination {
    pub address: String,
    /// Output script bytes.
    pub script: Vec<u8>,
}

impl PayoutDestination {
    pub fn new(address: impl Into<String>, script: Vec<u8>) -> Self {
        Self {
            address: address.into(),
            script,
        }
    }
}

/// A registration as it appears in a connected block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct MasternodeRegistration {
    pub pro_tx_hash: ProTxHash,
    pub owner_payout: PayoutDestination,
    pub operator_payout: Option<PayoutDestination>,
    /// Operator cut of each payment, in basis points.
    pub operator_reward: u16,
}

impl MasternodeRegistration {
    pub fn new(pro_tx_hash: ProTxHash, owner_payout: PayoutDestination) -> Self {
        Self {
            pro_tx_hash,
            owner_payout,
            operator_payout: None,
            operator_reward: 0,
        }
    }

    pub fn with_operator(mut self, operator_payout: PayoutDestination, operator_reward: u16) -> Self {
        self.operator_payout = Some(operator_payout);
        self.operator_reward = operator_reward;
        self
    }

    pub fn validate(&self) -> PaymentResult<()> {
        if self.owner_payout.script.is_empty() {
            return Err(PaymentError::InvalidRegistration(format!(
                "{}: empty owner payout script",
                self.pro_tx_hash
            )));
        }
        if self.operator_reward > MAX_OPERATOR_REWARD {
            return Err(PaymentError::InvalidRegistration(format!(
                "{}: operator reward {} exceeds {}",
                self.pro_tx_hash, self.operator_reward, MAX_OPERATOR_REWARD
            )));
        }
        match &self.operator_payout {
            Some(operator) if operator.script.is_empty() => Err(PaymentError::InvalidRegistration(
                format!("{}: empty operator payout script", self.pro_tx_hash),
            )),
            None if self.operator_reward > 0 => Err(PaymentError::InvalidRegistration(format!(
                "{}: operator reward without operator payout",
                self.pro_tx_hash
            ))),
            _ => Ok(()),
        }
    }
}

/// A registered smartnode and its payment history on the active chain.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct MasternodeEntry {
    pub registration: MasternodeRegistration,
    pub registered_height: u32,
    pub deactivated_height: Option<u32>,
    /// Heights at which this entry was paid, ascending.
    pub(crate) paid_heights: Vec<u32>,
}

impl MasternodeEntry {
    pub fn new(registration: MasternodeRegistration, registered_height: u32) -> Self {
        Self {
            registration,
            registered_height,
            deactivated_height: None,
            paid_heights: Vec::new(),
        }
    }

    pub fn pro_tx_hash(&self) -> ProTxHash {
        self.registration.pro_tx_hash
    }

    pub fn last_paid_height(&self) -> Option<u32> {
        self.paid_heights.last().copied()
    }

    /// Last paid height as seen by the chain at `height`.
    pub fn last_paid_height_at(&self, height: u32) -> Option<u32> {
        let idx = self.paid_heights.partition_point(|&paid| paid <= height);
        idx.checked_sub(1).map(|i| self.paid_heights[i])
    }

    pub fn paid_heights(&self) -> &[u32] {
        &self.paid_heights
    }

    pub fn is_registered_at(&self, height: u32) -> bool {
        self.registered_height <= height
    }

    pub fn is_active_at(&self, height: u32) -> bool {
        self.is_registered_at(height) && self.deactivated_height.is_none_or(|deactivated| deactivated > height)
    }

    /// Height the wait time is measured from: last payment as of `height`,
    /// or the registration height for an entry never paid.
    pub fn payment_anchor_at(&self, height: u32) -> u32 {
        self.last_paid_height_at(height).unwrap_or(self.registered_height)
    }

    /// Drops every payment and deactivation above `height`.
    pub(crate) fn truncate_to(&mut self, height: u32) {
        let keep = self.paid_heights.partition_point(|&paid| paid <= height);
        self.paid_heights.truncate(keep);
        if self.deactivated_height.is_some_and(|deactivated| deactivated > height) {
            self.deactivated_height = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn registration(tag: &[u8]) -> MasternodeRegistration {
        MasternodeRegistration::new(
            ProTxHash::hash(tag),
            PayoutDestination::new("yOwner", vec![0x76, 0xa9, 0x14]),
        )
    }

    #[test]
    fn last_paid_height_is_height_aware() {
        let mut entry = MasternodeEntry::new(registration(b"a"), 3);
        entry.paid_heights = vec![5, 9, 14];
        assert_eq!(entry.last_paid_height(), Some(14));
        assert_eq!(entry.last_paid_height_at(4), None);
        assert_eq!(entry.last_paid_height_at(9), Some(9));
        assert_eq!(entry.last_paid_height_at(13), Some(9));
        assert_eq!(entry.payment_anchor_at(4), 3);
    }

    #[test]
    fn truncation_restores_earlier_state() {
        let mut entry = MasternodeEntry::new(registration(b"a"), 3);
        entry.paid_heights = vec![5, 9, 14];
        entry.deactivated_height = Some(12);
        entry.truncate_to(9);
        assert_eq!(entry.paid_heights(), &[5, 9]);
        assert_eq!(entry.deactivated_height, None);
        assert!(entry.is_active_at(20));
    }

    #[test]
    fn activity_respects_registration_and_deactivation() {
        let mut entry = MasternodeEntry::new(registration(b"a"), 10);
        entry.deactivated_height = Some(20);
        assert!(!entry.is_active_at(9));
        assert!(entry.is_active_at(10));
        assert!(entry.is_active_at(19));
        assert!(!entry.is_active_at(20));
    }

    #[test]
    fn registration_validation() {
        assert!(registration(b"a").validate().is_ok());

        let mut bad = registration(b"b");
        bad.owner_payout.script.clear();
        assert_matches!(bad.validate(), Err(PaymentError::InvalidRegistration(_)));

        let mut bad = registration(b"c");
        bad.operator_reward = 100;
        assert_matches!(bad.validate(), Err(PaymentError::InvalidRegistration(_)));

        let bad = registration(b"d").with_operator(PayoutDestination::new("yOp", vec![0x51]), 10_001);
        assert_matches!(bad.validate(), Err(PaymentError::InvalidRegistration(_)));

        let ok = registration(b"e").with_operator(PayoutDestination::new("yOp", vec![0x51]), 2_500);
        assert!(ok.validate().is_ok());
    }
}
