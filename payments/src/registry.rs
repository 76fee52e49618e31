//! The set of registered smartnodes and their payment state.

use std::collections::{BTreeMap, BTreeSet};

use crate::entry::{MasternodeEntry, MasternodeRegistration};
use crate::error::{PaymentError, PaymentResult};
use crate::hash_types::ProTxHash;

/// Registered smartnodes, keyed by registration hash.
///
/// The registry is height-aware: it answers eligibility and last-paid
/// queries for any height up to its tip, and can be rolled back to an
/// earlier height when blocks are disconnected.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct PayeeRegistry {
    entries: BTreeMap<ProTxHash, MasternodeEntry>,
    tip_height: Option<u32>,
    minimum_confirmations: u32,
}

impl PayeeRegistry {
    pub fn new(minimum_confirmations: u32) -> Self {
        Self {
            entries: BTreeMap::new(),
            tip_height: None,
            minimum_confirmations,
        }
    }

    pub fn tip_height(&self) -> Option<u32> {
        self.tip_height
    }

    pub fn minimum_confirmations(&self) -> u32 {
        self.minimum_confirmations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pro_tx_hash: &ProTxHash) -> Option<&MasternodeEntry> {
        self.entries.get(pro_tx_hash)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MasternodeEntry> {
        self.entries.values()
    }

    /// Number of entries active at the tip.
    pub fn active_count(&self) -> usize {
        match self.tip_height {
            Some(tip) => self.entries.values().filter(|entry| entry.is_active_at(tip)).count(),
            None => 0,
        }
    }

    /// Entries that may be paid by the block following `at_height`, ordered
    /// by registration hash.
    ///
    /// An entry qualifies when it is active as of `at_height` and its
    /// registration is buried under `minimum_confirmations` blocks by the
    /// time the next block is mined.
    pub fn eligible_payees(&self, at_height: u32) -> PaymentResult<Vec<&MasternodeEntry>> {
        self.eligible_for_block(at_height, at_height.saturating_add(1))
    }

    /// Entries, as of `at_height`, whose registration is confirmed enough to
    /// be paid in the block at `block_height`.
    pub(crate) fn eligible_for_block(
        &self,
        at_height: u32,
        block_height: u32,
    ) -> PaymentResult<Vec<&MasternodeEntry>> {
        match self.tip_height {
            Some(tip) if at_height <= tip => {}
            _ => return Err(PaymentError::UnknownHeight(at_height)),
        }
        Ok(self
            .entries
            .values()
            .filter(|entry| {
                entry.is_active_at(at_height)
                    && block_height >= entry.registered_height.saturating_add(self.minimum_confirmations)
            })
            .collect())
    }

    /// Marks `pro_tx_hash` as paid at `height`.
    pub fn record_payment(&mut self, pro_tx_hash: &ProTxHash, height: u32) -> PaymentResult<()> {
        let entry = self
            .entries
            .get_mut(pro_tx_hash)
            .ok_or_else(|| PaymentError::UnknownMasternode(pro_tx_hash.to_string()))?;
        if let Some(last) = entry.last_paid_height() {
            if height <= last {
                return Err(PaymentError::NonContiguousHeight {
                    expected: last + 1,
                    got: height,
                });
            }
        }
        entry.paid_heights.push(height);
        Ok(())
    }

    /// Marks an entry chosen by the scheduler as paid. The caller has
    /// already checked the entry exists and `height` is above its last payment.
    pub(crate) fn mark_paid(&mut self, pro_tx_hash: &ProTxHash, height: u32) {
        if let Some(entry) = self.entries.get_mut(pro_tx_hash) {
            entry.paid_heights.push(height);
        }
    }

    /// Checks that a block's registry changes can be applied at `height`.
    pub fn validate_changes(
        &self,
        height: u32,
        registrations: &[MasternodeRegistration],
        deactivations: &[ProTxHash],
    ) -> PaymentResult<()> {
        let mut seen = BTreeSet::new();
        for registration in registrations {
            registration.validate()?;
            if self.entries.contains_key(&registration.pro_tx_hash) || !seen.insert(registration.pro_tx_hash) {
                return Err(PaymentError::InvalidRegistration(format!(
                    "{}: already registered",
                    registration.pro_tx_hash
                )));
            }
        }
        for pro_tx_hash in deactivations {
            let entry = self
                .entries
                .get(pro_tx_hash)
                .ok_or_else(|| PaymentError::UnknownMasternode(pro_tx_hash.to_string()))?;
            if entry.deactivated_height.is_some() || entry.registered_height > height {
                return Err(PaymentError::InvalidRegistration(format!(
                    "{}: cannot deactivate at height {}",
                    pro_tx_hash, height
                )));
            }
        }
        Ok(())
    }

    /// Applies registrations and deactivations carried by the block at
    /// `height`, then advances the tip. Call [`Self::validate_changes`] first.
    pub fn apply_changes(
        &mut self,
        height: u32,
        registrations: &[MasternodeRegistration],
        deactivations: &[ProTxHash],
    ) {
        for registration in registrations {
            self.entries
                .insert(registration.pro_tx_hash, MasternodeEntry::new(registration.clone(), height));
        }
        for pro_tx_hash in deactivations {
            if let Some(entry) = self.entries.get_mut(pro_tx_hash) {
                entry.deactivated_height = Some(height);
            }
        }
        self.tip_height = Some(height);
    }

    /// Reverts every change made above `height`.
    pub fn rollback_to(&mut self, height: u32) {
        self.entries.retain(|_, entry| entry.registered_height <= height);
        for entry in self.entries.values_mut() {
            entry.truncate_to(height);
        }
        if self.tip_height.is_some_and(|tip| tip > height) {
            self.tip_height = Some(height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PayoutDestination;
    use assert_matches::assert_matches;

    fn registration(tag: &[u8]) -> MasternodeRegistration {
        MasternodeRegistration::new(
            ProTxHash::hash(tag),
            PayoutDestination::new(String::from_utf8_lossy(tag), vec![0x51]),
        )
    }

    fn registry_with(tags: &[&[u8]], height: u32, confirmations: u32) -> PayeeRegistry {
        let mut registry = PayeeRegistry::new(confirmations);
        let registrations: Vec<_> = tags.iter().map(|tag| registration(tag)).collect();
        registry.validate_changes(height, &registrations, &[]).unwrap();
        registry.apply_changes(height, &registrations, &[]);
        registry
    }

    #[test]
    fn unknown_height_beyond_tip() {
        let registry = PayeeRegistry::new(1);
        assert_matches!(registry.eligible_payees(0), Err(PaymentError::UnknownHeight(0)));

        let registry = registry_with(&[b"a"], 5, 1);
        assert_matches!(registry.eligible_payees(6), Err(PaymentError::UnknownHeight(6)));
        assert_eq!(registry.eligible_payees(5).unwrap().len(), 1);
    }

    #[test]
    fn confirmations_gate_eligibility() {
        let mut registry = registry_with(&[b"a"], 5, 3);
        assert!(registry.eligible_payees(5).unwrap().is_empty());
        registry.apply_changes(6, &[], &[]);
        assert!(registry.eligible_payees(6).unwrap().is_empty());
        registry.apply_changes(7, &[], &[]);
        assert_eq!(registry.eligible_payees(7).unwrap().len(), 1);
    }

    #[test]
    fn record_payment_is_monotonic() {
        let mut registry = registry_with(&[b"a"], 5, 1);
        let id = ProTxHash::hash(b"a");
        registry.record_payment(&id, 6).unwrap();
        assert_matches!(
            registry.record_payment(&id, 6),
            Err(PaymentError::NonContiguousHeight { expected: 7, got: 6 })
        );
        assert_matches!(
            registry.record_payment(&ProTxHash::hash(b"zz"), 7),
            Err(PaymentError::UnknownMasternode(_))
        );
        assert_eq!(registry.get(&id).unwrap().last_paid_height(), Some(6));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = registry_with(&[b"a"], 5, 1);
        assert_matches!(
            registry.validate_changes(6, &[registration(b"a")], &[]),
            Err(PaymentError::InvalidRegistration(_))
        );
        assert_matches!(
            registry.validate_changes(6, &[registration(b"b"), registration(b"b")], &[]),
            Err(PaymentError::InvalidRegistration(_))
        );
        assert_matches!(
            registry.validate_changes(6, &[], &[ProTxHash::hash(b"c")]),
            Err(PaymentError::UnknownMasternode(_))
        );
    }

    #[test]
    fn rollback_reverts_payments_registrations_and_deactivations() {
        let mut registry = registry_with(&[b"a", b"b"], 5, 1);
        let a = ProTxHash::hash(b"a");
        let b = ProTxHash::hash(b"b");
        registry.record_payment(&a, 6).unwrap();
        registry.apply_changes(6, &[], &[]);
        registry.record_payment(&b, 7).unwrap();
        registry.apply_changes(7, &[registration(b"c")], &[a]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.active_count(), 2);

        registry.rollback_to(6);
        assert_eq!(registry.tip_height(), Some(6));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&b).unwrap().last_paid_height(), None);
        assert_eq!(registry.get(&a).unwrap().last_paid_height(), Some(6));
        assert_eq!(registry.get(&a).unwrap().deactivated_height, None);
        assert_eq!(registry.active_count(), 2);
    }
}
