//! Deterministic selection of the smartnodes paid by a block.

use std::collections::BTreeMap;

use crate::amount::Amount;
use crate::entry::MasternodeEntry;
use crate::error::{PaymentError, PaymentResult};
use crate::hash_types::{BlockHash, ProTxHash, ScoreHash};
use crate::network::PaymentParams;
use crate::record::{MasternodePayment, PayeeOutput};
use crate::registry::PayeeRegistry;
use crate::reward::{block_subsidy, payments_started, smartnode_payment};

/// Payees projected for a height that is not mined yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedPayment {
    pub height: u32,
    pub masternodes: Vec<MasternodePayment>,
}

/// Selects payees for upcoming blocks.
///
/// Entries are ranked by the height they were last paid at (or registered
/// at, if never paid), longest wait first. Ties are broken by
/// [`ScoreHash::create_score`] of the parent block hash and the entry's
/// registration hash, so the order can't be influenced by registration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentScheduler {
    params: PaymentParams,
    payees_per_block: usize,
}

impl PaymentScheduler {
    pub fn new(params: PaymentParams, payees_per_block: usize) -> Self {
        Self {
            params,
            payees_per_block: payees_per_block.max(1),
        }
    }

    pub fn params(&self) -> &PaymentParams {
        &self.params
    }

    pub fn payees_per_block(&self) -> usize {
        self.payees_per_block
    }

    /// Total reward going to smartnodes in the block at `height`.
    pub fn payment_amount(&self, height: u32) -> Amount {
        if !payments_started(height, &self.params) {
            return Amount::ZERO;
        }
        smartnode_payment(height, block_subsidy(height, &self.params), &self.params)
    }

    /// Orders `entries` by payment priority for a block built on `modifier`.
    pub fn rank<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a MasternodeEntry>,
        at_height: u32,
        modifier: BlockHash,
    ) -> Vec<&'a MasternodeEntry> {
        self.rank_with(entries, modifier, |entry| entry.payment_anchor_at(at_height))
    }

    /// Payees for the block at `height`, built on `prev_block_hash`.
    ///
    /// Pure function of the registry as of `height - 1`: calling it again
    /// before the block is connected gives the same answer.
    pub fn compute_next_payees(
        &self,
        registry: &PayeeRegistry,
        height: u32,
        prev_block_hash: BlockHash,
    ) -> PaymentResult<Vec<MasternodePayment>> {
        let parent_height = height.checked_sub(1).ok_or(PaymentError::UnknownHeight(height))?;
        let eligible = registry.eligible_for_block(parent_height, height)?;
        if !payments_started(height, &self.params) {
            return Ok(Vec::new());
        }
        let ranked = self.rank(eligible, parent_height, prev_block_hash);
        let selected: Vec<_> = ranked.into_iter().take(self.payees_per_block).collect();
        if selected.is_empty() {
            return Err(PaymentError::InsufficientEligiblePayees { height });
        }
        tracing::debug!(
            "Selected {} payee(s) for height {}, primary {}",
            selected.len(),
            height,
            selected[0].pro_tx_hash()
        );
        Ok(self.build_payments(height, &selected))
    }

    /// Projects payees for `tip_height + 1 ..= tip_height + depth`.
    ///
    /// The first projected height matches [`Self::compute_next_payees`].
    /// Later heights assume each projected winner gets paid and reuse the
    /// tip hash as tie-break modifier, so they are indicative only.
    /// Heights where nobody is eligible are skipped.
    pub fn project_payees(
        &self,
        registry: &PayeeRegistry,
        tip_height: u32,
        tip_hash: BlockHash,
        depth: u32,
    ) -> PaymentResult<Vec<ProjectedPayment>> {
        let mut simulated_paid: BTreeMap<ProTxHash, u32> = BTreeMap::new();
        let mut projections = Vec::new();
        for offset in 1..=depth {
            let height = tip_height.saturating_add(offset);
            if !payments_started(height, &self.params) {
                continue;
            }
            let eligible = registry.eligible_for_block(tip_height, height)?;
            let ranked = self.rank_with(eligible, tip_hash, |entry| {
                simulated_paid
                    .get(&entry.pro_tx_hash())
                    .copied()
                    .unwrap_or_else(|| entry.payment_anchor_at(tip_height))
            });
            let selected: Vec<_> = ranked.into_iter().take(self.payees_per_block).collect();
            if selected.is_empty() {
                continue;
            }
            for entry in &selected {
                simulated_paid.insert(entry.pro_tx_hash(), height);
            }
            projections.push(ProjectedPayment {
                height,
                masternodes: self.build_payments(height, &selected),
            });
        }
        Ok(projections)
    }

    fn rank_with<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a MasternodeEntry>,
        modifier: BlockHash,
        anchor: impl Fn(&MasternodeEntry) -> u32,
    ) -> Vec<&'a MasternodeEntry> {
        let mut keyed: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let key = (anchor(entry), ScoreHash::create_score(modifier, entry.pro_tx_hash()));
                (key, entry)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        keyed.into_iter().map(|(_, entry)| entry).collect()
    }

    fn build_payments(&self, height: u32, selected: &[&MasternodeEntry]) -> Vec<MasternodePayment> {
        let shares = self.payment_amount(height).split(selected.len());
        selected
            .iter()
            .zip(shares)
            .map(|(entry, share)| {
                let registration = &entry.registration;
                let mut payees = Vec::with_capacity(2);
                let operator = registration
                    .operator_payout
                    .as_ref()
                    .map(|destination| (destination, share.basis_points(registration.operator_reward)));
                let operator_amount = operator.map(|(_, amount)| amount).unwrap_or(Amount::ZERO);
                payees.push(PayeeOutput::new(&registration.owner_payout, share - operator_amount));
                if let Some((destination, amount)) = operator {
                    if amount > Amount::ZERO {
                        payees.push(PayeeOutput::new(destination, amount));
                    }
                }
                MasternodePayment {
                    pro_tx_hash: entry.pro_tx_hash(),
                    payees,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{MasternodeRegistration, PayoutDestination};
    use crate::network::Network;
    use assert_matches::assert_matches;

    fn registration(tag: &str) -> MasternodeRegistration {
        MasternodeRegistration::new(
            ProTxHash::hash(tag.as_bytes()),
            PayoutDestination::new(tag, tag.as_bytes().to_vec()),
        )
    }

    fn params() -> PaymentParams {
        let mut params = Network::Regtest.payment_params();
        params.payments_start_height = 1;
        params
    }

    /// Registry at `tip` with the given entries, registered at height 1, and
    /// their last paid heights.
    fn registry(tip: u32, entries: &[(&str, Option<u32>)]) -> PayeeRegistry {
        let mut registry = PayeeRegistry::new(1);
        let registrations: Vec<_> = entries.iter().map(|(tag, _)| registration(tag)).collect();
        registry.apply_changes(1, &registrations, &[]);
        for (tag, paid) in entries {
            if let Some(height) = paid {
                registry.record_payment(&ProTxHash::hash(tag.as_bytes()), *height).unwrap();
            }
        }
        registry.apply_changes(tip, &[], &[]);
        registry
    }

    fn primary(payments: &[MasternodePayment]) -> &str {
        &payments[0].payees[0].address
    }

    #[test]
    fn longest_wait_is_paid_first() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let mut registry = registry(20, &[("A", Some(10)), ("B", Some(5))]);
        let tip_hash = BlockHash::hash(b"tip20");

        let payments = scheduler.compute_next_payees(&registry, 21, tip_hash).unwrap();
        assert_eq!(primary(&payments), "B");

        registry.record_payment(&ProTxHash::hash(b"B"), 21).unwrap();
        registry.apply_changes(21, &[], &[]);
        assert_eq!(registry.get(&ProTxHash::hash(b"B")).unwrap().last_paid_height(), Some(21));

        let payments = scheduler.compute_next_payees(&registry, 22, BlockHash::hash(b"tip21")).unwrap();
        assert_eq!(primary(&payments), "A");
    }

    #[test]
    fn preview_is_idempotent() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let registry = registry(20, &[("A", None), ("B", None), ("C", None)]);
        let tip_hash = BlockHash::hash(b"tip20");
        let first = scheduler.compute_next_payees(&registry, 21, tip_hash).unwrap();
        let second = scheduler.compute_next_payees(&registry, 21, tip_hash).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ties_break_on_score_of_parent_hash() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let registry = registry(20, &[("A", Some(10)), ("B", Some(10))]);
        let modifier = BlockHash::hash(b"tip20");
        let payments = scheduler.compute_next_payees(&registry, 21, modifier).unwrap();

        let score_a = ScoreHash::create_score(modifier, ProTxHash::hash(b"A"));
        let score_b = ScoreHash::create_score(modifier, ProTxHash::hash(b"B"));
        let expected = if score_a < score_b { "A" } else { "B" };
        assert_eq!(primary(&payments), expected);
    }

    #[test]
    fn empty_registry_cannot_produce_payees() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let registry = registry(20, &[]);
        let err = scheduler.compute_next_payees(&registry, 21, BlockHash::hash(b"x")).unwrap_err();
        assert_matches!(err, PaymentError::InsufficientEligiblePayees { height: 21 });
        assert!(err.is_fatal());
    }

    #[test]
    fn no_payees_before_start_height() {
        let scheduler = PaymentScheduler::new(Network::Regtest.payment_params(), 1);
        let registry = registry(20, &[("A", None)]);
        assert!(scheduler.compute_next_payees(&registry, 21, BlockHash::hash(b"x")).unwrap().is_empty());
    }

    #[test]
    fn unknown_parent_height_is_rejected() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let registry = registry(20, &[("A", None)]);
        assert_matches!(
            scheduler.compute_next_payees(&registry, 23, BlockHash::hash(b"x")),
            Err(PaymentError::UnknownHeight(22))
        );
        assert_matches!(
            scheduler.compute_next_payees(&registry, 0, BlockHash::hash(b"x")),
            Err(PaymentError::UnknownHeight(0))
        );
    }

    #[test]
    fn multiple_payees_split_the_reward() {
        let scheduler = PaymentScheduler::new(params(), 2);
        let registry = registry(20, &[("A", Some(3)), ("B", Some(2)), ("C", Some(9))]);
        let payments = scheduler.compute_next_payees(&registry, 21, BlockHash::hash(b"x")).unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(primary(&payments), "B");
        assert_eq!(payments[1].payees[0].address, "A");
        let total: Amount = payments.iter().map(MasternodePayment::amount).sum();
        assert_eq!(total, scheduler.payment_amount(21));
    }

    #[test]
    fn operator_cut_follows_owner_output() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let mut registry = PayeeRegistry::new(1);
        let reg = registration("A").with_operator(PayoutDestination::new("OP", vec![0x52]), 2_500);
        registry.apply_changes(1, &[reg], &[]);
        registry.apply_changes(5, &[], &[]);

        let payments = scheduler.compute_next_payees(&registry, 6, BlockHash::hash(b"x")).unwrap();
        let payees = &payments[0].payees;
        let share = scheduler.payment_amount(6);
        assert_eq!(payees.len(), 2);
        assert_eq!(payees[0].address, "A");
        assert_eq!(payees[1].address, "OP");
        assert_eq!(payees[1].amount, share.basis_points(2_500));
        assert_eq!(payees[0].amount + payees[1].amount, share);
    }

    #[test]
    fn projection_starts_with_next_payee_and_rotates() {
        let scheduler = PaymentScheduler::new(params(), 1);
        let registry = registry(20, &[("A", Some(12)), ("B", Some(11)), ("C", Some(10))]);
        let tip_hash = BlockHash::hash(b"tip20");

        let next = scheduler.compute_next_payees(&registry, 21, tip_hash).unwrap();
        let projected = scheduler.project_payees(&registry, 20, tip_hash, 4).unwrap();
        assert_eq!(projected.len(), 4);
        assert_eq!(projected[0].height, 21);
        assert_eq!(projected[0].masternodes, next);
        let order: Vec<_> = projected.iter().map(|p| primary(&p.masternodes).to_string()).collect();
        assert_eq!(order, vec!["C", "B", "A", "C"]);
    }
}
