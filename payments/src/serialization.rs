//! Binary encoding of confirmed records and registry state for persistence.

use crate::error::{PaymentError, PaymentResult};
use crate::record::PaymentRecord;
use crate::registry::PayeeRegistry;

impl PaymentRecord {
    /// Serialize record to bytes
    pub fn to_bytes(&self) -> PaymentResult<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PaymentError::Serialization(e.to_string()))
    }

    /// Deserialize record from bytes
    pub fn from_bytes(data: &[u8]) -> PaymentResult<Self> {
        bincode::decode_from_slice(data, bincode::config::standard())
            .map(|(record, _)| record)
            .map_err(|e| PaymentError::Serialization(e.to_string()))
    }
}

impl PayeeRegistry {
    /// Serialize registry to bytes, including every entry's paid heights.
    pub fn to_bytes(&self) -> PaymentResult<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PaymentError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> PaymentResult<Self> {
        bincode::decode_from_slice(data, bincode::config::standard())
            .map(|(registry, _)| registry)
            .map_err(|e| PaymentError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::entry::{MasternodeRegistration, PayoutDestination};
    use crate::hash_types::{BlockHash, ProTxHash};
    use crate::record::{MasternodePayment, PayeeOutput};
    use assert_matches::assert_matches;

    fn registration(tag: &str) -> MasternodeRegistration {
        MasternodeRegistration::new(
            ProTxHash::hash(tag.as_bytes()),
            PayoutDestination::new(tag, vec![0x76, 0xa9, 0x14]),
        )
    }

    #[test]
    fn record_survives_persistence() {
        let owner = PayoutDestination::new("owner", vec![0x51]);
        let operator = PayoutDestination::new("operator", vec![0x52]);
        let record = PaymentRecord {
            height: 240,
            block_hash: BlockHash::hash(b"240"),
            masternodes: vec![MasternodePayment {
                pro_tx_hash: ProTxHash::hash(b"A"),
                payees: vec![
                    PayeeOutput::new(&owner, Amount::from_coins(9)),
                    PayeeOutput::new(&operator, Amount::from_coins(1)),
                ],
            }],
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(PaymentRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn registry_keeps_paid_heights_and_rollback_state() {
        let mut registry = PayeeRegistry::new(1);
        let operated = registration("B").with_operator(PayoutDestination::new("op", vec![0x52]), 500);
        registry.apply_changes(1, &[registration("A"), operated], &[]);
        registry.record_payment(&ProTxHash::hash(b"A"), 2).unwrap();
        registry.apply_changes(2, &[], &[ProTxHash::hash(b"B")]);

        let mut restored = PayeeRegistry::from_bytes(&registry.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, registry);
        assert_eq!(restored.active_count(), 1);

        restored.rollback_to(1);
        assert_eq!(restored.active_count(), 2);
        assert_eq!(restored.get(&ProTxHash::hash(b"A")).unwrap().last_paid_height(), None);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let record = PaymentRecord {
            height: 7,
            block_hash: BlockHash::hash(b"7"),
            masternodes: Vec::new(),
        };
        let bytes = record.to_bytes().unwrap();
        assert_matches!(PaymentRecord::from_bytes(&bytes[..10]), Err(PaymentError::Serialization(_)));
    }
}
