//! Identifier types used across the payment subsystem.

use crate::internal_macros::impl_hash_newtype;

impl_hash_newtype!(BlockHash, "Hash of a block on the active chain.");
impl_hash_newtype!(ProTxHash, "Registration transaction hash identifying a smartnode.");
impl_hash_newtype!(ScoreHash, "Per-block ranking score of a smartnode, used to break wait-time ties.");

impl ScoreHash {
    /// Score of `pro_tx_hash` for a block built on top of `modifier`.
    pub fn create_score(modifier: BlockHash, pro_tx_hash: ProTxHash) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(modifier.as_byte_array());
        hasher.update(pro_tx_hash.as_byte_array());
        Self(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_through_display() {
        let hash = BlockHash::hash(b"block");
        let parsed: BlockHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(hash.to_string().len(), 64);
        assert_eq!(hash.as_byte_array(), &hash.to_byte_array());
        assert_eq!(BlockHash::from_byte_array(*hash.as_byte_array()), hash);
    }

    #[test]
    fn rejects_short_hex() {
        assert!("abcd".parse::<ProTxHash>().is_err());
    }

    #[test]
    fn score_depends_on_modifier_and_identity() {
        let a = ProTxHash::hash(b"a");
        let b = ProTxHash::hash(b"b");
        let m1 = BlockHash::hash(b"m1");
        let m2 = BlockHash::hash(b"m2");
        assert_eq!(ScoreHash::create_score(m1, a), ScoreHash::create_score(m1, a));
        assert_ne!(ScoreHash::create_score(m1, a), ScoreHash::create_score(m1, b));
        assert_ne!(ScoreHash::create_score(m1, a), ScoreHash::create_score(m2, a));
    }
}
