//! Append-only history of confirmed payment records.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PaymentError, PaymentResult};
use crate::hash_types::BlockHash;
use crate::record::PaymentRecord;

/// Number of superseded records kept after reorganizations.
const MAX_ORPHANED_RECORDS: usize = 1000;

/// A block on the active chain, by hash or by height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRef {
    Hash(BlockHash),
    Height(u32),
}

impl From<BlockHash> for BlockRef {
    fn from(block_hash: BlockHash) -> Self {
        BlockRef::Hash(block_hash)
    }
}

impl From<u32> for BlockRef {
    fn from(height: u32) -> Self {
        BlockRef::Height(height)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRef::Hash(block_hash) => write!(f, "{}", block_hash),
            BlockRef::Height(height) => write!(f, "{}", height),
        }
    }
}

impl FromStr for BlockRef {
    type Err = PaymentError;

    /// Accepts a 64 character hex block hash or a decimal height.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == BlockHash::LEN * 2 {
            return s
                .parse::<BlockHash>()
                .map(BlockRef::Hash)
                .map_err(|_| PaymentError::UnknownBlock(s.to_string()));
        }
        s.parse::<u32>().map(BlockRef::Height).map_err(|_| PaymentError::UnknownBlock(s.to_string()))
    }
}

/// Payment records of the active chain, one per height, plus the records
/// superseded by reorganizations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentHistoryStore {
    records: BTreeMap<u32, Arc<PaymentRecord>>,
    heights: HashMap<BlockHash, u32>,
    orphaned: VecDeque<Arc<PaymentRecord>>,
}

impl PaymentHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn tip(&self) -> Option<&Arc<PaymentRecord>> {
        self.records.last_key_value().map(|(_, record)| record)
    }

    pub fn tip_height(&self) -> Option<u32> {
        self.records.last_key_value().map(|(height, _)| *height)
    }

    pub fn get(&self, height: u32) -> Option<&Arc<PaymentRecord>> {
        self.records.get(&height)
    }

    pub fn block_hash_at(&self, height: u32) -> Option<BlockHash> {
        self.records.get(&height).map(|record| record.block_hash)
    }

    pub fn height_of(&self, block_hash: &BlockHash) -> Option<u32> {
        self.heights.get(block_hash).copied()
    }

    /// Records superseded by reorganizations, oldest first.
    pub fn orphaned(&self) -> impl Iterator<Item = &Arc<PaymentRecord>> {
        self.orphaned.iter()
    }

    /// Resolves a block reference against the active chain.
    pub fn resolve(&self, block: &BlockRef) -> PaymentResult<u32> {
        match block {
            BlockRef::Hash(block_hash) => {
                self.height_of(block_hash).ok_or_else(|| PaymentError::unknown_block(block_hash))
            }
            BlockRef::Height(height) if self.records.contains_key(height) => Ok(*height),
            BlockRef::Height(height) => Err(PaymentError::UnknownBlock(height.to_string())),
        }
    }

    /// Checks whether `record` may be appended.
    ///
    /// Returns `Ok(true)` when the identical record is already active, in
    /// which case recording is a no-op.
    pub fn check_confirmed(&self, record: &PaymentRecord) -> PaymentResult<bool> {
        if let Some(existing) = self.records.get(&record.height) {
            if existing.as_ref() == record {
                return Ok(true);
            }
            return Err(PaymentError::DuplicateHeight {
                height: record.height,
                existing: existing.block_hash,
                incoming: record.block_hash,
            });
        }
        if let Some(tip) = self.tip_height() {
            let expected = tip + 1;
            if record.height != expected {
                return Err(PaymentError::NonContiguousHeight {
                    expected,
                    got: record.height,
                });
            }
        }
        Ok(false)
    }

    /// Appends the record of a newly confirmed block.
    pub fn record_confirmed(&mut self, record: PaymentRecord) -> PaymentResult<Arc<PaymentRecord>> {
        if self.check_confirmed(&record)? {
            return Ok(Arc::clone(&self.records[&record.height]));
        }
        Ok(self.append(record))
    }

    /// Appends a record already accepted by [`Self::check_confirmed`].
    pub(crate) fn append(&mut self, record: PaymentRecord) -> Arc<PaymentRecord> {
        let record = Arc::new(record);
        self.heights.insert(record.block_hash, record.height);
        self.records.insert(record.height, Arc::clone(&record));
        record
    }

    /// Removes every record above `height` from the active chain and keeps
    /// them as orphaned. Returns the removed records, ascending.
    pub fn invalidate_above(&mut self, height: u32) -> Vec<Arc<PaymentRecord>> {
        let Some(first_removed) = height.checked_add(1) else {
            return Vec::new();
        };
        let removed: Vec<_> = self.records.split_off(&first_removed).into_values().collect();
        for record in &removed {
            self.heights.remove(&record.block_hash);
            self.orphaned.push_back(Arc::clone(record));
        }
        while self.orphaned.len() > MAX_ORPHANED_RECORDS {
            self.orphaned.pop_front();
        }
        removed
    }

    /// Consecutive records around `start`.
    ///
    /// A positive `count` walks forward from `start` (inclusive), a negative
    /// `count` walks backward and returns the window ascending with `start`
    /// last. Windows are capped by the records available; zero yields nothing.
    pub fn query_range(&self, start: &BlockRef, count: i64) -> PaymentResult<Vec<Arc<PaymentRecord>>> {
        let start = self.resolve(start)?;
        let wanted = count.unsigned_abs() as usize;
        let records = if count > 0 {
            self.records.range(start..).take(wanted).map(|(_, record)| Arc::clone(record)).collect()
        } else {
            let mut window: Vec<_> =
                self.records.range(..=start).rev().take(wanted).map(|(_, record)| Arc::clone(record)).collect();
            window.reverse();
            window
        };
        Ok(records)
    }
}
