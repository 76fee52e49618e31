//! Error types for the smartnode payment subsystem.

use thiserror::Error;

use crate::hash_types::BlockHash;

/// Main error type for payee scheduling, history recording and queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Unknown height: {0}")]
    UnknownHeight(u32),

    #[error("Unknown block: {0}")]
    UnknownBlock(String),

    /// The active chain already holds a different record at this height.
    /// Resolvable by disconnecting the competing block first.
    #[error("Duplicate height {height}: active block {existing}, incoming block {incoming}")]
    DuplicateHeight {
        height: u32,
        existing: BlockHash,
        incoming: BlockHash,
    },

    /// No smartnode can be paid at this height. Blocks cannot be produced.
    #[error("Insufficient eligible payees at height {height}")]
    InsufficientEligiblePayees { height: u32 },

    #[error("Non-contiguous height: expected {expected}, got {got}")]
    NonContiguousHeight { expected: u32, got: u32 },

    #[error("Reorg depth {depth} exceeds maximum {max}")]
    ReorgTooDeep { depth: u32, max: u32 },

    #[error("Unknown smartnode: {0}")]
    UnknownMasternode(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Whether the error prevents block production altogether.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PaymentError::InsufficientEligiblePayees { .. })
    }

    pub(crate) fn unknown_block(block_hash: &BlockHash) -> Self {
        PaymentError::UnknownBlock(block_hash.to_string())
    }
}

/// Logging-related errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    #[error("Failed to open log file appender: {0}")]
    FileAppender(String),

    #[error("Subscriber initialization failed: {0}")]
    SubscriberInit(String),
}

/// Type alias for payment operation results.
pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

/// Type alias for logging operation results.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;
