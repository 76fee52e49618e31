//! Deterministic smartnode reward payments.
//!
//! This library decides which smartnodes a block must pay, records what each
//! confirmed block paid, and answers the `winners`, `payments` and block
//! template queries from one consistent view of the chain:
//!
//! - [`PayeeRegistry`] tracks registered smartnodes and the heights they were paid at
//! - [`PaymentScheduler`] ranks eligible smartnodes by wait time and picks the payees
//! - [`PaymentHistoryStore`] keeps one [`PaymentRecord`] per height on the active chain
//! - [`QueryService`] reads an immutable snapshot of both
//!
//! [`PaymentEngine`] owns the state. The node feeds it through the
//! [`BlockListener`] seam; readers take snapshots.
//!
//! # Quick Start
//!
//! ```
//! use smartnode_payments::{
//!     BlockHash, Config, ConnectedBlock, MasternodeRegistration, PaymentEngine, PaymentsRequest,
//!     PayoutDestination, ProTxHash,
//! };
//!
//! let genesis = BlockHash::hash(b"genesis");
//! let engine = PaymentEngine::new(Config::regtest(), genesis)?;
//!
//! let registration = MasternodeRegistration::new(
//!     ProTxHash::hash(b"smartnode"),
//!     PayoutDestination::new("yPayee", vec![0x76, 0xa9]),
//! );
//! let block = ConnectedBlock::new(1, BlockHash::hash(b"block 1"), genesis)
//!     .with_registrations(vec![registration]);
//! engine.connect_block(block)?;
//!
//! let query = engine.query()?;
//! assert_eq!(query.payments(&PaymentsRequest::default())?[0].height, 1);
//! # Ok::<(), smartnode_payments::PaymentError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "serde")]
#[macro_use]
extern crate actual_serde as serde;

mod internal_macros;

pub mod amount;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod hash_types;
pub mod history;
pub mod logging;
pub mod network;
pub mod query;
pub mod record;
pub mod registry;
pub mod reward;
pub mod scheduler;
#[cfg(feature = "bincode")]
pub mod serialization;

pub use amount::{Amount, COIN};
pub use config::Config;
pub use engine::{BlockListener, ConnectedBlock, PaymentEngine, PaymentState};
pub use entry::{MasternodeEntry, MasternodeRegistration, PayoutDestination};
pub use error::{LoggingError, LoggingResult, PaymentError, PaymentResult};
pub use hash_types::{BlockHash, ProTxHash, ScoreHash};
pub use history::{BlockRef, PaymentHistoryStore};
pub use logging::{LogFileConfig, LoggingConfig, LoggingGuard, init_console_logging, init_logging};
pub use network::{Network, PaymentParams, RewardPercentage, SmartnodeShare};
pub use query::{BlockTemplatePayees, MasternodeCount, PaymentsRequest, QueryService, WinnersRequest};
pub use record::{MasternodePayment, PayeeOutput, PaymentRecord};
pub use registry::PayeeRegistry;
pub use scheduler::{PaymentScheduler, ProjectedPayment};

pub use tracing::level_filters::LevelFilter;
