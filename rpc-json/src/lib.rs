//! # Smartnode payment RPC JSON types
//!
//! Result and argument structs for the `smartnode winners`, `smartnode
//! payments`, `smartnode count`, `getblocktemplate` and `getblockchaininfo`
//! commands, with conversions from the payment engine's types.

pub extern crate smartnode_payments;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::{DisplayFromStr, serde_as};

use smartnode_payments::{
    Amount, BlockHash, BlockRef, BlockTemplatePayees, MasternodeCount, MasternodePayment, PayeeOutput,
    PaymentError, PaymentRecord, PaymentsRequest, ProTxHash, WinnersRequest,
};

/// Error codes returned by the node, as in its `protocol.h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum RpcErrorCode {
    MiscError = -1,
    InvalidAddressOrKey = -5,
    InvalidParameter = -8,
    MethodNotFound = -32601,
    InternalError = -32603,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code:?})")]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParameter, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(RpcErrorCode::MethodNotFound, format!("Method not found: {}", method))
    }
}

impl From<PaymentError> for RpcError {
    fn from(err: PaymentError) -> Self {
        match &err {
            PaymentError::UnknownBlock(_) | PaymentError::UnknownHeight(_) => {
                Self::new(RpcErrorCode::InvalidAddressOrKey, format!("Block not found: {}", err))
            }
            PaymentError::InsufficientEligiblePayees { .. } | PaymentError::LockPoisoned(_) => {
                Self::new(RpcErrorCode::InternalError, err.to_string())
            }
            PaymentError::Config(_) => Self::new(RpcErrorCode::InvalidParameter, err.to_string()),
            _ => Self::new(RpcErrorCode::MiscError, err.to_string()),
        }
    }
}

/// Models the result of "getblockchaininfo", reduced to the fields the
/// payment commands are cross-checked against.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct GetBlockchainInfoResult {
    /// Current network name: main, test, devnet or regtest
    pub chain: String,
    /// The current number of blocks processed in the server
    pub blocks: u32,
    /// The hash of the currently best block
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
}

/// Models the result of "smartnode winners": height to primary payee address.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GetMasternodeWinnersResult {
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub winners: BTreeMap<u32, String>,
}

impl From<BTreeMap<u32, String>> for GetMasternodeWinnersResult {
    fn from(winners: BTreeMap<u32, String>) -> Self {
        Self {
            winners,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct PaymentPayee {
    pub address: String,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
    /// In duffs.
    pub amount: Amount,
}

impl From<&PayeeOutput> for PaymentPayee {
    fn from(output: &PayeeOutput) -> Self {
        Self {
            address: output.address.clone(),
            script: output.script.clone(),
            amount: output.amount,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct MasternodePaymentEntry {
    #[serde(rename = "proTxHash")]
    pub pro_tx_hash: ProTxHash,
    pub amount: Amount,
    pub payees: Vec<PaymentPayee>,
}

impl From<&MasternodePayment> for MasternodePaymentEntry {
    fn from(payment: &MasternodePayment) -> Self {
        Self {
            pro_tx_hash: payment.pro_tx_hash,
            amount: payment.amount(),
            payees: payment.payees.iter().map(PaymentPayee::from).collect(),
        }
    }
}

/// One block of the "smartnode payments" result.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct MasternodePaymentBlock {
    pub height: u32,
    #[serde(rename = "blockhash")]
    pub block_hash: BlockHash,
    /// Total paid to smartnodes in this block.
    pub amount: Amount,
    #[serde(alias = "smartnodes")]
    pub masternodes: Vec<MasternodePaymentEntry>,
}

impl From<&PaymentRecord> for MasternodePaymentBlock {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            height: record.height,
            block_hash: record.block_hash,
            amount: record.total_amount(),
            masternodes: record.masternodes.iter().map(MasternodePaymentEntry::from).collect(),
        }
    }
}

/// Models the result of "smartnode payments".
pub type GetMasternodePaymentsResult = Vec<MasternodePaymentBlock>;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct GetMasternodeCountResult {
    pub total: usize,
    pub enabled: usize,
}

impl From<MasternodeCount> for GetMasternodeCountResult {
    fn from(count: MasternodeCount) -> Self {
        Self {
            total: count.total,
            enabled: count.enabled,
        }
    }
}

/// Models the result of "smartnode current": the winner of the next block.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct GetMasternodeCurrentResult {
    pub height: u32,
    /// `None` before payments start.
    pub payee: Option<String>,
}

/// A smartnode output of the candidate block's coinbase.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct BlockTemplateSmartnode {
    pub payee: String,
    #[serde(with = "hex")]
    pub script: Vec<u8>,
    pub amount: Amount,
}

impl From<&PayeeOutput> for BlockTemplateSmartnode {
    fn from(output: &PayeeOutput) -> Self {
        Self {
            payee: output.address.clone(),
            script: output.script.clone(),
            amount: output.amount,
        }
    }
}

/// Models the smartnode part of the "getblocktemplate" result.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct GetBlockTemplateResult {
    pub height: u32,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    /// Block subsidy available to the coinbase, in duffs.
    #[serde(rename = "coinbasevalue")]
    pub coinbase_value: Amount,
    pub smartnode: Vec<BlockTemplateSmartnode>,
    pub smartnode_payments_started: bool,
    pub smartnode_payments_enforced: bool,
}

impl From<&BlockTemplatePayees> for GetBlockTemplateResult {
    fn from(template: &BlockTemplatePayees) -> Self {
        Self {
            height: template.height,
            previous_block_hash: template.previous_block_hash,
            coinbase_value: template.block_value,
            smartnode: template.payees().map(BlockTemplateSmartnode::from).collect(),
            smartnode_payments_started: template.payments_started,
            smartnode_payments_enforced: template.payments_started,
        }
    }
}

/// Arguments of `smartnode winners ( count "filter" )`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WinnersArgs {
    pub count: Option<u32>,
    pub filter: Option<String>,
}

impl WinnersArgs {
    /// Parses the positional arguments following the subcommand.
    pub fn from_params(params: &[Value]) -> Result<Self, RpcError> {
        if params.len() > 2 {
            return Err(RpcError::invalid_parameter("smartnode winners expects at most 2 parameters"));
        }
        let count = params.first().map(|value| parse_u32(value, "count")).transpose()?;
        let filter = params
            .get(1)
            .map(|value| {
                value.as_str().map(str::to_string).ok_or_else(|| RpcError::invalid_parameter("filter must be a string"))
            })
            .transpose()?;
        Ok(Self {
            count,
            filter,
        })
    }
}

impl From<WinnersArgs> for WinnersRequest {
    fn from(args: WinnersArgs) -> Self {
        WinnersRequest {
            count: args.count,
            filter: args.filter,
        }
    }
}

/// Arguments of `smartnode payments ( "blockhash" count )`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentsArgs {
    pub start: Option<BlockRef>,
    pub count: Option<i64>,
}

impl PaymentsArgs {
    pub fn from_params(params: &[Value]) -> Result<Self, RpcError> {
        if params.len() > 2 {
            return Err(RpcError::invalid_parameter("smartnode payments expects at most 2 parameters"));
        }
        let start = params.first().map(parse_block_ref).transpose()?;
        let count = params.get(1).map(|value| parse_i64(value, "count")).transpose()?;
        Ok(Self {
            start,
            count,
        })
    }
}

impl From<PaymentsArgs> for PaymentsRequest {
    fn from(args: PaymentsArgs) -> Self {
        PaymentsRequest {
            start: args.start,
            count: args.count,
        }
    }
}

/// A block hash or height, given as a JSON string or number.
pub fn parse_block_ref(value: &Value) -> Result<BlockRef, RpcError> {
    match value {
        Value::String(s) => s.parse().map_err(RpcError::from),
        Value::Number(_) => parse_u32(value, "height").map(BlockRef::Height),
        _ => Err(RpcError::invalid_parameter("block must be a hash or a height")),
    }
}

/// Parses a block hash given as a hex string.
pub fn parse_block_hash(value: &Value) -> Result<BlockHash, RpcError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RpcError::invalid_parameter("blockhash must be a 64 character hex string"))
}

/// Unsigned integer given as a JSON number or a numeric string.
pub fn parse_u32(value: &Value, label: &str) -> Result<u32, RpcError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RpcError::invalid_parameter(format!("{} must be a non-negative integer", label)))
}

/// Signed integer given as a JSON number or a numeric string.
pub fn parse_i64(value: &Value, label: &str) -> Result<i64, RpcError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RpcError::invalid_parameter(format!("{} must be an integer", label)))
}
