//! An in-process regtest node for exercising the smartnode payment RPC
//! commands end to end.
//!
//! [`RegtestNode`] owns a [`PaymentEngine`], mines blocks with
//! deterministic hashes and dispatches JSON-RPC style calls the way the
//! node's RPC server would, minus the transport.

use serde_json::Value;

use smartnode_payments::{
    BlockHash, BlockRef, Config, ConnectedBlock, MasternodeRegistration, PaymentEngine, PaymentResult,
    PaymentsRequest, PayoutDestination, ProTxHash, WinnersRequest,
};
use smartnode_rpc_json::{
    GetBlockTemplateResult, GetBlockchainInfoResult, GetMasternodeCountResult, GetMasternodeCurrentResult,
    GetMasternodePaymentsResult, GetMasternodeWinnersResult, MasternodePaymentBlock, PaymentsArgs, RpcError,
    RpcErrorCode, WinnersArgs, parse_block_hash, parse_u32,
};

/// Operator reward, in basis points, of the smartnodes registered with an operator.
pub const OPERATOR_REWARD: u16 = 1_000;

/// Registration used for the `index`th smartnode of a test network.
///
/// Every third smartnode has an operator taking [`OPERATOR_REWARD`].
pub fn smartnode_registration(index: usize) -> MasternodeRegistration {
    let pro_tx_hash = ProTxHash::hash(format!("smartnode-{}", index).as_bytes());
    let owner = payout_destination("owner", index);
    let registration = MasternodeRegistration::new(pro_tx_hash, owner);
    if index % 3 == 2 {
        registration.with_operator(payout_destination("operator", index), OPERATOR_REWARD)
    } else {
        registration
    }
}

/// Pay-to-pubkey-hash destination derived from `role` and `index`.
fn payout_destination(role: &str, index: usize) -> PayoutDestination {
    let key_hash = BlockHash::hash(format!("{}-{}", role, index).as_bytes());
    let key_hash = &key_hash.as_byte_array()[..20];
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(key_hash);
    script.extend_from_slice(&[0x88, 0xac]);
    let address = format!("y{}{}", role, hex_prefix(key_hash));
    PayoutDestination::new(address, script)
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|byte| format!("{:02x}", byte)).collect()
}

pub struct RegtestNode {
    engine: PaymentEngine,
    pending_registrations: Vec<MasternodeRegistration>,
    /// Bumped on every invalidation so re-mined blocks get new hashes.
    branch: u32,
}

impl RegtestNode {
    /// A node on `config` whose first block registers `masternodes` smartnodes.
    pub fn new(config: Config, masternodes: usize) -> PaymentResult<Self> {
        let genesis = BlockHash::hash(format!("{} genesis", config.network).as_bytes());
        let mut node = Self {
            engine: PaymentEngine::new(config, genesis)?,
            pending_registrations: (0..masternodes).map(smartnode_registration).collect(),
            branch: 0,
        };
        node.generate(1)?;
        Ok(node)
    }

    pub fn regtest(masternodes: usize) -> PaymentResult<Self> {
        Self::new(Config::regtest(), masternodes)
    }

    pub fn engine(&self) -> &PaymentEngine {
        &self.engine
    }

    /// Queues a registration for the next mined block.
    pub fn register(&mut self, registration: MasternodeRegistration) {
        self.pending_registrations.push(registration);
    }

    /// Registrations waiting for the next block that connects.
    pub fn pending_registrations(&self) -> &[MasternodeRegistration] {
        &self.pending_registrations
    }

    /// Mines `count` blocks on the tip and returns their hashes.
    pub fn generate(&mut self, count: u32) -> PaymentResult<Vec<BlockHash>> {
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let snapshot = self.engine.snapshot()?;
            let height = snapshot.tip_height() + 1;
            let prev_block_hash = snapshot.tip_hash();
            let block_hash = self.block_hash(prev_block_hash, height);
            let block = ConnectedBlock::new(height, block_hash, prev_block_hash)
                .with_registrations(self.pending_registrations.clone());
            self.engine.connect_block(block)?;
            self.pending_registrations.clear();
            hashes.push(block_hash);
        }
        tracing::debug!("Generated {} block(s), tip {:?}", count, hashes.last());
        Ok(hashes)
    }

    /// Disconnects `block_hash` and everything above it.
    pub fn invalidate_block(&mut self, block_hash: &BlockHash) -> Result<(), RpcError> {
        let height = self.engine.snapshot()?.history().resolve(&BlockRef::Hash(*block_hash))?;
        let Some(fork_height) = height.checked_sub(1) else {
            return Err(RpcError::new(RpcErrorCode::MiscError, "Cannot invalidate the genesis block"));
        };
        self.engine.disconnect_to(fork_height)?;
        self.branch += 1;
        Ok(())
    }

    fn block_hash(&self, prev_block_hash: BlockHash, height: u32) -> BlockHash {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(prev_block_hash.as_byte_array());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&self.branch.to_le_bytes());
        BlockHash::hash(&data)
    }

    /// Dispatches an RPC call.
    pub fn call(&mut self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        match method {
            "getblockchaininfo" => self.getblockchaininfo(params),
            "smartnode" | "masternode" => self.smartnode(params),
            "getblocktemplate" => self.getblocktemplate(),
            "generate" => self.rpc_generate(params),
            "invalidateblock" => self.invalidateblock(params),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn getblockchaininfo(&self, params: &[Value]) -> Result<Value, RpcError> {
        ensure_no_params(params)?;
        let query = self.engine.query()?;
        to_json(&GetBlockchainInfoResult {
            chain: query.network().chain_name().to_string(),
            blocks: query.tip_height(),
            best_block_hash: query.tip_hash(),
        })
    }

    fn smartnode(&self, params: &[Value]) -> Result<Value, RpcError> {
        let command = params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_parameter("smartnode expects a subcommand"))?;
        let args = &params[1..];
        let query = self.engine.query()?;
        match command {
            "winners" => {
                let request: WinnersRequest = WinnersArgs::from_params(args)?.into();
                to_json(&GetMasternodeWinnersResult::from(query.winners(&request)?))
            }
            "payments" => {
                let request: PaymentsRequest = PaymentsArgs::from_params(args)?.into();
                let records = query.payments(&request)?;
                let result: GetMasternodePaymentsResult =
                    records.iter().map(|record| MasternodePaymentBlock::from(record.as_ref())).collect();
                to_json(&result)
            }
            "count" => {
                ensure_no_params(args)?;
                to_json(&GetMasternodeCountResult::from(query.masternode_count()))
            }
            "current" => {
                ensure_no_params(args)?;
                let height = query.tip_height() + 1;
                to_json(&GetMasternodeCurrentResult {
                    height,
                    payee: query.winner(height)?,
                })
            }
            _ => Err(RpcError::invalid_parameter(format!("Unknown smartnode subcommand: {}", command))),
        }
    }

    fn getblocktemplate(&self) -> Result<Value, RpcError> {
        let template = self.engine.query()?.block_template_payees()?;
        to_json(&GetBlockTemplateResult::from(&template))
    }

    fn rpc_generate(&mut self, params: &[Value]) -> Result<Value, RpcError> {
        let count = match params {
            [] => 1,
            [count] => parse_u32(count, "nblocks")?,
            _ => return Err(RpcError::invalid_parameter("generate expects at most 1 parameter")),
        };
        let hashes = self.generate(count)?;
        to_json(&hashes)
    }

    fn invalidateblock(&mut self, params: &[Value]) -> Result<Value, RpcError> {
        let [block_hash] = params else {
            return Err(RpcError::invalid_parameter("invalidateblock expects 1 parameter"));
        };
        self.invalidate_block(&parse_block_hash(block_hash)?)?;
        Ok(Value::Null)
    }
}

fn ensure_no_params(params: &[Value]) -> Result<(), RpcError> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(RpcError::invalid_parameter("unexpected parameters"))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(RpcErrorCode::InternalError, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use smartnode_payments::PaymentError;

    #[test]
    fn registrations_are_distinct() {
        let a = smartnode_registration(0);
        let c = smartnode_registration(2);
        assert_ne!(a.pro_tx_hash, c.pro_tx_hash);
        assert_ne!(a.owner_payout, c.owner_payout);
        assert!(a.operator_payout.is_none());
        assert_eq!(c.operator_reward, OPERATOR_REWARD);
        assert_eq!(c.owner_payout.script.len(), 25);
    }

    #[test]
    fn generate_advances_the_tip() {
        let mut node = RegtestNode::regtest(3).unwrap();
        let hashes = node.call("generate", &[json!(4)]).unwrap();
        assert_eq!(hashes.as_array().unwrap().len(), 4);
        let info = node.call("getblockchaininfo", &[]).unwrap();
        assert_eq!(info["chain"], "regtest");
        assert_eq!(info["blocks"], 5);
        assert_eq!(info["bestblockhash"], hashes[3]);
    }

    #[test]
    fn invalidated_block_is_replaced_on_regenerate() {
        let mut node = RegtestNode::regtest(3).unwrap();
        let hashes = node.generate(3).unwrap();
        node.call("invalidateblock", &[json!(hashes[1].to_string())]).unwrap();
        assert_eq!(node.engine().snapshot().unwrap().tip_height(), 2);

        let replacement = node.generate(1).unwrap();
        assert_ne!(replacement[0], hashes[1]);
    }

    #[test]
    fn first_smartnode_after_payments_start_is_paid() {
        let mut node = RegtestNode::regtest(0).unwrap();
        node.generate(238).unwrap();
        node.register(smartnode_registration(0));
        node.generate(1).unwrap();
        assert!(node.pending_registrations().is_empty());
        assert_eq!(node.engine().snapshot().unwrap().registry().len(), 1);

        node.generate(1).unwrap();
        let payments = node.call("smartnode", &[json!("payments")]).unwrap();
        assert_eq!(payments[0]["height"], 241);
        assert_eq!(payments[0]["masternodes"][0]["proTxHash"], smartnode_registration(0).pro_tx_hash.to_string());
    }

    #[test]
    fn rejected_block_keeps_pending_registrations() {
        let mut node = RegtestNode::regtest(1).unwrap();
        node.register(smartnode_registration(0));
        assert_matches!(node.generate(1), Err(PaymentError::InvalidRegistration(_)));
        assert_eq!(node.pending_registrations().len(), 1);
        assert_eq!(node.engine().snapshot().unwrap().tip_height(), 1);
    }

    #[test]
    fn unknown_methods_and_subcommands() {
        let mut node = RegtestNode::regtest(1).unwrap();
        assert_matches!(
            node.call("getpeerinfo", &[]),
            Err(RpcError { code: RpcErrorCode::MethodNotFound, .. })
        );
        assert_matches!(
            node.call("smartnode", &[json!("list")]),
            Err(RpcError { code: RpcErrorCode::InvalidParameter, .. })
        );
        let genesis = node.engine().snapshot().unwrap().history().block_hash_at(0).unwrap();
        assert_matches!(
            node.call("invalidateblock", &[json!(genesis.to_string())]),
            Err(RpcError { code: RpcErrorCode::MiscError, .. })
        );
        assert_matches!(
            node.call("getblockchaininfo", &[json!(1)]),
            Err(RpcError { code: RpcErrorCode::InvalidParameter, .. })
        );
    }
}
