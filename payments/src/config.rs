//! Configuration of the payment engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::network::{Network, PaymentParams};

/// Configuration for a [`crate::PaymentEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde", default))]
pub struct Config {
    /// Network whose payment parameters apply.
    pub network: Network,

    /// Smartnodes paid per block. The reward is split equally among them.
    pub payees_per_block: usize,

    /// Confirmed heights reported by `winners`, ending at the tip.
    pub winners_history_depth: u32,

    /// Future heights projected by `winners`, starting at tip + 1.
    pub winners_projection_depth: u32,

    /// Deepest reorganization accepted, in blocks.
    pub max_reorg_depth: u32,

    /// Replaces the network's payment parameters when set.
    pub params_override: Option<PaymentParams>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            payees_per_block: 1,
            winners_history_depth: 10,
            winners_projection_depth: 20,
            max_reorg_depth: 100,
            params_override: None,
        }
    }
}

impl Config {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    pub fn devnet() -> Self {
        Self::new(Network::Devnet)
    }

    pub fn regtest() -> Self {
        Self::new(Network::Regtest)
    }

    pub fn with_payees_per_block(mut self, payees_per_block: usize) -> Self {
        self.payees_per_block = payees_per_block;
        self
    }

    pub fn with_winners_depths(mut self, history: u32, projection: u32) -> Self {
        self.winners_history_depth = history;
        self.winners_projection_depth = projection;
        self
    }

    pub fn with_max_reorg_depth(mut self, max_reorg_depth: u32) -> Self {
        self.max_reorg_depth = max_reorg_depth;
        self
    }

    pub fn with_params(mut self, params: PaymentParams) -> Self {
        self.params_override = Some(params);
        self
    }

    /// Payment parameters in effect.
    pub fn payment_params(&self) -> PaymentParams {
        self.params_override.clone().unwrap_or_else(|| self.network.payment_params())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.payees_per_block == 0 {
            return Err("payees_per_block must be > 0".to_string());
        }
        if self.max_reorg_depth == 0 {
            return Err("max_reorg_depth must be > 0".to_string());
        }
        let params = self.payment_params();
        if params.payments_increase_period == 0 {
            return Err("payments_increase_period must be > 0".to_string());
        }
        if params.subsidy_halving_interval == 0 {
            return Err("subsidy_halving_interval must be > 0".to_string());
        }
        params.smartnode_share.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{RewardPercentage, SmartnodeShare};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.payees_per_block, 1);
        assert_eq!(config.winners_history_depth, 10);
        assert_eq!(config.winners_projection_depth, 20);
        assert_eq!(config.max_reorg_depth, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let mut params = Network::Regtest.payment_params();
        params.payments_start_height = 2;

        let config = Config::regtest()
            .with_payees_per_block(2)
            .with_winners_depths(5, 3)
            .with_max_reorg_depth(6)
            .with_params(params);

        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.payees_per_block, 2);
        assert_eq!(config.winners_history_depth, 5);
        assert_eq!(config.winners_projection_depth, 3);
        assert_eq!(config.max_reorg_depth, 6);
        assert_eq!(config.payment_params().payments_start_height, 2);
    }

    #[test]
    fn test_validation() {
        assert!(Config::regtest().with_payees_per_block(0).validate().is_err());
        assert!(Config::regtest().with_max_reorg_depth(0).validate().is_err());

        let mut params = Network::Regtest.payment_params();
        params.subsidy_halving_interval = 0;
        assert!(Config::regtest().with_params(params).validate().is_err());

        let mut params = Network::Regtest.payment_params();
        params.smartnode_share = SmartnodeShare::Table(vec![RewardPercentage::new(100, 20)]);
        assert!(Config::regtest().with_params(params).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_from_json() {
        let config: Config =
            serde_json::from_str(r#"{"network":"regtest","payees_per_block":3}"#).unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.payees_per_block, 3);
        assert_eq!(config.max_reorg_depth, 100);
    }
}
