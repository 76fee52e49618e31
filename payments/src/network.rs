//! Networks and their smartnode payment parameters.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// The network a payment engine schedules rewards for.
#[derive(Copy, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde", rename_all = "lowercase"))]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Regtest,
}

impl Network {
    /// Creates a `Network` from the message start bytes.
    pub fn from_magic(magic: u32) -> Option<Network> {
        // Note: any new entries here must be added to `magic` below
        match magic {
            0x2e663452 => Some(Network::Mainnet),
            0xff68e238 => Some(Network::Testnet),
            0xceff7256 => Some(Network::Devnet),
            0x66b744fc => Some(Network::Regtest),
            _ => None,
        }
    }

    /// The message start bytes, little-endian.
    pub fn magic(self) -> u32 {
        // Note: any new entries here must be added to `from_magic` above
        match self {
            Network::Mainnet => 0x2e663452,
            Network::Testnet => 0xff68e238,
            Network::Devnet => 0xceff7256,
            Network::Regtest => 0x66b744fc,
        }
    }

    /// Chain name as reported by `getblockchaininfo`.
    pub fn chain_name(self) -> &'static str {
        match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
            Network::Devnet => "devnet",
            Network::Regtest => "regtest",
        }
    }

    pub fn payment_params(self) -> PaymentParams {
        match self {
            Network::Mainnet => PaymentParams {
                payments_start_height: 5761,
                payments_increase_height: 158_000,
                payments_increase_period: 576 * 30,
                minimum_confirmations: 15,
                subsidy_halving_interval: 210_240,
                initial_block_subsidy: Amount::from_coins(5000),
                smartnode_share: SmartnodeShare::Table(vec![
                    RewardPercentage::new(5761, 0),
                    RewardPercentage::new(u32::MAX, 20),
                ]),
            },
            Network::Testnet => PaymentParams {
                payments_start_height: 4010,
                payments_increase_height: 4030,
                payments_increase_period: 10,
                minimum_confirmations: 1,
                subsidy_halving_interval: 210_240,
                initial_block_subsidy: Amount::from_coins(5000),
                smartnode_share: SmartnodeShare::Increasing,
            },
            Network::Devnet => PaymentParams {
                payments_start_height: 4010,
                payments_increase_height: 4030,
                payments_increase_period: 10,
                minimum_confirmations: 1,
                subsidy_halving_interval: 210_240,
                initial_block_subsidy: Amount::from_coins(50),
                smartnode_share: SmartnodeShare::Increasing,
            },
            Network::Regtest => PaymentParams {
                payments_start_height: 240,
                payments_increase_height: 350,
                payments_increase_period: 10,
                minimum_confirmations: 1,
                subsidy_halving_interval: 150,
                initial_block_subsidy: Amount::from_coins(50),
                smartnode_share: SmartnodeShare::Increasing,
            },
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Devnet => write!(f, "devnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Mainnet),
            "test" | "testnet" => Ok(Network::Testnet),
            "dev" | "devnet" => Ok(Network::Devnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(format!("Unknown network type: {}", s)),
        }
    }
}

/// Smartnode share of the block value for blocks up to `height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct RewardPercentage {
    pub height: u32,
    pub percentage: u8,
}

impl RewardPercentage {
    pub const fn new(height: u32, percentage: u8) -> Self {
        Self {
            height,
            percentage,
        }
    }
}

/// How the smartnode share of a block's value is derived.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde", rename_all = "snake_case"))]
pub enum SmartnodeShare {
    /// 20% stepping up towards 50% past `payments_increase_height`.
    Increasing,
    /// The first entry whose height is at or above the block height applies.
    /// Entries are sorted by height and the last one ends at `u32::MAX`.
    Table(Vec<RewardPercentage>),
}

impl SmartnodeShare {
    pub(crate) fn validate(&self) -> Result<(), String> {
        let SmartnodeShare::Table(table) = self else {
            return Ok(());
        };
        if table.last().map(|entry| entry.height) != Some(u32::MAX) {
            return Err("reward table must end at height u32::MAX".to_string());
        }
        if table.windows(2).any(|pair| pair[0].height >= pair[1].height) {
            return Err("reward table heights must be strictly increasing".to_string());
        }
        if table.iter().any(|entry| entry.percentage > 100) {
            return Err("reward percentage must be <= 100".to_string());
        }
        Ok(())
    }
}

/// Consensus parameters governing smartnode payments on a network.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct PaymentParams {
    /// First height whose coinbase pays smartnodes.
    pub payments_start_height: u32,
    /// Height after which the smartnode share starts stepping up.
    pub payments_increase_height: u32,
    /// Blocks between share increases.
    pub payments_increase_period: u32,
    /// Blocks a registration must be buried under before it can be paid.
    pub minimum_confirmations: u32,
    pub subsidy_halving_interval: u32,
    pub initial_block_subsidy: Amount,
    pub smartnode_share: SmartnodeShare,
}
