//! Reward amounts, denominated in duffs.

use core::fmt;
use core::ops::{Add, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of duffs in one coin.
pub const COIN: u64 = 100_000_000;

/// An amount of duffs.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde", transparent))]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_duffs(duffs: u64) -> Amount {
        Amount(duffs)
    }

    pub const fn from_coins(coins: u64) -> Amount {
        Amount(coins * COIN)
    }

    pub const fn to_duffs(self) -> u64 {
        self.0
    }

    /// Splits into `parts` equal shares. The first share absorbs the remainder.
    pub fn split(self, parts: usize) -> Vec<Amount> {
        if parts == 0 {
            return Vec::new();
        }
        let parts_u64 = parts as u64;
        let share = self.0 / parts_u64;
        let remainder = self.0 % parts_u64;
        let mut shares = vec![Amount(share); parts];
        shares[0] = Amount(share + remainder);
        shares
    }

    /// The portion of this amount given by `basis_points` out of 10000.
    pub fn basis_points(self, basis_points: u16) -> Amount {
        Amount(((self.0 as u128 * basis_points as u128) / 10_000) as u64)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl core::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_gives_remainder_to_first_share() {
        let shares = Amount::from_duffs(10).split(3);
        assert_eq!(shares, vec![Amount::from_duffs(4), Amount::from_duffs(3), Amount::from_duffs(3)]);
        assert_eq!(shares.into_iter().sum::<Amount>(), Amount::from_duffs(10));
        assert!(Amount::from_duffs(10).split(0).is_empty());
    }

    #[test]
    fn basis_points_rounds_down() {
        assert_eq!(Amount::from_duffs(999).basis_points(2500), Amount::from_duffs(249));
        assert_eq!(Amount::from_coins(1).basis_points(10_000), Amount::from_coins(1));
    }
}
