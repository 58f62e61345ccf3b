//! Block and uncle rewards

use std::collections::BTreeMap;

use crate::miner::MinerId;

/// Numeric type used to represent rewards and balances.
pub type Reward = f64;

/// Default reward for mining a block.
pub const DEFAULT_BLOCK_REWARD: Reward = 3.0;

/// The producer of a block receives `block_reward / NEPHEW_REWARD_DIVISOR`
/// for each uncle it includes.
pub const NEPHEW_REWARD_DIVISOR: Reward = 32.0;

/// An uncle's miner receives
/// `(height - uncle_height + UNCLE_REWARD_DIVISOR) * block_reward / UNCLE_REWARD_DIVISOR`.
pub const UNCLE_REWARD_DIVISOR: Reward = 8.0;

/// Cumulative reward of each miner as of some block. Miners without an entry
/// have a balance of zero.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Balances(BTreeMap<MinerId, Reward>);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the balance of `miner`.
    pub fn get(&self, miner: MinerId) -> Reward {
        self.0.get(&miner).copied().unwrap_or_default()
    }

    /// Adds `amount` to the balance of `miner`.
    pub fn credit(&mut self, miner: MinerId, amount: Reward) {
        *self.0.entry(miner).or_default() += amount;
    }

    /// Iterates over all non-default balances in [`MinerId`] order.
    pub fn iter(&self) -> impl Iterator<Item = (MinerId, Reward)> + '_ {
        self.0.iter().map(|(&miner, &balance)| (miner, balance))
    }

    /// Sum of all balances.
    pub fn total(&self) -> Reward {
        self.0.values().sum()
    }
}

/// Reward paid to the producer of a block for including one uncle.
#[inline]
pub fn nephew_reward(block_reward: Reward) -> Reward {
    block_reward / NEPHEW_REWARD_DIVISOR
}

/// Reward paid to the miner of an uncle at `uncle_height` which is included
/// in a block at `height`.
#[inline]
pub fn uncle_reward(block_reward: Reward, height: u64, uncle_height: u64) -> Reward {
    debug_assert!(uncle_height < height);
    let depth = (height - uncle_height) as Reward;

    (depth + UNCLE_REWARD_DIVISOR) * block_reward / UNCLE_REWARD_DIVISOR
}

#[cfg(test)]
mod tests {
    use crate::miner::MinerId;

    use super::{nephew_reward, uncle_reward, Balances};

    #[test]
    fn missing_miner_has_zero_balance() {
        let balances = Balances::new();
        assert_eq!(balances.get(MinerId::from(3)), 0.0);
        assert_eq!(balances.total(), 0.0);
    }

    #[test]
    fn credits_accumulate() {
        let mut balances = Balances::new();
        balances.credit(1.into(), 3.0);
        balances.credit(1.into(), 3.0);
        balances.credit(2.into(), 0.5);

        assert_eq!(balances.get(1.into()), 6.0);
        assert_eq!(balances.total(), 6.5);
        assert_eq!(balances.iter().count(), 2);
    }

    #[test]
    fn uncle_reward_grows_with_depth() {
        assert_eq!(nephew_reward(3.0), 0.09375);
        assert_eq!(uncle_reward(3.0, 6, 5), 3.375);
        assert_eq!(uncle_reward(3.0, 12, 5), 5.625);
    }
}
