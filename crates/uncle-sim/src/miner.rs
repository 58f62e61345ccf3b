/*!
Miners and block discovery

Every [`Miner`] follows the same protocol: mine on the tip of the longest chain
it knows about, and include up to two pooled uncles in each new block. Miners
differ only in hash rate and in how quickly they hear about each other's
blocks, which is described by a
[`LatencyModel`](crate::latency::LatencyModel).
*/

use std::time::Duration;

use rand::Rng;

use crate::{
    blockchain::{BlockId, BlockInsertionError, Blockchain},
    chain_view::ChainView,
    clock::Timestamp,
};

/// Numeric type used to represent hash rates, in hashes per second.
pub type HashRate = f64;

/// Unique identifier of a [`Miner`]. Corresponds to a [`usize`].
///
/// # Invariants
///
/// Miner IDs are assigned in order of addition to a
/// [`SimulationBuilder`](crate::simulation::SimulationBuilder), starting at 1.
/// `MinerId(0)` cannot be instantiated outside of this crate.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerId(pub(crate) usize);

impl MinerId {
    /// Returns the [`usize`] corresponding to this [`MinerId`].
    pub fn get(&self) -> usize {
        self.0
    }

    /// Position of this miner in its simulation's miner list.
    pub(crate) fn index(&self) -> usize {
        self.0 - 1
    }
}

impl From<usize> for MinerId {
    fn from(value: usize) -> Self {
        assert_ne!(value, 0, "newly made MinerId must be greater than 0");
        Self(value)
    }
}

impl Default for MinerId {
    fn default() -> Self {
        Self(1)
    }
}

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A miner and its local view of the block DAG.
#[derive(Debug, Clone)]
pub struct Miner {
    id: MinerId,
    name: String,
    hash_rate: HashRate,
    view: ChainView,
}

impl Miner {
    /// Creates a new miner whose view starts at the genesis block.
    pub fn new<N: Into<String>>(id: MinerId, name: N, hash_rate: HashRate) -> Self {
        Miner {
            id,
            name: name.into(),
            hash_rate,
            view: ChainView::new(Blockchain::GENESIS),
        }
    }

    pub fn id(&self) -> MinerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_rate(&self) -> HashRate {
        self.hash_rate
    }

    pub fn view(&self) -> &ChainView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ChainView {
        &mut self.view
    }

    /// Runs this miner's discovery trial for one tick.
    ///
    /// Draws a single uniform value and succeeds iff
    /// `value * (total_hash_rate / hash_rate) < timestep / block_interval`.
    /// This is a first-order approximation of a Poisson process in which each
    /// miner finds blocks in proportion to its share of the total hash rate.
    pub fn sample_discovery<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        total_hash_rate: HashRate,
        timestep: Duration,
        block_interval: Duration,
    ) -> bool {
        let value: f64 = rng.gen();

        value * (total_hash_rate / self.hash_rate)
            < timestep.as_secs_f64() / block_interval.as_secs_f64()
    }

    /// Mines a block on top of this miner's tip at time `now`, which becomes
    /// the new tip.
    pub fn mine(
        &mut self,
        chain: &mut Blockchain,
        now: Timestamp,
    ) -> Result<BlockId, BlockInsertionError> {
        self.view.extend(chain, self.id, now)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::mock::StepRng, SeedableRng};
    use rand_chacha::ChaChaRng;

    use crate::{blockchain::Blockchain, clock::Timestamp};

    use super::{Miner, MinerId};

    const TIMESTEP: Duration = Duration::from_millis(10);
    const BLOCK_INTERVAL: Duration = Duration::from_secs(15);

    #[test]
    #[should_panic]
    fn miner_id_zero_is_reserved() {
        let _ = MinerId::from(0);
    }

    #[test]
    fn discovery_follows_draw() {
        let miner = Miner::new(1.into(), "Alice", 30e6);

        // Always draws 0.0
        let mut low = StepRng::new(0, 0);
        assert!(miner.sample_discovery(&mut low, 85e6, TIMESTEP, BLOCK_INTERVAL));

        // Always draws a value just below 1.0
        let mut high = StepRng::new(u64::MAX, 0);
        assert!(!miner.sample_discovery(&mut high, 85e6, TIMESTEP, BLOCK_INTERVAL));
    }

    #[test]
    fn discovery_rate_tracks_hash_share() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        let miner = Miner::new(1.into(), "Alice", 25.0);
        let trials = 2_000_000;

        let found = (0..trials)
            .filter(|_| {
                miner.sample_discovery(&mut rng, 100.0, TIMESTEP, BLOCK_INTERVAL)
            })
            .count();

        // Expected 0.25 * 0.01 / 15 * 2e6 ~= 333
        assert!((250..=420).contains(&found), "found {found} blocks");
    }

    #[test]
    fn mining_extends_own_view() {
        let mut chain = Blockchain::default();
        let mut miner = Miner::new(2.into(), "Bob", 1.0);

        let first = miner.mine(&mut chain, Timestamp::zero()).unwrap();
        let second = miner.mine(&mut chain, Timestamp::zero()).unwrap();

        assert_eq!(miner.view().tip(), second);
        assert_eq!(chain[second].parent, Some(first));
        assert_eq!(chain[second].miner, Some(miner.id()));
        assert_eq!(chain[second].balances.get(miner.id()), 6.0);
    }
}
