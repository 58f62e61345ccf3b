//! Building/running simulations and analyzing the resulting data

use std::{
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaChaRng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::{
    blockchain::{BlockId, BlockInsertionError, Blockchain},
    chain_view::Arrival,
    clock::{Clock, Timestamp},
    event_queue::{Delivery, EventQueue},
    latency::LatencyModel,
    miner::{HashRate, Miner, MinerId},
    results::ResultsBuilder,
    reward::{Balances, Reward},
};

pub mod builder;

pub use builder::{SimulationBuildError, SimulationBuilder};

/// Container for a configured simulation and the number of times it should be
/// repeated. Simulations should be run using this struct's `run_all` method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    simulation: Simulation,
    repeat_all: NonZeroUsize,
}

impl SimulationGroup {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Number of times the simulation is run by
    /// [`SimulationGroup::run_all`].
    pub fn repeat_all(&self) -> usize {
        self.repeat_all.get()
    }

    /// Returns every run of this group, each with its own seed derived from
    /// the group's seed.
    pub fn simulations(&self) -> Vec<Simulation> {
        let mut seeds = ChaChaRng::seed_from_u64(self.simulation.seed);

        (0..self.repeat_all.get())
            .map(|_| Simulation {
                seed: seeds.next_u64(),
                ..self.simulation.clone()
            })
            .collect()
    }

    /// Executes every run of this group, in parallel when the `rayon` feature
    /// is enabled.
    pub fn run_all(self) -> Result<ResultsBuilder, SimulationError> {
        let sims = self.simulations();

        #[cfg(feature = "rayon")]
        let outputs: Result<Vec<_>, _> =
            sims.into_par_iter().map(Simulation::run).collect();
        #[cfg(not(feature = "rayon"))]
        let outputs: Result<Vec<_>, _> =
            sims.into_iter().map(Simulation::run).collect();

        Ok(ResultsBuilder::new(outputs?, self.repeat_all))
    }
}

/// A single run of the mining game.
///
/// # Details
/// In each tick, every miner runs its discovery trial in the order it was
/// added. A miner which finds a block extends its own view at once, and the
/// block is scheduled for delivery to every other miner after a sampled
/// propagation delay. Deliveries which are due are processed only after all
/// miners have had their turn.
#[derive(Debug, Clone)]
pub struct Simulation {
    miners: Vec<Miner>,
    latency: LatencyModel,
    timestep: Duration,
    block_interval: Duration,
    block_reward: Reward,
    ticks: u64,
    snapshot_every: Option<u64>,
    seed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("block could not be published")]
    BlockInsertion(#[from] BlockInsertionError),
}

/// Number of blocks a miner received from others, by what it did with them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalCounts {
    pub adopted: usize,
    pub pooled: usize,
    pub ignored: usize,
}

impl ArrivalCounts {
    fn record(&mut self, arrival: Arrival) {
        match arrival {
            Arrival::Adopted => self.adopted += 1,
            Arrival::Pooled => self.pooled += 1,
            Arrival::Ignored => self.ignored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.adopted + self.pooled + self.ignored
    }
}

/// Every miner's tip at some point in a simulation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time: Timestamp,
    /// Tips in miner order.
    pub tips: Vec<(MinerId, BlockId)>,
}

impl Simulation {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn miners(&self) -> &[Miner] {
        &self.miners
    }

    /// Executes the configured simulation with an RNG seeded from this
    /// simulation's seed.
    pub fn run(self) -> Result<SimulationOutput, SimulationError> {
        let mut rng = ChaChaRng::seed_from_u64(self.seed);
        self.run_with_rng(&mut rng)
    }

    /// Executes the configured simulation, drawing all randomness from `rng`.
    pub fn run_with_rng<R: RngCore>(
        self,
        rng: &mut R,
    ) -> Result<SimulationOutput, SimulationError> {
        let Simulation {
            mut miners,
            latency,
            timestep,
            block_interval,
            block_reward,
            ticks,
            snapshot_every,
            seed,
        } = self;

        let _span = info_span!("run", seed).entered();

        let total_hash_rate: HashRate = miners.iter().map(Miner::hash_rate).sum();
        let mut chain = Blockchain::new(block_reward);
        let mut clock = Clock::new(timestep);
        let mut queue = EventQueue::new();

        let mut blocks_by_miner: HashMap<MinerId, Vec<BlockId>> = HashMap::new();
        let mut arrivals = vec![ArrivalCounts::default(); miners.len()];
        let mut snapshots = vec![];

        while clock.tick() < ticks {
            let now = clock.now();

            // Always iterate through miners in list order
            for i in 0..miners.len() {
                let found = miners[i].sample_discovery(
                    rng,
                    total_hash_rate,
                    timestep,
                    block_interval,
                );
                if !found {
                    continue;
                }

                let block = miners[i].mine(&mut chain, now)?;
                let miner = miners[i].id();
                info!(
                    "t={now}: {} mined block {block} at height {}",
                    miners[i].name(),
                    chain[block].height,
                );
                blocks_by_miner.entry(miner).or_default().push(block);

                for other in miners.iter().filter(|m| m.id() != miner) {
                    let delay = latency.sample(miner, other.id(), rng);
                    queue.schedule(now + delay, Delivery { target: other.id(), block });
                }
            }

            for (_, Delivery { target, block }) in queue.drain_due(now) {
                let view = miners[target.index()].view_mut();
                let arrival = view.record_arrival(&chain, block);
                debug!("t={now}: block {block} delivered to miner {target}: {arrival:?}");

                arrivals[target.index()].record(arrival);
            }

            if snapshot_every.is_some_and(|every| clock.tick() % every == 0) {
                let snapshot = Snapshot {
                    time: now,
                    tips: miners.iter().map(|m| (m.id(), m.view().tip())).collect(),
                };
                for miner in miners.iter() {
                    let balances = &chain[miner.view().tip()].balances;
                    info!(
                        "{:<20}\t{}",
                        miner.name(),
                        describe_balances(balances, &miners)
                    );
                }
                snapshots.push(snapshot);
            }

            clock.advance();
        }

        Ok(SimulationOutput::new(
            chain,
            miners,
            blocks_by_miner,
            arrivals,
            snapshots,
            queue.len(),
            ticks,
            seed,
        ))
    }
}

/// Formats `balances` as `{Alice: 3.000, Bob: 0.000}`, listing every miner.
pub fn describe_balances(balances: &Balances, miners: &[Miner]) -> String {
    let entries: Vec<_> = miners
        .iter()
        .map(|m| format!("{}: {:.3}", m.name(), balances.get(m.id())))
        .collect();

    format!("{{{}}}", entries.join(", "))
}

/// Contains the output data from a simulation.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub blockchain: Blockchain,
    pub blocks_by_miner: HashMap<MinerId, Vec<BlockId>>,
    /// Highest tip of any miner, preferring earlier miners on ties.
    pub canonical_tip: BlockId,
    /// Blocks on the path from the genesis block to `canonical_tip`.
    pub main_chain: HashSet<BlockId>,
    /// What each miner did with the blocks delivered to it, in miner order.
    pub arrivals: Vec<ArrivalCounts>,
    pub miners: Vec<Miner>,
    /// Deliveries still in flight when the simulation ended.
    pub pending_deliveries: usize,
    pub seed: u64,
    pub snapshots: Vec<Snapshot>,
    pub ticks: u64,
}

impl SimulationOutput {
    #[allow(clippy::too_many_arguments)]
    fn new(
        blockchain: Blockchain,
        miners: Vec<Miner>,
        blocks_by_miner: HashMap<MinerId, Vec<BlockId>>,
        arrivals: Vec<ArrivalCounts>,
        snapshots: Vec<Snapshot>,
        pending_deliveries: usize,
        ticks: u64,
        seed: u64,
    ) -> Self {
        let mut canonical_tip = Blockchain::GENESIS;
        for miner in miners.iter() {
            let tip = miner.view().tip();
            if blockchain[tip].height > blockchain[canonical_tip].height {
                canonical_tip = tip;
            }
        }
        let main_chain = HashSet::from_iter(blockchain.ancestors_of(canonical_tip));

        SimulationOutput {
            blockchain,
            blocks_by_miner,
            canonical_tip,
            main_chain,
            arrivals,
            miners,
            pending_deliveries,
            seed,
            snapshots,
            ticks,
        }
    }

    /// Returns the miner with ID `miner_id`.
    ///
    /// ## Panics
    /// If `miner_id` is not part of this simulation.
    pub fn miner(&self, miner_id: MinerId) -> &Miner {
        &self.miners[miner_id.index()]
    }

    /// Fraction of the total hash rate held by `miner_id`.
    pub fn hash_share_of(&self, miner_id: MinerId) -> f64 {
        let total: HashRate = self.miners.iter().map(Miner::hash_rate).sum();
        self.miner(miner_id).hash_rate() / total
    }

    /// Balance of `miner_id` as of the canonical tip.
    pub fn balance_of(&self, miner_id: MinerId) -> Reward {
        self.blockchain[self.canonical_tip].balances.get(miner_id)
    }

    /// Height of the canonical tip.
    pub fn chain_height(&self) -> u64 {
        self.blockchain[self.canonical_tip].height
    }

    /// Number of blocks mined by all miners.
    pub fn blocks_mined(&self) -> usize {
        self.blocks_by_miner.values().map(Vec::len).sum()
    }

    /// Number of blocks mined by `miner_id` which are on the main chain.
    pub fn main_chain_blocks_of(&self, miner_id: MinerId) -> usize {
        self.blocks_by_miner
            .get(&miner_id)
            .map(|blocks| {
                blocks.iter().filter(|b| self.main_chain.contains(b)).count()
            })
            .unwrap_or_default()
    }

    /// Uncles included by blocks on the main chain, in ascending order of the
    /// including block's ID.
    pub fn included_uncles(&self) -> Vec<BlockId> {
        let mut main_chain: Vec<_> = self.main_chain.iter().copied().collect();
        main_chain.sort();

        main_chain
            .into_iter()
            .flat_map(|id| self.blockchain[id].uncles.iter().copied())
            .collect()
    }

    /// Number of blocks mined by `miner_id` which were included as uncles on
    /// the main chain.
    pub fn uncles_of(&self, miner_id: MinerId) -> usize {
        self.included_uncles()
            .into_iter()
            .filter(|&uncle| self.blockchain[uncle].miner == Some(miner_id))
            .count()
    }

    /// Included uncles per main chain block.
    pub fn uncle_rate(&self) -> f64 {
        match self.chain_height() {
            0 => 0.0,
            height => self.included_uncles().len() as f64 / height as f64,
        }
    }

    /// Number of mined blocks which are neither on the main chain nor
    /// included as uncles.
    pub fn stale_blocks(&self) -> usize {
        let rewarded = self.chain_height() as usize + self.included_uncles().len();
        self.blocks_mined() - rewarded
    }
}
