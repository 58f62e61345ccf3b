use std::{collections::HashMap, num::NonZeroUsize, time::Duration};

use crate::{
    latency::{LatencyError, LatencyModel, LatencySampler},
    miner::{HashRate, Miner, MinerId},
    reward::{Reward, DEFAULT_BLOCK_REWARD},
};

use super::{Simulation, SimulationGroup};

/// Simulated time per tick, unless otherwise specified.
pub const DEFAULT_TIMESTEP: Duration = Duration::from_millis(10);

/// Target average time between blocks, unless otherwise specified.
pub const DEFAULT_BLOCK_INTERVAL: Duration = Duration::from_secs(15);

/// Simulated time between balance snapshots, unless otherwise specified.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

/// Simulated time covered by a run, unless otherwise specified.
pub const DEFAULT_RUN_LENGTH: Duration = Duration::from_secs(3600);

/// Builds a [`SimulationGroup`].
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    pub block_interval: Option<Duration>,
    pub block_reward: Option<Reward>,
    pub repeat_all: Option<usize>,
    pub seed: Option<u64>,
    pub timestep: Option<Duration>,
    default_latency: Option<Box<dyn LatencySampler>>,
    links: Vec<(String, String, Box<dyn LatencySampler>)>,
    miners: Vec<(String, HashRate)>,
    run_length: Option<RunLength>,
    snapshot_interval: Option<Option<Duration>>,
}

#[derive(Debug, Clone, Copy)]
enum RunLength {
    Ticks(u64),
    Duration(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("no miners were added")]
    NoMinersGiven,
    #[error("miner {0:?} has hash rate {1}, which is not positive")]
    NonPositiveHashRate(String, HashRate),
    #[error("miner name {0:?} is used more than once")]
    DuplicateMinerName(String),
    #[error("latency given for unknown miner {0:?}")]
    UnknownMiner(String),
    #[error("latency given between miner {0:?} and itself")]
    SelfLink(String),
    #[error("number of simulation ticks must be greater than 0")]
    ZeroTicks,
    #[error("cannot repeat a simulation 0 times")]
    RepeatZero,
    #[error("timestep must be greater than 0")]
    ZeroTimestep,
    #[error("block interval must be greater than 0")]
    ZeroBlockInterval,
    #[error("block reward {0} is not a non-negative number")]
    InvalidBlockReward(Reward),
    #[error(transparent)]
    Latency(#[from] LatencyError),
}

impl SimulationBuilder {
    /// Creates a new [`SimulationBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a miner called `name` with the given hash rate to the simulation.
    /// Miners are assigned [`MinerId`]s in order of addition, starting at 1.
    pub fn add_miner<N: Into<String>>(mut self, name: N, hash_rate: HashRate) -> Self {
        self.miners.push((name.into(), hash_rate));

        self
    }

    /// Sample the propagation delay between the miners called `a` and `b`, in
    /// either direction, from `sampler`.
    pub fn latency<A, B, S>(mut self, a: A, b: B, sampler: S) -> Self
    where
        A: Into<String>,
        B: Into<String>,
        S: LatencySampler + 'static,
    {
        self.links.push((a.into(), b.into(), Box::new(sampler)));

        self
    }

    /// Sample the propagation delay between miners without a specific
    /// latency from `sampler` (a constant 0.2 seconds by default).
    pub fn default_latency<S: LatencySampler + 'static>(mut self, sampler: S) -> Self {
        self.default_latency = Some(Box::new(sampler));

        self
    }

    /// Sets the simulated time which passes in each tick (default 10ms).
    pub fn timestep(mut self, timestep: Duration) -> Self {
        self.timestep = Some(timestep);

        self
    }

    /// Sets the target average time between blocks (default 15s).
    pub fn block_interval(mut self, interval: Duration) -> Self {
        self.block_interval = Some(interval);

        self
    }

    /// Sets the reward for mining a block (default 3).
    pub fn block_reward(mut self, reward: Reward) -> Self {
        self.block_reward = Some(reward);

        self
    }

    /// Sets the number of ticks each run will last for.
    pub fn ticks(mut self, ticks: u64) -> Self {
        self.run_length = Some(RunLength::Ticks(ticks));

        self
    }

    /// Sets the simulated time each run will last for (default 1 hour). Runs
    /// last for the number of whole ticks which fit in `duration`.
    pub fn run_for(mut self, duration: Duration) -> Self {
        self.run_length = Some(RunLength::Duration(duration));

        self
    }

    /// Record every miner's tip once per `interval` of simulated time
    /// (default 60s).
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = Some(Some(interval));

        self
    }

    /// Don't record any snapshots.
    pub fn no_snapshots(mut self) -> Self {
        self.snapshot_interval = Some(None);

        self
    }

    /// Sets the seed from which the seed of every run is derived (default 0).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// The simulation will run `num` times, each with a different seed.
    pub fn repeat_all(mut self, num: usize) -> Self {
        self.repeat_all = Some(num);

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            block_interval,
            block_reward,
            repeat_all,
            seed,
            timestep,
            default_latency,
            links,
            miners,
            run_length,
            snapshot_interval,
        } = self;

        if miners.is_empty() {
            return Err(NoMinersGiven);
        }

        let mut ids = HashMap::new();
        for (i, (name, hash_rate)) in miners.iter().enumerate() {
            if !(hash_rate.is_finite() && *hash_rate > 0.0) {
                return Err(NonPositiveHashRate(name.clone(), *hash_rate));
            }
            if ids.insert(name.clone(), MinerId::from(i + 1)).is_some() {
                return Err(DuplicateMinerName(name.clone()));
            }
        }

        let mut latency = match default_latency {
            Some(sampler) => LatencyModel::new(sampler)?,
            None => LatencyModel::default(),
        };
        for (a, b, sampler) in links {
            let Some(&id_a) = ids.get(&a) else {
                return Err(UnknownMiner(a));
            };
            let Some(&id_b) = ids.get(&b) else {
                return Err(UnknownMiner(b));
            };
            if id_a == id_b {
                return Err(SelfLink(a));
            }

            latency.set(id_a, id_b, sampler)?;
        }

        let timestep = timestep.unwrap_or(DEFAULT_TIMESTEP);
        if timestep.is_zero() {
            return Err(ZeroTimestep);
        }
        let block_interval = block_interval.unwrap_or(DEFAULT_BLOCK_INTERVAL);
        if block_interval.is_zero() {
            return Err(ZeroBlockInterval);
        }
        let block_reward = block_reward.unwrap_or(DEFAULT_BLOCK_REWARD);
        if !(block_reward.is_finite() && block_reward >= 0.0) {
            return Err(InvalidBlockReward(block_reward));
        }

        let ticks = match run_length.unwrap_or(RunLength::Duration(DEFAULT_RUN_LENGTH)) {
            RunLength::Ticks(ticks) => ticks,
            RunLength::Duration(d) => (d.as_nanos() / timestep.as_nanos()) as u64,
        };
        if ticks == 0 {
            return Err(ZeroTicks);
        }

        let snapshot_every = snapshot_interval
            .unwrap_or(Some(DEFAULT_SNAPSHOT_INTERVAL))
            .filter(|interval| !interval.is_zero())
            .map(|interval| {
                let every = interval.as_secs_f64() / timestep.as_secs_f64();
                (every.round() as u64).max(1)
            });

        let repeat_all = NonZeroUsize::new(repeat_all.unwrap_or(1)).ok_or(RepeatZero)?;

        let miners = miners
            .into_iter()
            .enumerate()
            .map(|(i, (name, hash_rate))| Miner::new(MinerId::from(i + 1), name, hash_rate))
            .collect();

        Ok(SimulationGroup {
            simulation: Simulation {
                miners,
                latency,
                timestep,
                block_interval,
                block_reward,
                ticks,
                snapshot_every,
                seed: seed.unwrap_or_default(),
            },
            repeat_all,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{latency::LatencyError, probability::FloatDistribution};

    use super::{SimulationBuildError, SimulationBuilder};

    fn two_miners() -> SimulationBuilder {
        SimulationBuilder::new().add_miner("Alice", 30e6).add_miner("Bob", 20e6)
    }

    #[test]
    fn example_build() {
        let group = two_miners().build().expect("valid simulation build");
        let sim = &group.simulations()[0];

        assert_eq!(group.repeat_all(), 1);
        assert_eq!(sim.ticks(), 360_000);
        assert_eq!(sim.miners().len(), 2);
        assert_eq!(sim.miners()[1].name(), "Bob");
        assert_eq!(sim.miners()[1].id().get(), 2);
    }

    #[test]
    fn rejects_missing_miners() {
        assert!(matches!(
            SimulationBuilder::new().build(),
            Err(SimulationBuildError::NoMinersGiven)
        ));
    }

    #[test]
    fn rejects_bad_hash_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SimulationBuilder::new().add_miner("Alice", rate).build(),
                Err(SimulationBuildError::NonPositiveHashRate(_, _))
            ));
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        assert!(matches!(
            two_miners().add_miner("Alice", 1.0).build(),
            Err(SimulationBuildError::DuplicateMinerName(name)) if name == "Alice"
        ));
    }

    #[test]
    fn rejects_bad_latencies() {
        let fixed = FloatDistribution::constant(1.0);

        assert!(matches!(
            two_miners().latency("Alice", "Eve", fixed).build(),
            Err(SimulationBuildError::UnknownMiner(name)) if name == "Eve"
        ));
        assert!(matches!(
            two_miners().latency("Bob", "Bob", fixed).build(),
            Err(SimulationBuildError::SelfLink(_))
        ));
        assert!(matches!(
            two_miners()
                .latency("Alice", "Bob", FloatDistribution::constant(0.0))
                .build(),
            Err(SimulationBuildError::Latency(LatencyError::NonPositiveMean(_)))
        ));
        assert!(matches!(
            two_miners()
                .default_latency(FloatDistribution::constant(-0.2))
                .build(),
            Err(SimulationBuildError::Latency(_))
        ));
        assert!(matches!(
            two_miners()
                .default_latency(FloatDistribution::normal(1e20, 1.0).unwrap())
                .build(),
            Err(SimulationBuildError::Latency(LatencyError::MeanOutOfRange(_)))
        ));
    }

    #[test]
    fn rejects_zero_lengths() {
        use SimulationBuildError::*;

        assert!(matches!(two_miners().ticks(0).build(), Err(ZeroTicks)));
        assert!(matches!(
            two_miners().run_for(Duration::from_millis(5)).build(),
            Err(ZeroTicks)
        ));
        assert!(matches!(two_miners().repeat_all(0).build(), Err(RepeatZero)));
        assert!(matches!(
            two_miners().timestep(Duration::ZERO).build(),
            Err(ZeroTimestep)
        ));
        assert!(matches!(
            two_miners().block_interval(Duration::ZERO).build(),
            Err(ZeroBlockInterval)
        ));
        assert!(matches!(
            two_miners().block_reward(-3.0).build(),
            Err(InvalidBlockReward(_))
        ));
    }

    #[test]
    fn run_length_in_whole_ticks() {
        let group = two_miners()
            .timestep(Duration::from_millis(100))
            .run_for(Duration::from_millis(1_050))
            .build()
            .unwrap();

        assert_eq!(group.simulations()[0].ticks(), 10);
    }
}
