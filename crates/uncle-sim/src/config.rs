/*!
Serializable simulation parameters

A [`RawConfig`] mirrors the options of
[`SimulationBuilder`](crate::simulation::SimulationBuilder) in a form which
can be read from a file. Times are given in seconds.

```
use uncle_sim::config::{MinerConfig, RawConfig};

let config = RawConfig {
    seed: Some(7),
    duration: Some(60.0),
    miners: vec![MinerConfig { name: "Alice".into(), hash_rate: 30e6 }],
    ..Default::default()
};

let group = config.into_builder().unwrap().build().unwrap();
assert_eq!(group.simulations()[0].ticks(), 6_000);
```
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    latency::LatencyError,
    miner::HashRate,
    probability::FloatDistribution,
    reward::Reward,
    simulation::SimulationBuilder,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub seed: Option<u64>,
    /// Number of ticks in each run. Takes precedence over `duration`.
    pub ticks: Option<u64>,
    /// Simulated seconds in each run.
    pub duration: Option<f64>,
    pub timestep: Option<f64>,
    pub block_interval: Option<f64>,
    pub block_reward: Option<Reward>,
    /// Seconds between balance snapshots. `0` disables snapshots.
    pub snapshot_interval: Option<f64>,
    pub repeat: Option<usize>,
    pub default_latency: Option<LatencyConfig>,
    #[serde(default)]
    pub miners: Vec<MinerConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinerConfig {
    pub name: String,
    pub hash_rate: HashRate,
}

/// Latency between a pair of miners, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    pub miners: [String; 2],
    pub latency: LatencyConfig,
}

/// A latency distribution, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum LatencyConfig {
    Fixed { value: f64 },
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Exp { lambda: f64, scale: f64 },
}

impl TryFrom<LatencyConfig> for FloatDistribution {
    type Error = LatencyError;

    fn try_from(config: LatencyConfig) -> Result<Self, Self::Error> {
        match config {
            LatencyConfig::Fixed { value } => Ok(FloatDistribution::constant(value)),
            LatencyConfig::Normal { mean, std_dev } => FloatDistribution::normal(mean, std_dev),
            LatencyConfig::LogNormal { mu, sigma } => FloatDistribution::log_normal(mu, sigma),
            LatencyConfig::Exp { lambda, scale } => FloatDistribution::scaled_exp(lambda, scale),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a non-negative number of seconds (got {1})")]
    InvalidSeconds(&'static str, f64),
    #[error(transparent)]
    Latency(#[from] LatencyError),
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidSeconds(field, secs))
}

impl RawConfig {
    /// Converts this config into a [`SimulationBuilder`]. Only distribution
    /// parameters and times are checked here; everything else is validated
    /// by [`SimulationBuilder::build`].
    pub fn into_builder(self) -> Result<SimulationBuilder, ConfigError> {
        let mut builder = SimulationBuilder::new();

        for MinerConfig { name, hash_rate } in self.miners {
            builder = builder.add_miner(name, hash_rate);
        }
        for LinkConfig { miners: [a, b], latency } in self.links {
            builder = builder.latency(a, b, FloatDistribution::try_from(latency)?);
        }
        if let Some(latency) = self.default_latency {
            builder = builder.default_latency(FloatDistribution::try_from(latency)?);
        }

        if let Some(secs) = self.timestep {
            builder = builder.timestep(seconds("timestep", secs)?);
        }
        if let Some(secs) = self.block_interval {
            builder = builder.block_interval(seconds("block_interval", secs)?);
        }
        if let Some(reward) = self.block_reward {
            builder = builder.block_reward(reward);
        }

        match (self.ticks, self.duration) {
            (Some(ticks), _) => builder = builder.ticks(ticks),
            (None, Some(secs)) => builder = builder.run_for(seconds("duration", secs)?),
            (None, None) => (),
        }

        match self.snapshot_interval {
            Some(secs) if secs == 0.0 => builder = builder.no_snapshots(),
            Some(secs) => {
                builder = builder.snapshot_interval(seconds("snapshot_interval", secs)?)
            }
            None => (),
        }

        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        if let Some(repeat) = self.repeat {
            builder = builder.repeat_all(repeat);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::simulation::SimulationBuildError;

    use super::{ConfigError, LatencyConfig, RawConfig};

    const FOUR_MINERS: &str = r#"
        seed = 42
        duration = 120.0
        snapshot_interval = 0.0
        repeat = 2

        [default_latency]
        distribution = "fixed"
        value = 0.2

        [[miners]]
        name = "Alice"
        hash_rate = 30e6

        [[miners]]
        name = "Bob"
        hash_rate = 20e6

        [[miners]]
        name = "Charlie"
        hash_rate = 5e6

        [[miners]]
        name = "Duckworth Slowworthy"
        hash_rate = 30e6

        [[links]]
        miners = ["Alice", "Bob"]
        latency = { distribution = "fixed", value = 0.1 }

        [[links]]
        miners = ["Alice", "Duckworth Slowworthy"]
        latency = { distribution = "normal", mean = 105.0, std_dev = 15.0 }
    "#;

    #[test]
    fn parses_full_config() {
        let config: RawConfig = toml::from_str(FOUR_MINERS).unwrap();

        assert_eq!(config.seed, Some(42));
        assert_eq!(config.miners.len(), 4);
        assert_eq!(config.miners[3].name, "Duckworth Slowworthy");
        assert_eq!(
            config.links[1].latency,
            LatencyConfig::Normal { mean: 105.0, std_dev: 15.0 }
        );
        assert_eq!(config.default_latency, Some(LatencyConfig::Fixed { value: 0.2 }));

        let group = config.into_builder().unwrap().build().unwrap();
        let sims = group.simulations();
        assert_eq!(sims.len(), 2);
        assert_eq!(sims[0].ticks(), 12_000);
        assert_eq!(sims[0].miners()[1].name(), "Bob");
    }

    #[test]
    fn latency_distributions() {
        let parse = |s: &str| toml::from_str::<LatencyConfig>(s).unwrap();

        assert_eq!(
            parse("distribution = \"log_normal\"\nmu = 0.0\nsigma = 1.0"),
            LatencyConfig::LogNormal { mu: 0.0, sigma: 1.0 }
        );
        assert_eq!(
            parse("distribution = \"exp\"\nlambda = 2.0\nscale = 0.5"),
            LatencyConfig::Exp { lambda: 2.0, scale: 0.5 }
        );
        assert!(toml::from_str::<LatencyConfig>("distribution = \"gamma\"").is_err());
    }

    #[test]
    fn ticks_take_precedence() {
        let config = RawConfig { ticks: Some(50), duration: Some(600.0), ..short_config() };
        let group = config.into_builder().unwrap().build().unwrap();

        assert_eq!(group.simulations()[0].ticks(), 50);
    }

    #[test]
    fn invalid_values() {
        let config = RawConfig { timestep: Some(-0.01), ..short_config() };
        assert!(matches!(
            config.into_builder(),
            Err(ConfigError::InvalidSeconds("timestep", _))
        ));

        let mut config = short_config();
        config.default_latency = Some(LatencyConfig::Exp { lambda: -1.0, scale: 1.0 });
        assert!(matches!(config.into_builder(), Err(ConfigError::Latency(_))));

        // Left for the builder to reject
        let config = RawConfig { repeat: Some(0), ..short_config() };
        assert!(matches!(
            config.into_builder().unwrap().build(),
            Err(SimulationBuildError::RepeatZero)
        ));
        let config = RawConfig { block_interval: Some(0.0), ..short_config() };
        assert!(matches!(
            config.into_builder().unwrap().build(),
            Err(SimulationBuildError::ZeroBlockInterval)
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<RawConfig>("seeed = 1").is_err());
    }

    fn short_config() -> RawConfig {
        let mut config: RawConfig = toml::from_str(FOUR_MINERS).unwrap();
        config.duration = Some(10.0);
        config.repeat = None;
        config
    }

    #[test]
    fn snapshot_interval_in_seconds() {
        let config = RawConfig { snapshot_interval: Some(30.0), ..short_config() };
        let output = config
            .into_builder()
            .unwrap()
            .run_for(Duration::from_secs(90))
            .build()
            .unwrap()
            .simulations()
            .remove(0)
            .run()
            .unwrap();

        assert_eq!(output.snapshots.len(), 3);
    }
}
