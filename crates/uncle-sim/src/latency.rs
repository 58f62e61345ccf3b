/*!
Block propagation delays between miners

A [`LatencyModel`] maps each unordered pair of miners to a [`LatencySampler`],
which is drawn from every time a block is sent between them. Pairs without a
sampler of their own use the model's default.

# Examples
A custom sampler which is fast most of the time, but occasionally stalls.

```
use rand::{Rng, RngCore};
use uncle_sim::prelude::*;

#[derive(Debug, Clone)]
struct Stalling {
    fast: f64,
    stall: f64,
    stall_probability: f64,
}

impl LatencySampler for Stalling {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        if rng.gen_bool(self.stall_probability) {
            self.stall
        } else {
            self.fast
        }
    }

    fn mean(&self) -> f64 {
        self.fast + self.stall_probability * (self.stall - self.fast)
    }
}

let model = LatencyModel::new(Box::new(Stalling {
    fast: 0.1,
    stall: 30.0,
    stall_probability: 0.01,
}));
assert!(model.is_ok());
```
*/

use std::{collections::HashMap, fmt::Debug, time::Duration};

use rand::RngCore;
use rand_distr::Distribution;

use crate::{miner::MinerId, probability::FloatDistribution};

/// Delay, in seconds, used between miners without a configured sampler.
pub const DEFAULT_LATENCY_SECS: f64 = 0.2;

/// Source of propagation delay samples between two miners.
pub trait LatencySampler: Debug + dyn_clone::DynClone + Send + Sync {
    /// Draws a propagation delay, in seconds.
    fn sample(&self, rng: &mut dyn RngCore) -> f64;

    /// Expected propagation delay, in seconds. Must be positive.
    fn mean(&self) -> f64;
}

dyn_clone::clone_trait_object!(LatencySampler);

impl LatencySampler for FloatDistribution {
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        Distribution::sample(self, rng)
    }

    fn mean(&self) -> f64 {
        FloatDistribution::mean(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LatencyError {
    #[error("latency must have a positive, finite mean (got {0})")]
    NonPositiveMean(f64),
    #[error("latency mean of {0} seconds is too large")]
    MeanOutOfRange(f64),
    #[error("invalid normal distribution")]
    Normal(#[from] rand_distr::NormalError),
    #[error("invalid exponential distribution")]
    Exp(#[from] rand_distr::ExpError),
}

/// Symmetric table of propagation delay samplers between pairs of miners.
#[derive(Debug, Clone)]
pub struct LatencyModel {
    default: Box<dyn LatencySampler>,
    links: HashMap<(MinerId, MinerId), Box<dyn LatencySampler>>,
}

fn validate(sampler: &dyn LatencySampler) -> Result<(), LatencyError> {
    let mean = sampler.mean();
    if !(mean.is_finite() && mean > 0.0) {
        return Err(LatencyError::NonPositiveMean(mean));
    }
    match Duration::try_from_secs_f64(mean) {
        Ok(_) => Ok(()),
        Err(_) => Err(LatencyError::MeanOutOfRange(mean)),
    }
}

#[inline]
fn key(a: MinerId, b: MinerId) -> (MinerId, MinerId) {
    (a.min(b), a.max(b))
}

impl LatencyModel {
    /// Creates a model in which every pair of miners uses `default`.
    pub fn new(default: Box<dyn LatencySampler>) -> Result<Self, LatencyError> {
        validate(default.as_ref())?;

        Ok(LatencyModel { default, links: HashMap::new() })
    }

    /// Uses `sampler` for blocks sent in either direction between `a` and
    /// `b`, replacing any sampler previously set for the pair.
    pub fn set(
        &mut self,
        a: MinerId,
        b: MinerId,
        sampler: Box<dyn LatencySampler>,
    ) -> Result<(), LatencyError> {
        validate(sampler.as_ref())?;
        self.links.insert(key(a, b), sampler);

        Ok(())
    }

    /// Returns the sampler used between `a` and `b`.
    pub fn sampler(&self, a: MinerId, b: MinerId) -> &dyn LatencySampler {
        self.links.get(&key(a, b)).unwrap_or(&self.default).as_ref()
    }

    /// Draws the delay for a block sent from `from` to `to`. Delivery to
    /// oneself is instant, and negative samples are treated as no delay.
    /// Samples too large for a [`Duration`] become [`Duration::MAX`].
    pub fn sample(&self, from: MinerId, to: MinerId, rng: &mut dyn RngCore) -> Duration {
        if from == to {
            return Duration::ZERO;
        }

        let secs = self.sampler(from, to).sample(rng);
        if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        }
    }
}

impl Default for LatencyModel {
    fn default() -> Self {
        LatencyModel {
            default: Box::new(FloatDistribution::constant(DEFAULT_LATENCY_SECS)),
            links: HashMap::new(),
        }
    }
}
