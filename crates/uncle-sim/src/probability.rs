//! Distributions used to sample propagation delays

use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal};

use crate::latency::LatencyError;

/// A distribution over floating point values with a known mean.
#[derive(Debug, Clone, Copy)]
pub enum FloatDistribution {
    Normal { dist: Normal<f64>, mean: f64 },
    ScaledExp { dist: Exp<f64>, lambda: f64, scale: f64 },
    LogNormal { dist: LogNormal<f64>, mu: f64, sigma: f64 },
    Constant(Constant<f64>),
}

impl FloatDistribution {
    pub fn normal(mean: f64, std_dev: f64) -> Result<Self, LatencyError> {
        Ok(Self::Normal { dist: Normal::new(mean, std_dev)?, mean })
    }

    pub fn scaled_exp(lambda: f64, scale: f64) -> Result<Self, LatencyError> {
        Ok(Self::ScaledExp { dist: Exp::new(lambda)?, lambda, scale })
    }

    pub fn log_normal(mu: f64, sigma: f64) -> Result<Self, LatencyError> {
        Ok(Self::LogNormal { dist: LogNormal::new(mu, sigma)?, mu, sigma })
    }

    pub fn constant(value: f64) -> Self {
        Self::Constant(Constant::new(value))
    }

    /// Expected value of this distribution.
    pub fn mean(&self) -> f64 {
        match self {
            Self::Normal { mean, .. } => *mean,
            Self::ScaledExp { lambda, scale, .. } => scale / lambda,
            Self::LogNormal { mu, sigma, .. } => (mu + sigma * sigma / 2.0).exp(),
            Self::Constant(d) => d.0,
        }
    }
}

impl Distribution<f64> for FloatDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Normal { dist, .. } => dist.sample(rng),
            Self::ScaledExp { dist, scale, .. } => dist.sample(rng) * scale,
            Self::LogNormal { dist, .. } => dist.sample(rng),
            Self::Constant(d) => d.sample(rng),
        }
    }
}

/// Degenerate distribution which always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct Constant<T>(T);

impl<T> Constant<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T: Clone> Distribution<T> for Constant<T> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let _ = rng;
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;
    use rand_distr::Distribution;

    use super::FloatDistribution;

    #[test]
    fn means() {
        assert_eq!(FloatDistribution::constant(0.1).mean(), 0.1);
        assert_eq!(FloatDistribution::normal(105.0, 15.0).unwrap().mean(), 105.0);
        assert_eq!(FloatDistribution::scaled_exp(2.0, 3.0).unwrap().mean(), 1.5);
        assert_eq!(FloatDistribution::log_normal(0.0, 0.0).unwrap().mean(), 1.0);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(FloatDistribution::normal(1.0, f64::NAN).is_err());
        assert!(FloatDistribution::scaled_exp(-1.0, 1.0).is_err());
        assert!(FloatDistribution::log_normal(0.0, f64::NAN).is_err());
    }

    #[test]
    fn sample_mean_converges() {
        let mut rng = ChaChaRng::seed_from_u64(0);
        let dist = FloatDistribution::normal(0.2, 0.1).unwrap();

        let n = 100_000;
        let mean = (0..n).map(|_| dist.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 0.2).abs() < 0.005, "sample mean {mean}");
    }
}
