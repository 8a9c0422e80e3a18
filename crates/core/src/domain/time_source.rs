// Duration Sources - deterministic or sampled

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::time::Duration;

/// A source of integer durations.
///
/// Deterministic instances use `Constant`; stochastic instances draw from
/// the engine-owned seeded RNG, so runs stay reproducible as long as the
/// sampling order is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    Constant(Duration),
    /// Uniform over the inclusive range [low, high]
    Uniform { low: Duration, high: Duration },
}

impl TimeSource {
    pub fn constant(value: Duration) -> Self {
        TimeSource::Constant(value)
    }

    /// Draw one duration. Constant sources never touch the RNG.
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            TimeSource::Constant(value) => *value,
            TimeSource::Uniform { low, high } => rng.gen_range(*low..=*high),
        }
    }

    /// Expected value, used for lower-bound computation.
    pub fn expected(&self) -> Duration {
        match self {
            TimeSource::Constant(value) => *value,
            TimeSource::Uniform { low, high } => (low + high) / 2,
        }
    }
}
