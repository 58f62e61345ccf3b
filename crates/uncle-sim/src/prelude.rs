/*!
Re-export of common values and datatypes

Must be imported manually.

```
use uncle_sim::prelude::*;
```
*/

use crate::{
    blockchain, chain_view, clock, config, latency, miner, probability, results, reward,
    simulation,
};

pub use blockchain::{Block, BlockId, BlockInsertionError, Blockchain};

pub use chain_view::{Arrival, ChainView};

pub use clock::Timestamp;

pub use config::{ConfigError, RawConfig};

pub use latency::{LatencyError, LatencyModel, LatencySampler};

pub use miner::{HashRate, Miner, MinerId};

pub use probability::FloatDistribution;

pub use results::{Average, Format, ResultsBuilder, ResultsTable};

pub use reward::{Balances, Reward};

pub use simulation::{
    SimulationBuildError, SimulationBuilder, SimulationError, SimulationGroup,
    SimulationOutput,
};
