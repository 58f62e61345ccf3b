/*!
Discrete-event simulator of proof-of-work mining with propagation latency,
forks and uncle rewards.

Each miner keeps its own view of a shared block DAG and mines on the highest
block it knows about. Blocks reach other miners after a sampled propagation
delay, so miners regularly fork. Orphaned blocks which are still recent may be
cited as uncles by later blocks, earning their miners a partial reward.
*/

pub mod blockchain;
pub mod chain_view;
pub mod clock;
pub mod config;
pub mod event_queue;
pub mod latency;
pub mod miner;
pub mod prelude;
pub mod probability;
pub mod results;
pub mod reward;
pub mod simulation;

pub(crate) mod utils;
