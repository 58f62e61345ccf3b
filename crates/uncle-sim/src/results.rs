/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

## Examples

Creating a [`ResultsTable`] after running a simulation group:

```
use std::time::Duration;

use uncle_sim::prelude::*;

let sim = SimulationBuilder::new()
    .add_miner("Alice", 30e6)
    .add_miner("Bob", 20e6)
    .latency("Alice", "Bob", FloatDistribution::constant(0.1))
    .run_for(Duration::from_secs(600))
    .repeat_all(3)
    .build()
    .unwrap();

let results_builder = sim.run_all().unwrap();

let results = results_builder
    .average(Average::Median) // Take the median of repeated simulations' results
    .balances()               // Include each miner's balance on the main chain
    .uncle_rate()
    .format(Format::CSV)      // Output results as CSV
    .build();

println!("{}", results);
```

# Aggregating Results
Columns which describe the configuration of a simulation (hash shares,
constants, simulated ticks) are the same for every repeated run and are
reported once. Every other column is aggregated with the chosen [`Average`].
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    miner::MinerId,
    simulation::SimulationOutput,
    utils::{median_of_floats, wrap, WrapFunc},
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Typically produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<SimulationOutput>,
    format: Format,
    repeated: NonZeroUsize,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`].
    pub(crate) fn new(data: Vec<SimulationOutput>, repeated: NonZeroUsize) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    /// Include every built-in column: miner names, balances, main chain
    /// blocks and uncles, chain height, blocks mined, uncle rate, stale blocks
    /// and simulated ticks.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.names()
            .balances()
            .main_chain_blocks()
            .uncles()
            .chain_height()
            .blocks_mined()
            .uncle_rate()
            .stale_blocks()
            .ticks()
    }

    /// Average the results of repeated simulations based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Include a "Miner `X` Balance" column for each miner `X`, giving its
    /// balance as of the canonical tip.
    pub fn balances(mut self) -> Self {
        for miner_id in self.miner_ids() {
            self.columns.insert(Column::Balance(miner_id));
        }

        self
    }

    /// Include the "Blocks Mined" column in the results table.
    pub fn blocks_mined(mut self) -> Self {
        self.columns.insert(Column::BlocksMined);

        self
    }

    /// Include the "Chain Height" column in the results table.
    pub fn chain_height(mut self) -> Self {
        self.columns.insert(Column::ChainHeight);

        self
    }

    /// Include a column with title `title` which only contains the given
    /// value.
    pub fn constant<T>(mut self, title: T, value: f64) -> Self
    where
        T: Into<String>,
    {
        self.columns.insert(Column::Constant(wrap!(title, move |_| value)));

        self
    }

    /// Extract the raw [`SimulationOutput`] data from this [`ResultsBuilder`].
    /// Useful for running custom statistical analysis.
    ///
    /// # Ordering
    /// Repeated runs are in the order of their derived seeds.
    pub fn data(self) -> Vec<SimulationOutput> {
        self.data
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Use the hash share of the miner with ID `miner_id` as input to `func`,
    /// and present the output in a table column with the given title.
    pub fn hash_share_func<T, F>(mut self, miner_id: MinerId, title: T, func: F) -> Self
    where
        T: Into<String>,
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.columns
            .insert(Column::HashShareFunction(miner_id, wrap!(title, func)));

        self
    }

    /// Include a "Miner `X` Main Chain Blocks" column for each miner `X`.
    pub fn main_chain_blocks(mut self) -> Self {
        for miner_id in self.miner_ids() {
            self.columns.insert(Column::MainChainBlocks(miner_id));
        }

        self
    }

    /// Include a "Miner `X` Name" column for each miner `X`.
    pub fn names(mut self) -> Self {
        for miner_id in self.miner_ids() {
            self.columns.insert(Column::Name(miner_id));
        }

        self
    }

    /// Include the "Stale Blocks" column in the results table.
    pub fn stale_blocks(mut self) -> Self {
        self.columns.insert(Column::StaleBlocks);

        self
    }

    /// Include the "Simulated Ticks" column in the results table.
    pub fn ticks(mut self) -> Self {
        self.columns.insert(Column::Ticks);

        self
    }

    /// Include the "Uncle Rate" column in the results table.
    pub fn uncle_rate(mut self) -> Self {
        self.columns.insert(Column::UncleRate);

        self
    }

    /// Include a "Miner `X` Uncles" column for each miner `X`, counting its
    /// blocks which were included as uncles on the main chain.
    pub fn uncles(mut self) -> Self {
        for miner_id in self.miner_ids() {
            self.columns.insert(Column::Uncles(miner_id));
        }

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let ResultsBuilder { average, mut columns, data, format, repeated } = self;

        let num_miners = data[0].miners.len();
        for miner_id in 1..=num_miners {
            columns.insert(Column::HashShare(miner_id.into()));
        }

        if average != Average::None {
            columns.insert(Column::AverageOf(average));
        }

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => data
                .iter()
                .map(|output| {
                    column_iter(&columns).map(|col| col.get_value(output)).collect()
                })
                .collect(),
            _ => data
                .chunks(repeated.get())
                .map(|outputs| {
                    column_iter(&columns)
                        .map(|col| col.get_average_value(average, outputs))
                        .collect()
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }

    fn miner_ids(&self) -> impl Iterator<Item = MinerId> {
        (1..=self.data[0].miners.len()).map(MinerId::from)
    }
}

#[cfg(feature = "rayon")]
fn column_iter(columns: &[Column]) -> rayon::slice::Iter<'_, Column> {
    columns.par_iter()
}

#[cfg(not(feature = "rayon"))]
fn column_iter(columns: &[Column]) -> std::slice::Iter<'_, Column> {
    columns.iter()
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
#[derive(Debug, Clone)]
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// Number of data rows, not counting the title row.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles: Vec<_> = self.columns.iter().map(Column::to_string).collect();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> = row.iter().map(ColumnValue::to_string).collect();
                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> = titles.iter().map(String::len).collect();
                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        text_widths[i] = text_widths[i].max(val.to_string().len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
                    write!(f, " {:1$} {2}", title, text_widths[i], Self::SEPARATOR_VERTICAL)?;
                }
                writeln!(f)?;

                let total_width: usize = text_widths.iter().map(|x| x + 3).sum();
                let rule = Self::SEPARATOR_HORIZONTAL.to_string().repeat(total_width);
                write!(f, "{rule}")?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Methods of extracting an average/central value from a set of repeated
/// simulations.
///
/// In the process of creating an results table, the given averaging method is
/// only applied to the values of columns which change between runs.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    Name(MinerId),
    HashShare(MinerId),
    Balance(MinerId),
    MainChainBlocks(MinerId),
    Uncles(MinerId),
    HashShareFunction(MinerId, WrapFunc<f64, f64>),
    Constant(WrapFunc<(), f64>),
    Ticks,
    AverageOf(Average),
    ChainHeight,
    BlocksMined,
    UncleRate,
    StaleBlocks,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone)]
enum ColumnValue {
    Text(String),
    Int(u64),
    Float(f64),
}

impl Column {
    /// Describes the configuration of a simulation rather than its outcome.
    fn is_fixed(&self) -> bool {
        matches!(
            self,
            Self::Name(_)
                | Self::HashShare(_)
                | Self::HashShareFunction(_, _)
                | Self::Constant(_)
                | Self::Ticks
        )
    }

    fn get_value(&self, output: &SimulationOutput) -> ColumnValue {
        use ColumnValue::*;

        match self {
            Self::Name(miner_id) => Text(output.miner(*miner_id).name().to_owned()),
            Self::Ticks => Int(output.ticks),
            Self::AverageOf(_) => unreachable!(
                "never need the single value of the average descriptor column"
            ),
            _ => Float(self.get_float(output)),
        }
    }

    fn get_float(&self, output: &SimulationOutput) -> f64 {
        match self {
            Self::HashShare(miner_id) => output.hash_share_of(*miner_id),
            Self::Balance(miner_id) => output.balance_of(*miner_id),
            Self::MainChainBlocks(miner_id) => output.main_chain_blocks_of(*miner_id) as f64,
            Self::Uncles(miner_id) => output.uncles_of(*miner_id) as f64,
            Self::HashShareFunction(miner_id, func) => {
                func.call(output.hash_share_of(*miner_id))
            }
            Self::Constant(func) => func.call(()),
            Self::Ticks => output.ticks as f64,
            Self::ChainHeight => output.chain_height() as f64,
            Self::BlocksMined => output.blocks_mined() as f64,
            Self::UncleRate => output.uncle_rate(),
            Self::StaleBlocks => output.stale_blocks() as f64,
            Self::Name(_) | Self::AverageOf(_) => {
                unreachable!("column {self} has no numeric value")
            }
        }
    }

    fn get_average_value(&self, method: Average, data: &[SimulationOutput]) -> ColumnValue {
        if let Self::AverageOf(_) = self {
            return ColumnValue::Int(data.len() as u64);
        }
        if self.is_fixed() {
            return self.get_value(&data[0]);
        }

        let vls: Vec<_> = data.iter().map(|output| self.get_float(output)).collect();
        let avg = match method {
            Average::Mean => vls.iter().sum::<f64>() / vls.len() as f64,
            Average::Median => median_of_floats(vls),
            Average::Max => vls.into_iter().fold(f64::NEG_INFINITY, f64::max),
            Average::Min => vls.into_iter().fold(f64::INFINITY, f64::min),
            Average::None => unreachable!("averaging with Average::None"),
        };

        ColumnValue::Float(avg)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(miner_id) => write!(f, "Miner {miner_id} Name"),
            Self::HashShare(miner_id) => write!(f, "Miner {miner_id} Hash Share"),
            Self::Balance(miner_id) => write!(f, "Miner {miner_id} Balance"),
            Self::MainChainBlocks(miner_id) => {
                write!(f, "Miner {miner_id} Main Chain Blocks")
            }
            Self::Uncles(miner_id) => write!(f, "Miner {miner_id} Uncles"),
            Self::HashShareFunction(_, func) => write!(f, "{}", func.name()),
            Self::Constant(func) => write!(f, "{}", func.name()),
            Self::Ticks => write!(f, "Simulated Ticks"),
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => unreachable!(),
            },
            Self::ChainHeight => write!(f, "Chain Height"),
            Self::BlocksMined => write!(f, "Blocks Mined"),
            Self::UncleRate => write!(f, "Uncle Rate"),
            Self::StaleBlocks => write!(f, "Stale Blocks"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Int(num) => write!(f, "{num}"),
            Self::Float(num) => write!(f, "{:.1$}", num, FLOAT_PRECISION_DIGITS),
        }
    }
}
