//! A single miner's knowledge of the block DAG

use crate::{
    blockchain::{BlockId, BlockInsertionError, Blockchain, MAX_UNCLES},
    clock::Timestamp,
    miner::MinerId,
};

/// What a [`ChainView`] did with a block delivered to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arrival {
    /// The block is higher than the current tip and replaced it.
    Adopted,
    /// The block was added to the uncle candidate pool.
    Pooled,
    /// The block is stale or otherwise ineligible.
    Ignored,
}

/// The tip a miner currently mines on, along with the orphaned blocks it may
/// still cite as uncles.
#[derive(Debug, Clone)]
pub struct ChainView {
    tip: BlockId,
    /// Kept in the order the blocks arrived in.
    uncle_candidates: Vec<BlockId>,
}

impl ChainView {
    pub fn new(tip: BlockId) -> Self {
        ChainView { tip, uncle_candidates: vec![] }
    }

    pub fn tip(&self) -> BlockId {
        self.tip
    }

    pub fn uncle_candidates(&self) -> &[BlockId] {
        &self.uncle_candidates
    }

    /// Updates this view with a block mined by another miner.
    ///
    /// Longest chain wins; a block at the same height as the current tip never
    /// replaces it, so the first block seen at a height is kept.
    pub fn record_arrival(&mut self, chain: &Blockchain, block: BlockId) -> Arrival {
        if chain[block].height > chain[self.tip].height {
            self.tip = block;
            Arrival::Adopted
        } else if chain.is_eligible_uncle_of(block, self.tip) {
            self.uncle_candidates.push(block);
            Arrival::Pooled
        } else {
            Arrival::Ignored
        }
    }

    /// Drops every uncle candidate which can no longer be included on top of
    /// the current tip.
    pub fn prune_uncle_candidates(&mut self, chain: &Blockchain) {
        let tip = self.tip;
        self.uncle_candidates
            .retain(|&candidate| chain.is_eligible_uncle_of(candidate, tip));
    }

    /// Publishes a block mined by `producer` on top of the current tip, citing
    /// the earliest-pooled eligible uncle candidates. The new block becomes the
    /// tip and its ID is returned.
    pub fn extend(
        &mut self,
        chain: &mut Blockchain,
        producer: MinerId,
        timestamp: Timestamp,
    ) -> Result<BlockId, BlockInsertionError> {
        self.prune_uncle_candidates(chain);

        let take = self.uncle_candidates.len().min(MAX_UNCLES);
        let uncles: Vec<_> = self.uncle_candidates.drain(..take).collect();

        self.tip = chain.publish(self.tip, producer, uncles, timestamp)?;
        Ok(self.tip)
    }
}
