/*!
The block DAG shared by every miner in a simulation

Blocks live in an append-only arena ([`Blockchain`]) and refer to their parent
and uncles by [`BlockId`]. A block is never mutated after
[`Blockchain::publish`] returns, so any number of
[`ChainViews`](crate::chain_view::ChainView) can point into the same arena.
*/

use std::{collections::HashSet, ops::Index};

use thiserror::Error;

use crate::{
    clock::Timestamp,
    miner::MinerId,
    reward::{nephew_reward, uncle_reward, Balances, Reward, DEFAULT_BLOCK_REWARD},
};

/// Maximum number of uncles a single block may include.
pub const MAX_UNCLES: usize = 2;

/// Uncles must be within this many generations of the block they are checked
/// against.
pub const UNCLE_GENERATIONS: u64 = 6;

/// A mined block.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    /// Length of the path from this block to the genesis block.
    pub height: u64,
    /// The producer of this block. `None` only for the genesis block.
    pub miner: Option<MinerId>,
    /// `None` only for the genesis block.
    pub parent: Option<BlockId>,
    /// Near-miss blocks cited by this block, in the order they were included.
    pub uncles: Vec<BlockId>,
    /// Cumulative rewards as of and including this block.
    pub balances: Balances,
    /// Simulated time at which this block was discovered.
    pub timestamp: Timestamp,
}

/// Unique identifier of a [`Block`]. Corresponds to the block's position in
/// its [`Blockchain`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Returns the [`usize`] corresponding to this [`BlockId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Error)]
pub enum BlockInsertionError {
    #[error("parent block {0} was not found in this chain")]
    ParentNotFound(BlockId),
    #[error("uncle block {0} was not found in this chain")]
    UncleNotFound(BlockId),
    #[error("block includes {0} uncles, at most 2 are allowed")]
    TooManyUncles(usize),
    #[error("uncle block {0} is included more than once")]
    DuplicateUncle(BlockId),
    #[error("block {uncle} is not an eligible uncle of a child of block {parent}")]
    IneligibleUncle { uncle: BlockId, parent: BlockId },
}

/// Append-only arena holding every block mined during a simulation.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    block_reward: Reward,
    max_height: u64,
}

impl Blockchain {
    /// [`BlockId`] of the genesis block of every chain.
    pub const GENESIS: BlockId = BlockId(0);

    /// Creates a new blockchain containing only a genesis block, in which each
    /// new block pays `block_reward` to its producer.
    pub fn new(block_reward: Reward) -> Self {
        let genesis = Block {
            id: Self::GENESIS,
            height: 0,
            miner: None,
            parent: None,
            uncles: vec![],
            balances: Balances::new(),
            timestamp: Timestamp::zero(),
        };

        Blockchain { blocks: vec![genesis], block_reward, max_height: 0 }
    }

    pub fn block_reward(&self) -> Reward {
        self.block_reward
    }

    /// Maximum height of any block in the arena.
    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    /// Number of blocks in the arena, including the genesis block.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        id.0 < self.blocks.len()
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    /// Iterates over all blocks in the order they were published.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Returns the IDs of all blocks on the path from the genesis block to
    /// `id`, in ascending order of height and including `id`.
    ///
    /// ## Panics
    /// If a block with [`BlockId`] `id` is not present on the chain.
    pub fn ancestors_of(&self, id: BlockId) -> Vec<BlockId> {
        let mut ancestors = vec![id];

        let mut curr = &self[id];
        while let Some(parent) = curr.parent {
            ancestors.push(parent);
            curr = &self[parent];
        }

        ancestors.reverse();
        ancestors
    }

    /// Returns true iff `candidate` could be included as an uncle by a child
    /// of `head`.
    ///
    /// `candidate` must lie in the window `(head.height - 6, head.height]`,
    /// must not be an ancestor of `head` or already be included as an uncle
    /// by one, and must share its parent with the ancestor of `head` at the
    /// same height.
    ///
    /// ## Panics
    /// If either block is not present on the chain.
    pub fn is_eligible_uncle_of(&self, candidate: BlockId, head: BlockId) -> bool {
        let uncle = &self[candidate];
        let head = &self[head];

        if uncle.height > head.height
            || uncle.height + UNCLE_GENERATIONS < head.height
        {
            return false;
        }

        let mut curr = head;
        loop {
            if curr.id == uncle.id || curr.uncles.contains(&uncle.id) {
                return false;
            }
            if curr.height == uncle.height {
                break;
            }

            curr = match curr.parent {
                Some(parent) => &self[parent],
                None => unreachable!("block {} above genesis has no parent", curr.id),
            };
        }

        curr.parent == uncle.parent
    }

    /// Publishes a new block on top of `parent` which was mined by `miner` at
    /// `timestamp` and includes `uncles`. Returns the new block's ID.
    ///
    /// The new block's balances are its parent's balances plus the block
    /// reward for `miner`, a nephew reward for `miner` per uncle, and an uncle
    /// reward for the miner of each uncle.
    pub fn publish(
        &mut self,
        parent: BlockId,
        miner: MinerId,
        uncles: Vec<BlockId>,
        timestamp: Timestamp,
    ) -> Result<BlockId, BlockInsertionError> {
        use BlockInsertionError::*;

        let Some(parent_block) = self.get(parent) else {
            return Err(ParentNotFound(parent));
        };
        if uncles.len() > MAX_UNCLES {
            return Err(TooManyUncles(uncles.len()));
        }

        let mut seen = HashSet::new();
        for &uncle in uncles.iter() {
            if !self.contains(uncle) {
                return Err(UncleNotFound(uncle));
            }
            if !seen.insert(uncle) {
                return Err(DuplicateUncle(uncle));
            }
            if !self.is_eligible_uncle_of(uncle, parent) {
                return Err(IneligibleUncle { uncle, parent });
            }
        }

        let height = parent_block.height + 1;
        let mut balances = parent_block.balances.clone();
        balances.credit(miner, self.block_reward);
        for &uncle in uncles.iter() {
            let uncle = &self[uncle];
            let Some(uncle_miner) = uncle.miner else {
                unreachable!("eligible uncle {} has no miner", uncle.id)
            };

            balances.credit(miner, nephew_reward(self.block_reward));
            balances.credit(
                uncle_miner,
                uncle_reward(self.block_reward, height, uncle.height),
            );
        }

        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            id,
            height,
            miner: Some(miner),
            parent: Some(parent),
            uncles,
            balances,
            timestamp,
        });
        self.max_height = self.max_height.max(height);

        Ok(id)
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_REWARD)
    }
}

impl Index<BlockId> for Blockchain {
    type Output = Block;

    fn index(&self, index: BlockId) -> &Self::Output {
        &self.blocks[index.0]
    }
}

impl Index<&BlockId> for Blockchain {
    type Output = Block;

    fn index(&self, index: &BlockId) -> &Self::Output {
        &self.blocks[index.0]
    }
}

#[cfg(test)]
mod tests {
    use crate::{clock::Timestamp, miner::MinerId};

    use super::{BlockId, BlockInsertionError, Blockchain};

    const A: MinerId = MinerId(1);
    const B: MinerId = MinerId(2);

    fn extend(chain: &mut Blockchain, parent: BlockId, miner: MinerId, n: usize) -> Vec<BlockId> {
        let mut blocks = vec![];
        let mut tip = parent;
        for _ in 0..n {
            tip = chain.publish(tip, miner, vec![], Timestamp::zero()).unwrap();
            blocks.push(tip);
        }
        blocks
    }

    #[test]
    fn new_instance_has_only_genesis() {
        let chain = Blockchain::default();
        let genesis = &chain[Blockchain::GENESIS];

        assert_eq!(chain.num_blocks(), 1);
        assert_eq!(chain.max_height(), 0);
        assert_eq!(genesis.height, 0);
        assert!(genesis.miner.is_none() && genesis.parent.is_none());
        assert_eq!(genesis.balances.total(), 0.0);
    }

    #[test]
    fn publish_credits_block_reward() {
        let mut chain = Blockchain::new(3.0);
        let blocks = extend(&mut chain, Blockchain::GENESIS, A, 4);
        let tip = &chain[blocks[3]];

        assert_eq!(tip.height, 4);
        assert_eq!(tip.balances.get(A), 12.0);
        assert_eq!(chain.ancestors_of(tip.id).len(), 5);
        assert_eq!(chain.ancestors_of(tip.id)[0], Blockchain::GENESIS);
    }

    #[test]
    fn publish_credits_uncle_rewards() {
        let mut chain = Blockchain::new(3.0);
        let main = extend(&mut chain, Blockchain::GENESIS, A, 2);
        // Sibling of main[1]
        let uncle = extend(&mut chain, main[0], B, 1)[0];

        let nephew = chain
            .publish(main[1], A, vec![uncle], Timestamp::zero())
            .unwrap();
        let nephew = &chain[nephew];

        assert_eq!(nephew.height, 3);
        // B's block isn't an ancestor of the nephew, so B starts from zero
        assert_eq!(chain[main[1]].balances.get(B), 0.0);
        assert_eq!(nephew.balances.get(A), 6.0 + 3.0 + 3.0 / 32.0);
        assert_eq!(nephew.balances.get(B), (3 - 2 + 8) as f64 * 3.0 / 8.0);
    }

    #[test]
    fn eligibility_window() {
        let mut chain = Blockchain::default();
        let main = extend(&mut chain, Blockchain::GENESIS, A, 12);
        // Fork block at height 5, sibling of main[4]
        let fork = extend(&mut chain, main[3], B, 1)[0];
        assert_eq!(chain[fork].height, 5);

        // Heads at heights 5 through 11 accept the fork block
        for head in &main[4..=10] {
            assert!(chain.is_eligible_uncle_of(fork, *head));
        }
        // Height 12 is 7 generations past the fork block
        assert!(!chain.is_eligible_uncle_of(fork, main[11]));
        // Heads below the candidate
        assert!(!chain.is_eligible_uncle_of(fork, main[3]));
    }

    #[test]
    fn ancestors_are_not_uncles() {
        let mut chain = Blockchain::default();
        let main = extend(&mut chain, Blockchain::GENESIS, A, 5);

        for (i, &ancestor) in main.iter().enumerate() {
            assert!(!chain.is_eligible_uncle_of(ancestor, main[4]), "{i}");
        }
        assert!(!chain.is_eligible_uncle_of(Blockchain::GENESIS, main[4]));
    }

    #[test]
    fn unrelated_blocks_are_not_uncles() {
        let mut chain = Blockchain::default();
        let main = extend(&mut chain, Blockchain::GENESIS, A, 5);
        // Branches off at height 1, so its block at height 3 is a cousin of
        // main[2], not a sibling.
        let cousin = extend(&mut chain, main[0], B, 2)[1];

        assert_eq!(chain[cousin].height, 3);
        assert!(!chain.is_eligible_uncle_of(cousin, main[4]));
    }

    #[test]
    fn uncles_are_not_included_twice() {
        let mut chain = Blockchain::default();
        let main = extend(&mut chain, Blockchain::GENESIS, A, 2);
        let uncle = extend(&mut chain, main[0], B, 1)[0];
        assert!(chain.is_eligible_uncle_of(uncle, main[1]));

        let nephew = chain
            .publish(main[1], A, vec![uncle], Timestamp::zero())
            .unwrap();
        let next = extend(&mut chain, nephew, A, 1)[0];

        assert!(!chain.is_eligible_uncle_of(uncle, nephew));
        assert!(!chain.is_eligible_uncle_of(uncle, next));
        assert!(matches!(
            chain.publish(next, A, vec![uncle], Timestamp::zero()),
            Err(BlockInsertionError::IneligibleUncle { .. })
        ));
    }

    #[test]
    fn invalid_uncle_sets_are_rejected() {
        let mut chain = Blockchain::default();
        let main = extend(&mut chain, Blockchain::GENESIS, A, 2);
        let u1 = extend(&mut chain, main[0], B, 1)[0];
        let u2 = extend(&mut chain, main[0], B, 1)[0];
        let u3 = extend(&mut chain, main[0], B, 1)[0];

        assert!(matches!(
            chain.publish(main[1], A, vec![u1, u2, u3], Timestamp::zero()),
            Err(BlockInsertionError::TooManyUncles(3))
        ));
        assert!(matches!(
            chain.publish(main[1], A, vec![u1, u1], Timestamp::zero()),
            Err(BlockInsertionError::DuplicateUncle(_))
        ));
        assert!(matches!(
            chain.publish(main[1], A, vec![BlockId(99)], Timestamp::zero()),
            Err(BlockInsertionError::UncleNotFound(_))
        ));
        assert!(matches!(
            chain.publish(BlockId(99), A, vec![], Timestamp::zero()),
            Err(BlockInsertionError::ParentNotFound(_))
        ));
        // Failed insertions leave the arena untouched
        assert_eq!(chain.num_blocks(), 6);
        assert!(chain.publish(main[1], A, vec![u1, u2], Timestamp::zero()).is_ok());
    }
}
