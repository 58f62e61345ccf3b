//! Time-ordered queue of pending block deliveries

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{blockchain::BlockId, clock::Timestamp, miner::MinerId};

/// Deliver `block` to the miner with ID `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delivery {
    pub target: MinerId,
    pub block: BlockId,
}

/// Min-priority queue of [`Delivery`] events keyed by due time. Events which
/// are due at the same time are popped in the order they were scheduled.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    scheduled: BinaryHeap<FutureEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Due time of the earliest pending event.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.scheduled.peek().map(|event| event.due)
    }

    pub fn schedule(&mut self, due: Timestamp, delivery: Delivery) {
        self.scheduled.push(FutureEvent { due, seq: self.next_seq, delivery });
        self.next_seq += 1;
    }

    /// Removes and returns the earliest event due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, Delivery)> {
        if self.next_due()? > now {
            return None;
        }

        self.scheduled.pop().map(|event| (event.due, event.delivery))
    }

    /// Removes every event due at or before `now`, in the order they should be
    /// delivered.
    pub fn drain_due(&mut self, now: Timestamp) -> DrainDue<'_> {
        DrainDue { queue: self, now }
    }
}

/// Iterator returned by [`EventQueue::drain_due`].
#[derive(Debug)]
pub struct DrainDue<'a> {
    queue: &'a mut EventQueue,
    now: Timestamp,
}

impl Iterator for DrainDue<'_> {
    type Item = (Timestamp, Delivery);

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_due(self.now)
    }
}

// Holds a Delivery, ordered by due time and then by scheduling order (both in
// reverse, since BinaryHeap is a max-heap)
#[derive(Debug, Clone)]
struct FutureEvent {
    due: Timestamp,
    seq: u64,
    delivery: Delivery,
}

impl FutureEvent {
    fn key(&self) -> Reverse<(Timestamp, u64)> {
        Reverse((self.due, self.seq))
    }
}

impl PartialEq for FutureEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FutureEvent {}

impl PartialOrd for FutureEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FutureEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{blockchain::BlockId, clock::Timestamp, miner::MinerId};

    use super::{Delivery, EventQueue};

    fn at(millis: u64) -> Timestamp {
        Duration::from_millis(millis).into()
    }

    fn delivery(block: usize) -> Delivery {
        Delivery { target: MinerId(1), block: BlockId(block) }
    }

    #[test]
    fn drains_only_due_events_in_time_order() {
        let mut queue = EventQueue::new();
        for (millis, block) in [(500, 0), (100, 1), (300, 2), (900, 3), (300, 4)] {
            queue.schedule(at(millis), delivery(block));
        }

        let drained: Vec<_> = queue.drain_due(at(500)).collect();
        let times: Vec<_> = drained.iter().map(|(due, _)| *due).collect();
        let blocks: Vec<_> = drained.iter().map(|(_, d)| d.block.get()).collect();

        assert_eq!(times, vec![at(100), at(300), at(300), at(500)]);
        // Ties keep scheduling order
        assert_eq!(blocks, vec![1, 2, 4, 0]);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(at(900)));
        assert!(queue.pop_due(at(899)).is_none());
    }

    #[test]
    fn drain_on_empty_queue() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.drain_due(at(1_000)).count(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn events_scheduled_between_drains() {
        let mut queue = EventQueue::new();
        queue.schedule(at(200), delivery(0));
        assert_eq!(queue.drain_due(at(100)).count(), 0);

        queue.schedule(at(150), delivery(1));
        let blocks: Vec<_> =
            queue.drain_due(at(200)).map(|(_, d)| d.block.get()).collect();

        assert_eq!(blocks, vec![1, 0]);
        assert!(queue.is_empty());
    }
}
