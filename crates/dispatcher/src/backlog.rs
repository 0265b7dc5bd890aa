//! Backlog - accepted events from background workers, delivered in submission order

use std::collections::{BTreeMap, VecDeque};

use contracts::Event;

/// Reorder buffer in front of a FIFO of deliverable events
///
/// Every background submission reserves a sequence number. A completion is
/// held until all lower sequence numbers have completed; rejected
/// submissions complete with `None` and only advance the cursor.
#[derive(Debug, Default)]
pub struct Backlog {
    next_seq: u64,
    next_delivery: u64,
    held: BTreeMap<u64, Option<Event>>,
    ready: VecDeque<Event>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next sequence number
    pub fn reserve(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Record the outcome of submission `seq`
    pub fn complete(&mut self, seq: u64, event: Option<Event>) {
        debug_assert!(seq >= self.next_delivery && seq < self.next_seq);
        self.held.insert(seq, event);

        while let Some(outcome) = self.held.remove(&self.next_delivery) {
            self.next_delivery += 1;
            if let Some(event) = outcome {
                self.ready.push_back(event);
            }
        }
    }

    /// Next deliverable event
    pub fn pop(&mut self) -> Option<Event> {
        self.ready.pop_front()
    }

    /// All deliverable events
    pub fn drain(&mut self) -> Vec<Event> {
        self.ready.drain(..).collect()
    }

    /// Events ready for delivery
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Completions waiting on an earlier submission
    #[cfg(test)]
    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    /// Submissions not yet completed
    #[cfg(test)]
    pub fn outstanding(&self) -> usize {
        (self.next_seq - self.next_delivery) as usize - self.held.len()
    }

    /// Submissions not yet delivered or dropped
    pub fn pending(&self) -> usize {
        (self.next_seq - self.next_delivery) as usize + self.ready.len()
    }
}
