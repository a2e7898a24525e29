use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use lanfire_core::math::Vec3;
use lanfire_core::player::PlayerId;

/// Deferred world effect.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    /// Bring a dead player back at a spawn point.
    Respawn { player_id: PlayerId },
    /// Broadcast a flash detonation.
    Detonate { origin: Vec3, radius: f32 },
}

#[derive(Debug)]
struct Entry {
    due: u64,
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Min-heap of tasks keyed by due time (ms). Tasks due at the same instant
/// run in the order they were scheduled.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: u64, task: ScheduledTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, task }));
    }

    /// Earliest pending due time.
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    /// Remove and return the earliest task if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<ScheduledTask> {
        if self.next_due()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(e)| e.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
