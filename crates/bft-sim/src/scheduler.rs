//! Virtual-time event queue
//!
//! Discrete-event core of the simulator. Events are delivered in order of
//! their scheduled time; events scheduled for the same instant are delivered
//! in the order they were scheduled.
//!
//! ```text
//!   schedule_at(30, A)   schedule_at(10, B)   schedule_at(10, C)
//!
//!   pop → (10, B)  pop → (10, C)  pop → (30, A)
//! ```
//!
//! Time is an opaque nanosecond counter. The queue never reads a wall clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Simulated time in nanoseconds
pub type SimTime = u64;

/// Queued event with its ordering keys
#[derive(Debug)]
struct Scheduled<E> {
    time: SimTime,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earlier time first, then lower sequence
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Counters of queue activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Events ever scheduled
    pub scheduled: u64,
    /// Events popped
    pub delivered: u64,
    /// Events scheduled in the past and clamped to `now`
    pub clamped: u64,
}

/// Min-heap of events keyed by (time, insertion sequence)
#[derive(Debug)]
pub struct EventQueue<E> {
    now: SimTime,
    next_seq: u64,
    heap: BinaryHeap<Scheduled<E>>,
    stats: QueueStats,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            heap: BinaryHeap::new(),
            stats: QueueStats::default(),
        }
    }

    /// Time of the last delivered event
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at absolute `time`.
    ///
    /// Time never runs backwards: a time before `now` is clamped to `now`.
    pub fn schedule_at(&mut self, time: SimTime, event: E) {
        let time = if time < self.now {
            self.stats.clamped += 1;
            self.now
        } else {
            time
        };
        self.heap.push(Scheduled {
            time,
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
        self.stats.scheduled += 1;
    }

    /// Schedule `event` `delay` nanoseconds after `now`.
    pub fn schedule_in(&mut self, delay: SimTime, event: E) {
        self.schedule_at(self.now.saturating_add(delay), event);
    }

    /// Next event, advancing `now` to its time.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        let next = self.heap.pop()?;
        self.now = next.time;
        self.stats.delivered += 1;
        Some((next.time, next.event))
    }

    /// Time of the next event without delivering it
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|s| s.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Drop all pending events; `now` is kept.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order() {
        let mut q = EventQueue::new();
        q.schedule_at(30, "c");
        q.schedule_at(10, "a");
        q.schedule_at(20, "b");

        assert_eq!(q.peek_time(), Some(10));
        assert_eq!(q.pop(), Some((10, "a")));
        assert_eq!(q.pop(), Some((20, "b")));
        assert_eq!(q.now(), 20);
        assert_eq!(q.pop(), Some((30, "c")));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_fifo_at_equal_time() {
        let mut q = EventQueue::new();
        for i in 0..5 {
            q.schedule_at(7, i);
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop()).map(|(_, e)| e).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_relative_schedule_and_clamp() {
        let mut q = EventQueue::new();
        q.schedule_at(100, 'x');
        q.pop();

        q.schedule_in(5, 'y');
        q.schedule_at(50, 'z');
        assert_eq!(q.stats().clamped, 1);

        // z was clamped to 100, before y at 105
        assert_eq!(q.pop(), Some((100, 'z')));
        assert_eq!(q.pop(), Some((105, 'y')));

        let stats = q.stats();
        assert_eq!(stats.scheduled, 3);
        assert_eq!(stats.delivered, 3);
    }

    #[test]
    fn test_clear_keeps_time() {
        let mut q = EventQueue::new();
        q.schedule_at(10, ());
        q.pop();
        q.schedule_in(1, ());
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.now(), 10);
    }
}
