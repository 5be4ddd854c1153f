//! Scheduling of GTU events on the simulation clock.

use crate::{EventId, GtuId};
use slotmap::SlotMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// The simulation clock as seen by a GTU: the current time and cancellable future events.
pub trait Scheduler<E> {
    /// The current simulation time in s.
    fn now(&self) -> f64;

    /// Schedules an event at time `time`, which is moved to now if it lies in the past.
    fn schedule(&mut self, time: f64, event: E) -> EventId;

    /// Cancels a pending event, returning it if it had not fired yet.
    fn cancel(&mut self, id: EventId) -> Option<E>;
}

/// An event of the simulation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// Advance the GTU and generate its next plan.
    Replan(GtuId),
    /// All members of the GTU's platoon have completed their lane change.
    PlatoonLaneChangeComplete(GtuId),
}

/// A heap entry; earlier times first, then insertion order.
#[derive(Clone, Copy, Debug)]
struct Entry {
    time: f64,
    seq: u64,
    id: EventId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
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
        // Reversed, the heap is a max-heap
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A queue of events ordered by time. Events at the same time fire in the order they were
/// scheduled.
#[derive(Debug)]
pub struct EventQueue<E> {
    now: f64,
    seq: u64,
    events: SlotMap<EventId, (f64, E)>,
    heap: BinaryHeap<Entry>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            now: 0.0,
            seq: 0,
            events: SlotMap::with_key(),
            heap: BinaryHeap::new(),
        }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The time of the next pending event.
    pub fn peek_time(&mut self) -> Option<f64> {
        self.discard_cancelled();
        self.heap.peek().map(|entry| entry.time)
    }

    /// Removes the next event if it is due at or before `until`, and moves the clock to its time.
    pub fn pop_due(&mut self, until: f64) -> Option<(f64, E)> {
        self.discard_cancelled();
        let entry = self.heap.peek()?;
        if entry.time > until {
            return None;
        }
        let entry = self.heap.pop()?;
        let (time, event) = self.events.remove(entry.id)?;
        self.now = f64::max(self.now, time);
        Some((time, event))
    }

    /// Moves the clock forward without firing events.
    pub fn advance_to(&mut self, time: f64) {
        self.now = f64::max(self.now, time);
    }

    fn discard_cancelled(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.events.contains_key(entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<E> Scheduler<E> for EventQueue<E> {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, time: f64, event: E) -> EventId {
        let time = f64::max(time, self.now);
        let id = self.events.insert((time, event));
        self.heap.push(Entry {
            time,
            seq: self.seq,
            id,
        });
        self.seq += 1;
        id
    }

    fn cancel(&mut self, id: EventId) -> Option<E> {
        self.events.remove(id).map(|(_, event)| event)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_fire_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule(2.0, "b");
        queue.schedule(1.0, "a");
        queue.schedule(2.0, "c");
        assert_eq!(queue.pop_due(10.0), Some((1.0, "a")));
        assert_eq!(queue.now(), 1.0);
        assert_eq!(queue.pop_due(10.0), Some((2.0, "b")));
        assert_eq!(queue.pop_due(10.0), Some((2.0, "c")));
        assert_eq!(queue.pop_due(10.0), None);
    }

    #[test]
    fn not_due_until_time() {
        let mut queue = EventQueue::new();
        queue.schedule(5.0, ());
        assert_eq!(queue.pop_due(4.9), None);
        assert_eq!(queue.peek_time(), Some(5.0));
        assert_eq!(queue.pop_due(5.0), Some((5.0, ())));
    }

    #[test]
    fn cancelled_events_do_not_fire() {
        let mut queue = EventQueue::new();
        let stale = queue.schedule(1.0, 1);
        queue.schedule(2.0, 2);
        assert_eq!(queue.cancel(stale), Some(1));
        assert_eq!(queue.cancel(stale), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_time(), Some(2.0));
        assert_eq!(queue.pop_due(10.0), Some((2.0, 2)));
        assert!(queue.is_empty());
    }

    #[test]
    fn past_events_are_scheduled_now() {
        let mut queue = EventQueue::new();
        queue.advance_to(3.0);
        queue.schedule(1.0, ());
        assert_eq!(queue.pop_due(3.0), Some((3.0, ())));
    }
}
