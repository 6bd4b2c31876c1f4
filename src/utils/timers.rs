//! Keyed timers evaluated against injected time
//!
//! A `TimerSet` never fires on its own; the owner asks for due timers with
//! [`TimerSet::pop_due`] from its event loop.

use std::fmt::Debug;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Timer<K> {
    key: K,
    deadline: Duration,
    period: Option<Duration>,
    /// Scheduling order, breaks deadline ties
    seq: u64,
}

/// One-shot and repeating timers addressed by key
#[derive(Debug, Clone)]
pub struct TimerSet<K> {
    timers: Vec<Timer<K>>,
    next_seq: u64,
}

impl<K: Copy + Eq + Debug> TimerSet<K> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_seq: 0,
        }
    }

    /// Arm a one-shot timer, replacing any timer with the same key
    pub fn schedule_once(&mut self, key: K, now: Duration, delay: Duration) {
        self.insert(key, now + delay, None);
    }

    /// Arm a repeating timer, replacing any timer with the same key
    ///
    /// A zero period is treated as one millisecond.
    pub fn schedule_repeating(&mut self, key: K, now: Duration, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        self.insert(key, now + period, Some(period));
    }

    fn insert(&mut self, key: K, deadline: Duration, period: Option<Duration>) {
        self.cancel(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer {
            key,
            deadline,
            period,
            seq,
        });
    }

    /// Cancel a timer; returns whether it was armed
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.key != key);
        self.timers.len() != before
    }

    /// Cancel every timer
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.timers.iter().any(|t| t.key == key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Take the earliest timer due at `now`
    ///
    /// Returns the key and the deadline it was due at. Repeating timers are
    /// re-armed one period after that deadline and keep their tie-break
    /// position, so calling this in a loop replays every missed tick in
    /// chronological order.
    pub fn pop_due(&mut self, now: Duration) -> Option<(K, Duration)> {
        let pos = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.seq))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[pos];
        let key = timer.key;
        let deadline = timer.deadline;

        match timer.period {
            Some(period) => timer.deadline = deadline + period,
            None => {
                self.timers.swap_remove(pos);
            }
        }

        Some((key, deadline))
    }
}

impl<K: Copy + Eq + Debug> Default for TimerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}
