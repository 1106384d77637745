//! Timer queue for recurring editor tasks.
//!
//! Each registration gets a [`TimerKey`]. Scheduling a task cancels any
//! registration of the same task still pending, so a task can never be
//! queued twice.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Cancellation handle for a scheduled task.
    pub struct TimerKey;
}

#[derive(Clone, Copy, Debug)]
struct Timer<T> {
    task: T,
    due_ms: f64,
}

/// Pending tasks keyed by cancellation handle.
pub struct Timers<T> {
    timers: SlotMap<TimerKey, Timer<T>>,
}

impl<T: Copy + PartialEq> Timers<T> {
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
        }
    }

    /// Register `task` to fire at `due_ms`, replacing any pending
    /// registration of the same task.
    pub fn schedule(&mut self, task: T, due_ms: f64) -> TimerKey {
        self.cancel_task(task);
        self.timers.insert(Timer { task, due_ms })
    }

    /// Cancel one registration. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.timers.remove(key).is_some()
    }

    /// Cancel every pending registration of `task`.
    pub fn cancel_task(&mut self, task: T) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, t| t.task != task);
        before - self.timers.len()
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Number of pending registrations of `task`.
    pub fn pending(&self, task: T) -> usize {
        self.timers.values().filter(|t| t.task == task).count()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Remove and return the earliest task due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<T> {
        let (key, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .min_by(|(_, a), (_, b)| a.due_ms.total_cmp(&b.due_ms))?;
        self.timers.remove(key).map(|t| t.task)
    }
}

impl<T: Copy + PartialEq> Default for Timers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Task {
        A,
        B,
    }

    #[test]
    fn rescheduling_replaces_pending() {
        let mut timers = Timers::new();
        let first = timers.schedule(Task::A, 10.0);
        let second = timers.schedule(Task::A, 20.0);
        assert!(!timers.is_pending(first));
        assert!(timers.is_pending(second));
        assert_eq!(timers.pending(Task::A), 1);
    }

    #[test]
    fn pop_due_in_order() {
        let mut timers = Timers::new();
        timers.schedule(Task::B, 15.0);
        timers.schedule(Task::A, 5.0);
        assert_eq!(timers.pop_due(4.0), None);
        assert_eq!(timers.pop_due(20.0), Some(Task::A));
        assert_eq!(timers.pop_due(20.0), Some(Task::B));
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut timers = Timers::new();
        let key = timers.schedule(Task::A, 1.0);
        assert!(timers.cancel(key));
        assert!(!timers.cancel(key));
        assert_eq!(timers.cancel_task(Task::A), 0);
    }
}
