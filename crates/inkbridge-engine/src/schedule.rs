//! Virtual event-loop clock.
//!
//! The engine never sleeps: hosts drive time forward with
//! [`Scheduler::advance`] and run whatever became due. "Next turn" tasks are
//! due immediately but only run on the following advance, which mirrors a
//! zero-delay timeout.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Pull the native selection into the model
    ResolveNativeSelection,
    /// Leave the applying-model-selection state
    LeaveApplyingSelection,
    /// Give focus back to the editable root after a selection write
    RestoreFocus,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    queue: Vec<(Duration, Task)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` after `delay` unless a run is already pending.
    ///
    /// Later requests inside the window never push the deadline back, so a
    /// continuous stream of requests still fires once per window.
    pub fn throttle(&mut self, task: Task, delay: Duration) {
        if !self.is_pending(task) {
            self.queue.push((self.now + delay, task));
        }
    }

    /// Schedule `task` for the next turn unless it is already pending
    pub fn next_turn(&mut self, task: Task) {
        if !self.is_pending(task) {
            self.queue.push((self.now, task));
        }
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.queue.iter().any(|(_, pending)| *pending == task)
    }

    /// Remove a pending `task`, returning whether there was one
    pub fn take(&mut self, task: Task) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(_, pending)| *pending != task);
        self.queue.len() != before
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Remove and return every task due by now, earliest first
    pub fn take_due(&mut self) -> Vec<Task> {
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.queue = pending;
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, task)| task).collect()
    }
}
