use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chunkforge_world::{Scheduler, TimerCallback, TimerId};

/// A timer registered with [`ManualScheduler`].
#[derive(Clone)]
pub struct ManualTimer {
    /// Name given at registration.
    pub name: String,
    /// Requested delay before the first tick.
    pub initial_delay: Duration,
    /// Requested period.
    pub interval: Duration,
    callback: TimerCallback,
}

/// Scheduler that never fires on its own; tests call [`ManualScheduler::fire`].
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    timers: Mutex<BTreeMap<TimerId, ManualTimer>>,
    unregistered: Mutex<Vec<TimerId>>,
}

impl ManualScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live timer named `name` once. Returns how many ran.
    pub fn fire(&self, name: &str) -> usize {
        // Callbacks run outside the lock so they may touch the scheduler.
        let due: Vec<TimerCallback> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|timer| timer.name == name)
            .map(|timer| timer.callback.clone())
            .collect();
        for callback in &due {
            callback();
        }
        due.len()
    }

    /// Live timers in registration order.
    pub fn timers(&self) -> Vec<ManualTimer> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Whether a timer named `name` is live.
    pub fn is_registered(&self, name: &str) -> bool {
        self.timers().iter().any(|timer| timer.name == name)
    }

    /// Ids passed to `unregister`, in call order.
    pub fn unregistered(&self) -> Vec<TimerId> {
        self.unregistered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Scheduler for ManualScheduler {
    fn register_recurring(
        &self,
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let timer = ManualTimer {
            name: name.to_string(),
            initial_delay,
            interval,
            callback,
        };
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, timer);
        id
    }

    fn unregister(&self, id: TimerId) -> bool {
        self.unregistered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}
