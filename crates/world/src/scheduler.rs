//! Recurring-callback scheduling used to drive background maintenance.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Callback invoked on every timer tick.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Shortest interval a timer may use.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a registered recurring timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Registers named recurring callbacks.
pub trait Scheduler: Send + Sync {
    /// Run `callback` after `initial_delay`, then every `interval`.
    fn register_recurring(
        &self,
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        callback: TimerCallback,
    ) -> TimerId;

    /// Stop a timer. Returns false if it was not registered.
    fn unregister(&self, id: TimerId) -> bool;
}

/// Scheduler backed by tokio tasks: one spawned task per timer.
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerId, (String, AbortHandle)>>,
}

impl TokioScheduler {
    /// Spawn timers onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Bind to the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Names of the timers currently registered.
    pub fn active_timers(&self) -> Vec<String> {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = timers.values().map(|(name, _)| name.clone()).collect();
        names.sort();
        names
    }
}

impl Scheduler for TokioScheduler {
    fn register_recurring(
        &self,
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let interval = interval.max(MIN_INTERVAL);
        let timer_name = name.to_string();

        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                trace!(timer = %timer_name, "timer fired");
                callback();
            }
        });

        debug!(%id, name, ?initial_delay, ?interval, "registered recurring timer");
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (name.to_string(), task.abort_handle()));
        id
    }

    fn unregister(&self, id: TimerId) -> bool {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some((name, task)) => {
                task.abort();
                debug!(%id, name = %name, "unregistered timer");
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, (_, task)) in timers.drain() {
            task.abort();
        }
    }
}
