//! Concurrent, self-expiring store of generated chunks keyed by origin.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::chunk::{ChunkEntity, ChunkOrigin};
use crate::config::CacheConfig;
use crate::scheduler::{Scheduler, TimerId};

/// Timer name the sweep registers under.
pub const SWEEP_TIMER_NAME: &str = "chunk-cache-sweep";

struct CacheEntry {
    chunk: Arc<ChunkEntity>,
    /// Nanoseconds since the cache epoch.
    last_access: AtomicU64,
}

struct CacheShared {
    entries: DashMap<ChunkOrigin, CacheEntry>,
    epoch: Instant,
    expiration: Duration,
}

impl CacheShared {
    fn stamp(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        let idle = now.saturating_sub(entry.last_access.load(Ordering::Acquire));
        idle > self.expiration.as_nanos() as u64
    }

    fn sweep(&self, at: Instant) -> usize {
        let now = self.stamp(at);
        let expired: Vec<ChunkOrigin> = self
            .entries
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();

        let evicted = expired
            .iter()
            .filter(|origin| {
                self.entries
                    .remove_if(origin, |_, entry| self.is_expired(entry, now))
                    .is_some()
            })
            .count();
        debug!(
            scanned_expired = expired.len(),
            evicted,
            remaining = self.entries.len(),
            "chunk cache sweep"
        );
        evicted
    }
}

/// Chunk cache with a periodic sweep of idle entries.
///
/// Safe to share between tasks; callers never lock anything themselves.
pub struct ChunkCache {
    shared: Arc<CacheShared>,
    scheduler: Arc<dyn Scheduler>,
    sweep_timer: Mutex<Option<TimerId>>,
    disposed: AtomicBool,
}

impl ChunkCache {
    /// Create a cache and register its sweep with `scheduler`.
    pub fn new(config: &CacheConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let shared = Arc::new(CacheShared {
            entries: DashMap::new(),
            epoch: Instant::now(),
            expiration: config.expiration(),
        });

        let weak: Weak<CacheShared> = Arc::downgrade(&shared);
        let timer = scheduler.register_recurring(
            SWEEP_TIMER_NAME,
            config.sweep_initial_delay(),
            config.sweep_interval(),
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.sweep(Instant::now());
                }
            }),
        );

        Self {
            shared,
            scheduler,
            sweep_timer: Mutex::new(Some(timer)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Look up a chunk, refreshing its access time on a hit.
    pub fn try_get(&self, origin: ChunkOrigin) -> Option<Arc<ChunkEntity>> {
        let entry = self.shared.entries.get(&origin)?;
        entry
            .last_access
            .store(self.shared.stamp(Instant::now()), Ordering::Release);
        trace!(%origin, "chunk cache hit");
        Some(Arc::clone(&entry.chunk))
    }

    /// Insert or replace the chunk stored at `origin`.
    pub fn set(&self, origin: ChunkOrigin, chunk: Arc<ChunkEntity>) {
        let entry = CacheEntry {
            chunk,
            last_access: AtomicU64::new(self.shared.stamp(Instant::now())),
        };
        self.shared.entries.insert(origin, entry);
    }

    /// Remove the entry at `origin`, reporting whether one existed.
    pub fn remove(&self, origin: ChunkOrigin) -> bool {
        self.shared.entries.remove(&origin).is_some()
    }

    /// Presence check that does not count as an access.
    pub fn contains(&self, origin: ChunkOrigin) -> bool {
        self.shared.entries.contains_key(&origin)
    }

    /// Snapshot of the entry count; may be stale under concurrent writes.
    pub fn count(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    pub fn clear(&self) {
        self.shared.entries.clear();
    }

    pub fn expiration(&self) -> Duration {
        self.shared.expiration
    }

    /// Evict every entry idle for longer than the expiration window.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep(Instant::now())
    }

    /// Sweep as if the clock read `at`.
    pub fn sweep_expired_at(&self, at: Instant) -> usize {
        self.shared.sweep(at)
    }

    /// Cancel the sweep and drop every entry. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let timer = self
            .sweep_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            self.scheduler.unregister(timer);
        }
        self.shared.entries.clear();
        debug!("chunk cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ChunkCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerCallback;
    use chunkforge_core::BlockType;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingScheduler {
        registered: Mutex<HashMap<TimerId, (String, TimerCallback)>>,
        unregistered: Mutex<Vec<TimerId>>,
    }

    impl RecordingScheduler {
        fn fire_all(&self) {
            let callbacks: Vec<TimerCallback> = self
                .registered
                .lock()
                .unwrap()
                .values()
                .map(|(_, cb)| Arc::clone(cb))
                .collect();
            for callback in callbacks {
                callback();
            }
        }
    }

    impl Scheduler for RecordingScheduler {
        fn register_recurring(
            &self,
            name: &str,
            _initial_delay: Duration,
            _interval: Duration,
            callback: TimerCallback,
        ) -> TimerId {
            let mut registered = self.registered.lock().unwrap();
            let id = TimerId(registered.len() as u64 + 1);
            registered.insert(id, (name.to_string(), callback));
            id
        }

        fn unregister(&self, id: TimerId) -> bool {
            self.unregistered.lock().unwrap().push(id);
            self.registered.lock().unwrap().remove(&id).is_some()
        }
    }

    fn config(expiration_ms: u64) -> CacheConfig {
        CacheConfig {
            expiration_ms,
            ..CacheConfig::default()
        }
    }

    fn chunk_of(block: BlockType) -> Arc<ChunkEntity> {
        let mut chunk = ChunkEntity::new();
        chunk.set(0, 0, 0, block.into()).unwrap();
        Arc::new(chunk)
    }

    #[test]
    fn set_get_remove_clear() {
        let cache = ChunkCache::new(&config(60_000), Arc::new(RecordingScheduler::default()));
        let a = ChunkOrigin::from_chunk_coords(0, 0, 0);
        let b = ChunkOrigin::from_chunk_coords(1, 0, 0);

        assert!(cache.try_get(a).is_none());
        cache.set(a, chunk_of(BlockType::Stone));
        cache.set(b, chunk_of(BlockType::Dirt));
        assert_eq!(cache.count(), 2);

        let hit = cache.try_get(a).expect("cached");
        assert_eq!(hit.get(0, 0, 0).unwrap().block_type, BlockType::Stone);

        cache.set(a, chunk_of(BlockType::Sand));
        assert_eq!(cache.count(), 2);
        let replaced = cache.try_get(a).expect("cached");
        assert_eq!(replaced.get(0, 0, 0).unwrap().block_type, BlockType::Sand);

        assert!(cache.remove(b));
        assert!(!cache.remove(b));
        assert!(!cache.contains(b));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_evicts_only_idle_entries() {
        let cache = ChunkCache::new(&config(200), Arc::new(RecordingScheduler::default()));
        let stale = ChunkOrigin::from_chunk_coords(0, 0, 0);
        let fresh = ChunkOrigin::from_chunk_coords(0, 0, 1);
        cache.set(stale, chunk_of(BlockType::Stone));
        cache.set(fresh, chunk_of(BlockType::Stone));

        std::thread::sleep(Duration::from_millis(400));
        assert!(cache.try_get(fresh).is_some());

        assert_eq!(cache.sweep_expired(), 1);
        assert!(!cache.contains(stale));
        assert!(cache.contains(fresh));
    }

    #[test]
    fn sweep_at_future_instant_evicts_everything() {
        let cache = ChunkCache::new(&config(1_000), Arc::new(RecordingScheduler::default()));
        for x in 0..4 {
            cache.set(ChunkOrigin::from_chunk_coords(x, 0, 0), chunk_of(BlockType::Dirt));
        }
        assert_eq!(cache.sweep_expired_at(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(5);
        assert_eq!(cache.sweep_expired_at(later), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn scheduled_sweep_runs_through_scheduler() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let cache = ChunkCache::new(&config(0), scheduler.clone());
        let origin = ChunkOrigin::from_chunk_coords(3, 0, 3);
        cache.set(origin, chunk_of(BlockType::Grass));
        std::thread::sleep(Duration::from_millis(5));

        scheduler.fire_all();
        assert!(!cache.contains(origin));
    }

    #[test]
    fn dispose_is_idempotent_and_cancels_sweep() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let cache = ChunkCache::new(&config(60_000), scheduler.clone());
        cache.set(ChunkOrigin::default(), chunk_of(BlockType::Stone));

        cache.dispose();
        cache.dispose();
        assert!(cache.is_disposed());
        assert!(cache.is_empty());
        assert_eq!(scheduler.unregistered.lock().unwrap().len(), 1);
        assert!(scheduler.registered.lock().unwrap().is_empty());

        drop(cache);
        assert_eq!(scheduler.unregistered.lock().unwrap().len(), 1);
    }

    #[test]
    fn sweep_callback_outliving_cache_is_harmless() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let callbacks: Vec<TimerCallback> = {
            let cache = ChunkCache::new(&config(0), scheduler.clone());
            cache.set(ChunkOrigin::default(), chunk_of(BlockType::Stone));
            let callbacks = scheduler
                .registered
                .lock()
                .unwrap()
                .values()
                .map(|(_, cb)| Arc::clone(cb))
                .collect();
            callbacks
        };
        for callback in callbacks {
            callback();
        }
    }
}
