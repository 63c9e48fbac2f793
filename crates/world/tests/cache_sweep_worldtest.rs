//! Chunk cache expiry driven through the scheduler collaborator.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chunkforge_testkit::{manual_generator, test_config, CountingStep, ManualScheduler};
use chunkforge_world::{
    CacheConfig, ChunkCache, ChunkEntity, ChunkOrigin, GeneratorConfig, SWEEP_TIMER_NAME,
};
use glam::Vec3;

fn short_lived(expiration_ms: u64) -> GeneratorConfig {
    GeneratorConfig {
        cache: CacheConfig {
            expiration_ms,
            sweep_interval_ms: 1_000,
            sweep_initial_delay_ms: 2_000,
        },
        ..test_config()
    }
}

#[test]
fn cache_registers_its_sweep() {
    let scheduler = Arc::new(ManualScheduler::new());
    let config = short_lived(500);
    let _cache = ChunkCache::new(&config.cache, scheduler.clone());

    let timers = scheduler.timers();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].name, SWEEP_TIMER_NAME);
    assert_eq!(timers[0].interval, Duration::from_secs(1));
    assert_eq!(timers[0].initial_delay, Duration::from_secs(2));
}

#[tokio::test]
async fn idle_entries_are_swept_and_regenerated() {
    let (generator, scheduler) = manual_generator(&short_lived(50));
    let counting = CountingStep::new("count");
    let runs = counting.counter();
    generator.add_generator_step(Arc::new(counting));

    generator.get_chunk_by_world_position(Vec3::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(scheduler.fire(SWEEP_TIMER_NAME), 1);
    assert!(!generator.cache().contains(ChunkOrigin::default()));

    generator.get_chunk_by_world_position(Vec3::ZERO).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn recently_read_entries_survive_a_sweep() {
    let (generator, scheduler) = manual_generator(&short_lived(300));
    let idle = ChunkOrigin::from_chunk_coords(5, 0, 5);
    let busy = ChunkOrigin::from_chunk_coords(-5, 0, -5);
    generator.get_chunk_at_origin(idle).await.unwrap();
    generator.get_chunk_at_origin(busy).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(generator.cache().try_get(busy).is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;

    scheduler.fire(SWEEP_TIMER_NAME);
    assert!(!generator.cache().contains(idle));
    assert!(generator.cache().contains(busy));
}

#[test]
fn dispose_cancels_the_sweep_once() {
    let scheduler = Arc::new(ManualScheduler::new());
    let cache = ChunkCache::new(&CacheConfig::default(), scheduler.clone());
    cache.set(ChunkOrigin::default(), Arc::new(ChunkEntity::new()));

    cache.dispose();
    cache.dispose();
    assert!(cache.is_empty());
    assert!(!scheduler.is_registered(SWEEP_TIMER_NAME));
    assert_eq!(scheduler.unregistered().len(), 1);

    drop(cache);
    assert_eq!(scheduler.unregistered().len(), 1);
    assert_eq!(scheduler.fire(SWEEP_TIMER_NAME), 0);
}

#[test]
fn dropping_the_generator_releases_the_sweep() {
    let (generator, scheduler) = manual_generator(&test_config());
    assert!(scheduler.is_registered(SWEEP_TIMER_NAME));
    let clone = generator.clone();
    drop(generator);
    assert!(scheduler.is_registered(SWEEP_TIMER_NAME));
    drop(clone);
    assert!(!scheduler.is_registered(SWEEP_TIMER_NAME));
}
