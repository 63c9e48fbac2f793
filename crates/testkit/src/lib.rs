#![warn(missing_docs)]
//! Test doubles and fixtures for exercising the chunk generation pipeline.

mod digest;
mod scheduler;
mod steps;

use std::sync::Arc;

use chunkforge_world::{ChunkGenerator, GeneratorConfig, NoiseProvider};

pub use digest::*;
pub use scheduler::*;
pub use steps::*;

/// Noise provider that returns `value` everywhere.
pub fn flat_noise(value: f64) -> Arc<dyn NoiseProvider> {
    Arc::new(move |_x: f64, _y: f64, _z: f64, _seed: i32| value)
}

/// Config with a fixed seed and a small initial radius.
pub fn test_config() -> GeneratorConfig {
    GeneratorConfig {
        seed: 4242,
        initial_radius: 1,
        ..GeneratorConfig::default()
    }
}

/// Generator over flat noise whose cache sweep is driven by hand.
pub fn manual_generator(config: &GeneratorConfig) -> (ChunkGenerator, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let generator = ChunkGenerator::new(config, flat_noise(0.0), scheduler.clone());
    (generator, scheduler)
}
