//! Chunk generation pipeline: dense chunk storage, the per-chunk generation
//! context, the step contract, the self-expiring chunk cache and the
//! generator service that ties them together.

mod cache;
mod chunk;
mod config;
mod context;
mod generator;
mod noise;
mod scheduler;
mod step;
pub mod steps;

pub use self::noise::*;
pub use cache::*;
pub use chunk::*;
pub use config::*;
pub use context::*;
pub use generator::*;
pub use scheduler::*;
pub use step::*;

pub use chunkforge_core::{BlockCell, BlockType};
