//! Per-request generation context shared by every step of one chunk build.

use std::collections::HashMap;
use std::sync::Arc;

use chunkforge_core::{BlockCell, BlockType};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkEntity, ChunkError, ChunkOrigin, CHUNK_HEIGHT, CHUNK_SIZE};
use crate::noise::NoiseProvider;

/// Value stored in the context's side channel.
///
/// Steps agree on key names and value shapes out of band; the container does
/// not enforce either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CustomValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Block(BlockType),
    /// Row-major `CHUNK_SIZE x CHUNK_SIZE` grid, indexed `z * CHUNK_SIZE + x`.
    IntGrid(Vec<i32>),
}

impl CustomValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockType> {
        match self {
            Self::Block(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int_grid(&self) -> Option<&[i32]> {
        match self {
            Self::IntGrid(values) => Some(values),
            _ => None,
        }
    }
}

impl From<bool> for CustomValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CustomValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CustomValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CustomValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<BlockType> for CustomValue {
    fn from(value: BlockType) -> Self {
        Self::Block(value)
    }
}

/// World-space cloud volume contributed by a step.
///
/// Not a chunk mutation: it is a hint for later steps or the renderer and is
/// never checked against chunk bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudArea {
    /// Minimum corner in world space.
    pub min: Vec3,
    /// Maximum corner in world space.
    pub max: Vec3,
    /// Coverage in `[0, 1]`.
    pub density: f32,
}

impl CloudArea {
    pub fn new(min: Vec3, max: Vec3, density: f32) -> Self {
        Self { min, max, density }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Mutable aggregate passed through every step of one chunk build.
///
/// Created fresh per request and dropped once the pipeline finishes; nothing
/// here outlives a single generation.
pub struct GeneratorContext {
    chunk: ChunkEntity,
    origin: ChunkOrigin,
    noise: Arc<dyn NoiseProvider>,
    seed: i32,
    custom_data: HashMap<String, CustomValue>,
    cloud_areas: Vec<CloudArea>,
}

impl GeneratorContext {
    /// Bind a context to `chunk` at `origin`.
    pub fn new(
        chunk: ChunkEntity,
        origin: ChunkOrigin,
        noise: Arc<dyn NoiseProvider>,
        seed: i32,
    ) -> Self {
        Self {
            chunk,
            origin,
            noise,
            seed,
            custom_data: HashMap::new(),
            cloud_areas: Vec::new(),
        }
    }

    pub fn chunk(&self) -> &ChunkEntity {
        &self.chunk
    }

    pub fn origin(&self) -> ChunkOrigin {
        self.origin
    }

    /// World position of the chunk's minimum corner.
    pub fn world_position(&self) -> Vec3 {
        self.origin.as_vec3()
    }

    pub fn noise(&self) -> &Arc<dyn NoiseProvider> {
        &self.noise
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Sample the noise provider with this context's seed.
    pub fn sample_noise(&self, x: f64, y: f64, z: f64) -> f64 {
        self.noise.sample(x, y, z, self.seed)
    }

    /// World-space block position of a chunk-local coordinate.
    pub fn to_world(&self, x: i32, y: i32, z: i32) -> IVec3 {
        self.origin.as_ivec3() + IVec3::new(x, y, z)
    }

    /// Fill `[start, end)` on every axis with `block`.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_blocks(
        &mut self,
        start_x: i32,
        start_y: i32,
        start_z: i32,
        end_x: i32,
        end_y: i32,
        end_z: i32,
        block: impl Into<BlockCell>,
    ) -> Result<(), ChunkError> {
        self.chunk.fill_region(
            IVec3::new(start_x, start_y, start_z),
            IVec3::new(end_x, end_y, end_z),
            block.into(),
        )
    }

    /// Fill one full horizontal layer.
    pub fn fill_layer(&mut self, y: i32, block: impl Into<BlockCell>) -> Result<(), ChunkError> {
        let size = CHUNK_SIZE as i32;
        if !Self::is_valid_y(y) {
            return Err(ChunkError::InvalidRange {
                start: IVec3::new(0, y, 0),
                end: IVec3::new(size, y.saturating_add(1), size),
            });
        }
        self.fill_blocks(0, y, 0, size, y + 1, size, block)
    }

    /// Fill `[start_y, end_y)` of a single column.
    pub fn fill_column(
        &mut self,
        x: i32,
        z: i32,
        start_y: i32,
        end_y: i32,
        block: impl Into<BlockCell>,
    ) -> Result<(), ChunkError> {
        let size = CHUNK_SIZE as i32;
        if !(0..size).contains(&x) || !(0..size).contains(&z) {
            return Err(ChunkError::OutOfRange {
                x,
                y: start_y,
                z,
            });
        }
        self.fill_blocks(x, start_y, z, x + 1, end_y, z + 1, block)
    }

    /// Write one cell; `None` writes air.
    pub fn set_block(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        block: Option<BlockCell>,
    ) -> Result<(), ChunkError> {
        self.chunk.set(x, y, z, block.unwrap_or(BlockCell::AIR))
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<BlockCell, ChunkError> {
        self.chunk.get(x, y, z)
    }

    /// Store a side-channel value. A later write to the same key replaces it.
    pub fn add_custom_data(&mut self, key: impl Into<String>, value: impl Into<CustomValue>) {
        self.custom_data.insert(key.into(), value.into());
    }

    pub fn custom_data(&self, key: &str) -> Option<&CustomValue> {
        self.custom_data.get(key)
    }

    pub fn custom_data_map(&self) -> &HashMap<String, CustomValue> {
        &self.custom_data
    }

    pub fn add_cloud_area(&mut self, area: CloudArea) {
        self.cloud_areas.push(area);
    }

    pub fn cloud_areas(&self) -> &[CloudArea] {
        &self.cloud_areas
    }

    /// Tear the context down into the finished chunk and its cloud areas.
    pub fn into_parts(self) -> (ChunkEntity, Vec<CloudArea>) {
        (self.chunk, self.cloud_areas)
    }

    /// True when `y` addresses a valid layer.
    pub fn is_valid_y(y: i32) -> bool {
        (0..CHUNK_HEIGHT as i32).contains(&y)
    }
}
