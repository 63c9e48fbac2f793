use async_trait::async_trait;
use chunkforge_core::BlockType;

use super::{column_index, layer_seed, read_heightmap};
use crate::chunk::{CHUNK_HEIGHT, CHUNK_SIZE};
use crate::config::TerrainConfig;
use crate::context::GeneratorContext;
use crate::step::{GenerationStepError, GeneratorStep, StepResultExt};

const CAVE_SALT: u32 = 0xCAFE_1234;
const CAVE_FREQUENCY: f64 = 0.05;
/// Divides Y before sampling so tunnels run mostly horizontally.
const VERTICAL_SQUASH: f64 = 2.0;
/// Solid layers kept between a cave ceiling and the surface.
const ROOF_THICKNESS: i32 = 4;

/// Carves tunnels out of stone and dirt with 3D noise.
///
/// Never touches world Y 0, water, or the top few layers of a column.
#[derive(Debug, Clone)]
pub struct CaveStep {
    threshold: f64,
}

impl CaveStep {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            threshold: terrain.cave_threshold,
        }
    }

    fn should_carve(&self, context: &GeneratorContext, x: i32, y: i32, z: i32) -> bool {
        let sample = context.noise().sample(
            x as f64 * CAVE_FREQUENCY,
            y as f64 / VERTICAL_SQUASH * CAVE_FREQUENCY,
            z as f64 * CAVE_FREQUENCY,
            layer_seed(context.seed(), CAVE_SALT),
        );
        let normalized = (sample + 1.0) / 2.0;
        normalized * depth_modifier(y) < self.threshold
    }
}

/// Caves are densest around Y 30 and thin out towards bedrock and surface.
fn depth_modifier(y: i32) -> f64 {
    let distance = (y as f64 - 30.0).abs();
    1.0 - (distance / 40.0).min(0.5)
}

fn carvable(block: BlockType) -> bool {
    matches!(block, BlockType::Stone | BlockType::Dirt)
}

#[async_trait]
impl GeneratorStep for CaveStep {
    fn name(&self) -> &str {
        "caves"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        if self.threshold <= 0.0 {
            return Ok(());
        }
        let heights = read_heightmap(context, self.name())?;
        let origin = context.origin();

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let roof = heights[column_index(x, z)] - ROOF_THICKNESS;
                let lo = (1 - origin.y).max(0);
                let hi = (roof - origin.y).min(CHUNK_HEIGHT as i32);
                for y in lo..hi {
                    let (lx, lz) = (x as i32, z as i32);
                    let world = context.to_world(lx, y, lz);
                    if !self.should_carve(context, world.x, world.y, world.z) {
                        continue;
                    }
                    let current = context.get_block(lx, y, lz).for_step(self.name())?;
                    if carvable(current.block_type) {
                        context.set_block(lx, y, lz, None).for_step(self.name())?;
                    }
                }
            }
        }
        Ok(())
    }
}
