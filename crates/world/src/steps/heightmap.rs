use async_trait::async_trait;
use chunkforge_core::BlockType;

use super::{column_index, layer_seed, local_span, COLUMNS, HEIGHTMAP_KEY};
use crate::chunk::{CHUNK_HEIGHT, CHUNK_SIZE};
use crate::config::TerrainConfig;
use crate::context::{CustomValue, GeneratorContext};
use crate::step::{GenerationStepError, GeneratorStep, StepResultExt};

const HEIGHT_SALT: u32 = 0x5EED_0001;
/// Horizontal scale of the height noise; larger features for smaller values.
const HEIGHT_FREQUENCY: f64 = 0.008;

/// Raises stone up to a noise-driven surface and publishes the heights.
///
/// Heights are world-space Y of the top solid block, clamped to
/// `[1, CHUNK_HEIGHT - 1]`, so neighbouring chunks agree on their shared edges.
#[derive(Debug, Clone)]
pub struct HeightmapStep {
    base_height: i32,
    height_variation: i32,
}

impl HeightmapStep {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            base_height: terrain.base_height,
            height_variation: terrain.height_variation,
        }
    }

    fn surface_height(&self, context: &GeneratorContext, world_x: i32, world_z: i32) -> i32 {
        let sample = context.noise().sample(
            world_x as f64 * HEIGHT_FREQUENCY,
            0.0,
            world_z as f64 * HEIGHT_FREQUENCY,
            layer_seed(context.seed(), HEIGHT_SALT),
        );
        let height = self.base_height + (sample * self.height_variation as f64) as i32;
        height.clamp(1, CHUNK_HEIGHT as i32 - 1)
    }
}

#[async_trait]
impl GeneratorStep for HeightmapStep {
    fn name(&self) -> &str {
        "heightmap"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let origin = context.origin();
        let mut heights = vec![0i32; COLUMNS];

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let (world_x, world_z) = (origin.x + x as i32, origin.z + z as i32);
                let height = self.surface_height(context, world_x, world_z);
                heights[column_index(x, z)] = height;

                if let Some((start, end)) = local_span(origin.y, 1, height + 1) {
                    context
                        .fill_column(x as i32, z as i32, start, end, BlockType::Stone)
                        .for_step(self.name())?;
                }
            }
        }

        context.add_custom_data(HEIGHTMAP_KEY, CustomValue::IntGrid(heights));
        Ok(())
    }
}
