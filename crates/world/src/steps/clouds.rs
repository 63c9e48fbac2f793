use async_trait::async_trait;
use glam::Vec3;

use super::layer_seed;
use crate::chunk::CHUNK_SIZE;
use crate::config::TerrainConfig;
use crate::context::{CloudArea, GeneratorContext};
use crate::noise::remap;
use crate::step::{GenerationStepError, GeneratorStep};

const CLOUD_SALT: u32 = 0xC10D_0003;
const CLOUD_FREQUENCY: f64 = 0.03;
/// Cloud cells per chunk edge.
const CELLS: usize = 2;
const CELL_THICKNESS: f32 = 4.0;
/// Cells thinner than this are skipped.
const MIN_DENSITY: f32 = 0.55;

/// Contributes cloud volumes above the chunk.
///
/// Clouds are world-space hints for the renderer and never touch blocks.
#[derive(Debug, Clone)]
pub struct CloudStep {
    cloud_height: f32,
}

impl CloudStep {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            cloud_height: terrain.cloud_height,
        }
    }
}

#[async_trait]
impl GeneratorStep for CloudStep {
    fn name(&self) -> &str {
        "clouds"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let cell = (CHUNK_SIZE / CELLS) as f32;
        let origin = context.world_position();
        let seed = layer_seed(context.seed(), CLOUD_SALT);

        for cz in 0..CELLS {
            for cx in 0..CELLS {
                let min = Vec3::new(
                    origin.x + cx as f32 * cell,
                    self.cloud_height,
                    origin.z + cz as f32 * cell,
                );
                let centre = min + Vec3::new(cell, 0.0, cell) * 0.5;
                let sample = context.noise().sample(
                    centre.x as f64 * CLOUD_FREQUENCY,
                    0.0,
                    centre.z as f64 * CLOUD_FREQUENCY,
                    seed,
                );
                let density = remap(sample, 0.0, 1.0) as f32;
                if density < MIN_DENSITY {
                    continue;
                }
                let max = min + Vec3::new(cell, CELL_THICKNESS, cell);
                context.add_cloud_area(CloudArea::new(min, max, density));
            }
        }
        Ok(())
    }
}
