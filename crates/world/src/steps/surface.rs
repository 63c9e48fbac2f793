use async_trait::async_trait;
use chunkforge_core::BlockType;

use super::{column_index, local_span, read_biome, read_heightmap};
use crate::chunk::CHUNK_SIZE;
use crate::config::TerrainConfig;
use crate::context::GeneratorContext;
use crate::step::{GenerationStepError, GeneratorStep, StepResultExt};

/// Layers of filler under the top block.
const FILLER_DEPTH: i32 = 3;

/// Dresses the stone heightmap with biome blocks and floods low columns.
#[derive(Debug, Clone)]
pub struct SurfaceStep {
    sea_level: i32,
}

impl SurfaceStep {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            sea_level: terrain.sea_level,
        }
    }
}

#[async_trait]
impl GeneratorStep for SurfaceStep {
    fn name(&self) -> &str {
        "surface"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let heights = read_heightmap(context, self.name())?;
        let biome = read_biome(context, self.name())?;
        let origin_y = context.origin().y;

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let height = heights[column_index(x, z)];
                let submerged = height < self.sea_level;
                let top = if submerged {
                    BlockType::Sand
                } else {
                    biome.surface_block()
                };

                let layers = [
                    ((height - FILLER_DEPTH).max(1), height, biome.filler_block()),
                    (height, height + 1, top),
                    (height + 1, self.sea_level + 1, BlockType::Water),
                ];
                for (start, end, block) in layers {
                    if let Some((lo, hi)) = local_span(origin_y, start, end) {
                        context
                            .fill_column(x as i32, z as i32, lo, hi, block)
                            .for_step(self.name())?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkOrigin;
    use crate::context::CustomValue;
    use crate::steps::test_support::flat_context;
    use crate::steps::{Biome, BIOME_KEY, COLUMNS, HEIGHTMAP_KEY};

    fn prepared(height: i32, biome: Biome) -> GeneratorContext {
        let mut ctx = flat_context(ChunkOrigin::default(), 0.0);
        ctx.fill_blocks(0, 1, 0, 16, height + 1, 16, BlockType::Stone)
            .unwrap();
        ctx.add_custom_data(HEIGHTMAP_KEY, CustomValue::IntGrid(vec![height; COLUMNS]));
        ctx.add_custom_data(BIOME_KEY, biome.as_str());
        ctx
    }

    #[tokio::test]
    async fn grass_over_dirt_on_land() {
        let step = SurfaceStep::new(&TerrainConfig::default());
        let mut ctx = prepared(70, Biome::Plains);
        step.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.get_block(4, 70, 4).unwrap().block_type, BlockType::Grass);
        for y in 67..70 {
            assert_eq!(ctx.get_block(4, y, 4).unwrap().block_type, BlockType::Dirt);
        }
        assert_eq!(ctx.get_block(4, 66, 4).unwrap().block_type, BlockType::Stone);
        assert_eq!(ctx.chunk().count(BlockType::Water), 0);
    }

    #[tokio::test]
    async fn low_columns_flood_to_sea_level() {
        let terrain = TerrainConfig::default();
        let step = SurfaceStep::new(&terrain);
        let mut ctx = prepared(terrain.sea_level - 4, Biome::Ocean);
        step.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.chunk().count(BlockType::Water), COLUMNS * 4);
        assert_eq!(ctx.chunk().top_solid_y(0, 0).unwrap(), Some(terrain.sea_level));
        let floor = terrain.sea_level - 4;
        assert_eq!(ctx.get_block(0, floor, 0).unwrap().block_type, BlockType::Sand);
    }

    #[tokio::test]
    async fn unknown_biome_fails() {
        let mut ctx = prepared(70, Biome::Plains);
        ctx.add_custom_data(BIOME_KEY, "moon");
        let err = SurfaceStep::new(&TerrainConfig::default())
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.step_name(), "surface");
        assert!(err.message().contains("moon"));
    }
}
