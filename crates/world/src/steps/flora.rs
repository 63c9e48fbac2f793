use async_trait::async_trait;
use chunkforge_core::{scoped_rng, BlockType};
use rand::Rng;
use tracing::trace;

use super::read_biome;
use crate::chunk::{CHUNK_HEIGHT, CHUNK_SIZE};
use crate::context::GeneratorContext;
use crate::step::{GenerationStepError, GeneratorStep, StepResultExt};

const FLORA_SALT: u64 = 0xF10A;
const TRUNK_HEIGHT: i32 = 5;
/// Trunk plus canopy rising above the grass block.
const TREE_CLEARANCE: i32 = TRUNK_HEIGHT + 4;

/// Scatters flowers, tall grass and small oaks over grass tops.
///
/// Placement is drawn from an RNG keyed by seed and chunk origin, so a
/// regenerated chunk gets the same decorations.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloraStep;

impl FloraStep {
    /// Trunk with a rounded 3x3 canopy. Trees stay two columns away from the
    /// chunk edge so the canopy never crosses into a neighbour.
    fn plant_oak(
        &self,
        context: &mut GeneratorContext,
        x: i32,
        ground: i32,
        z: i32,
    ) -> Result<(), GenerationStepError> {
        let base = ground + 1;
        let canopy = base + TRUNK_HEIGHT;
        for dy in 0..3 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    let corner = dx != 0 && dz != 0;
                    if dy == 0 && corner {
                        continue;
                    }
                    let leaves = Some(BlockType::Leaves.into());
                    context
                        .set_block(x + dx, canopy + dy, z + dz, leaves)
                        .for_step(self.name())?;
                }
            }
        }
        context
            .set_block(x, canopy + 3, z, Some(BlockType::Leaves.into()))
            .for_step(self.name())?;
        context
            .fill_column(x, z, base, canopy + 1, BlockType::Wood)
            .for_step(self.name())
    }
}

fn grass_top(context: &GeneratorContext, x: i32, z: i32) -> Option<i32> {
    let top = context.chunk().top_solid_y(x, z).ok()??;
    let cell = context.get_block(x, top, z).ok()?;
    (cell.block_type == BlockType::Grass).then_some(top)
}

#[async_trait]
impl GeneratorStep for FloraStep {
    fn name(&self) -> &str {
        "flora"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let biome = read_biome(context, self.name())?;
        let mut rng = scoped_rng(context.seed(), context.origin().to_array(), FLORA_SALT);
        let size = CHUNK_SIZE as i32;
        let mut trees = 0;

        for _ in 0..biome.tree_attempts() {
            let x = rng.gen_range(2..size - 2);
            let z = rng.gen_range(2..size - 2);
            let Some(ground) = grass_top(context, x, z) else {
                continue;
            };
            if ground + TREE_CLEARANCE >= CHUNK_HEIGHT as i32 {
                continue;
            }
            self.plant_oak(context, x, ground, z)?;
            trees += 1;
        }

        let density = biome.flora_density();
        let mut plants = 0;
        if density > 0.0 {
            for z in 0..size {
                for x in 0..size {
                    let Some(ground) = grass_top(context, x, z) else {
                        continue;
                    };
                    if ground + 1 >= CHUNK_HEIGHT as i32 || !rng.gen_bool(density) {
                        continue;
                    }
                    let plant = if rng.gen_bool(0.25) {
                        BlockType::Flower
                    } else {
                        BlockType::TallGrass
                    };
                    context
                        .set_block(x, ground + 1, z, Some(plant.into()))
                        .for_step(self.name())?;
                    plants += 1;
                }
            }
        }

        trace!(origin = %context.origin(), %biome, trees, plants, "decorated chunk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkOrigin;
    use crate::steps::test_support::flat_context;
    use crate::steps::{Biome, BIOME_KEY};

    fn meadow(biome: Biome) -> GeneratorContext {
        let mut ctx = flat_context(ChunkOrigin::from_chunk_coords(3, 0, 5), 0.0);
        ctx.fill_blocks(0, 0, 0, 16, 64, 16, BlockType::Dirt).unwrap();
        ctx.fill_layer(64, BlockType::Grass).unwrap();
        ctx.add_custom_data(BIOME_KEY, biome.as_str());
        ctx
    }

    #[tokio::test]
    async fn forest_grows_trees_and_plants() {
        let mut ctx = meadow(Biome::Forest);
        FloraStep.execute(&mut ctx).await.unwrap();
        assert!(ctx.chunk().count(BlockType::Wood) >= TRUNK_HEIGHT as usize);
        assert!(ctx.chunk().count(BlockType::Leaves) > 0);
        let plants =
            ctx.chunk().count(BlockType::Flower) + ctx.chunk().count(BlockType::TallGrass);
        assert!(plants > 0);
    }

    #[tokio::test]
    async fn desert_stays_bare() {
        let mut ctx = meadow(Biome::Desert);
        FloraStep.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.chunk().count(BlockType::Wood), 0);
        assert_eq!(ctx.chunk().count(BlockType::TallGrass), 0);
    }

    #[tokio::test]
    async fn decoration_is_deterministic() {
        let mut first = meadow(Biome::Plains);
        let mut second = meadow(Biome::Plains);
        FloraStep.execute(&mut first).await.unwrap();
        FloraStep.execute(&mut second).await.unwrap();
        assert_eq!(first.chunk(), second.chunk());
    }
}
