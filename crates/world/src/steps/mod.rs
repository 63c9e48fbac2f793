//! Built-in native generation steps and the default terrain pipeline.
//!
//! Steps talk to each other through the context's side channel:
//!
//! - [`HEIGHTMAP_KEY`]: `IntGrid` of the world Y of each column's top solid
//!   block. Written by `heightmap`; read by `biome`, `surface` and `caves`.
//! - [`BIOME_KEY`]: `Text` holding a [`Biome`] name. Written by `biome`; read
//!   by `surface` and `flora`.

mod bedrock;
mod biome;
mod caves;
mod clouds;
mod flora;
mod heightmap;
mod surface;

use std::sync::Arc;

pub use bedrock::BedrockStep;
pub use biome::{Biome, BiomeStep};
pub use caves::CaveStep;
pub use clouds::CloudStep;
pub use flora::FloraStep;
pub use heightmap::HeightmapStep;
pub use surface::SurfaceStep;

use crate::chunk::{CHUNK_HEIGHT, CHUNK_SIZE};
use crate::config::TerrainConfig;
use crate::context::{CustomValue, GeneratorContext};
use crate::step::{GenerationStepError, GeneratorStep};

/// Side-channel key for the per-column surface heights.
pub const HEIGHTMAP_KEY: &str = "heightmap";
/// Side-channel key for the chunk's biome name.
pub const BIOME_KEY: &str = "biome";

/// Columns in one chunk.
pub const COLUMNS: usize = CHUNK_SIZE * CHUNK_SIZE;

/// The stock terrain pipeline, in execution order.
pub fn default_steps(terrain: &TerrainConfig) -> Vec<Arc<dyn GeneratorStep>> {
    vec![
        Arc::new(BedrockStep),
        Arc::new(HeightmapStep::new(terrain)),
        Arc::new(BiomeStep::new(terrain)),
        Arc::new(SurfaceStep::new(terrain)),
        Arc::new(CaveStep::new(terrain)),
        Arc::new(FloraStep),
        Arc::new(CloudStep::new(terrain)),
    ]
}

/// Index of column `(x, z)` in a per-column grid.
pub fn column_index(x: usize, z: usize) -> usize {
    z * CHUNK_SIZE + x
}

/// Clamp the world-space span `[start, end)` to a chunk whose origin sits at
/// `origin_y`, in local Y. `None` when nothing of the span is inside.
pub(crate) fn local_span(origin_y: i32, start: i32, end: i32) -> Option<(i32, i32)> {
    let lo = (start - origin_y).max(0);
    let hi = (end - origin_y).min(CHUNK_HEIGHT as i32);
    (lo < hi).then_some((lo, hi))
}

/// Seed for a named noise layer, so layers sampled at the same point differ.
pub(crate) fn layer_seed(seed: i32, salt: u32) -> i32 {
    (seed as u32 ^ salt) as i32
}

pub(crate) fn read_heightmap(
    context: &GeneratorContext,
    step: &str,
) -> Result<Vec<i32>, GenerationStepError> {
    context
        .custom_data(HEIGHTMAP_KEY)
        .and_then(CustomValue::as_int_grid)
        .filter(|grid| grid.len() == COLUMNS)
        .map(<[i32]>::to_vec)
        .ok_or_else(|| {
            GenerationStepError::new(
                step,
                format!("no '{HEIGHTMAP_KEY}' grid in context; run the heightmap step first"),
            )
        })
}

pub(crate) fn read_biome(
    context: &GeneratorContext,
    step: &str,
) -> Result<Biome, GenerationStepError> {
    let name = context
        .custom_data(BIOME_KEY)
        .and_then(CustomValue::as_text)
        .ok_or_else(|| {
            GenerationStepError::new(
                step,
                format!("no '{BIOME_KEY}' entry in context; run the biome step first"),
            )
        })?;
    name.parse::<Biome>()
        .map_err(|err| GenerationStepError::new(step, err))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_order() {
        let names: Vec<String> = default_steps(&TerrainConfig::default())
            .iter()
            .map(|step| step.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["bedrock", "heightmap", "biome", "surface", "caves", "flora", "clouds"]
        );
    }

    #[test]
    fn local_span_clamps_to_chunk() {
        assert_eq!(local_span(0, 1, 65), Some((1, 65)));
        assert_eq!(local_span(256, 1, 65), None);
        assert_eq!(local_span(0, -10, 400), Some((0, 256)));
        assert_eq!(local_span(-256, 1, 65), None);
        assert_eq!(local_span(-256, -20, 3), Some((236, 256)));
    }

    #[test]
    fn missing_side_channel_is_a_step_error() {
        let ctx = test_support::flat_context(Default::default(), 0.0);
        let err = read_heightmap(&ctx, "surface").unwrap_err();
        assert_eq!(err.step_name(), "surface");
        assert!(err.message().contains("heightmap"));
        assert!(read_biome(&ctx, "flora").is_err());
    }
}
