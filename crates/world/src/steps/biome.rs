use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chunkforge_core::BlockType;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::{layer_seed, read_heightmap, BIOME_KEY};
use crate::chunk::CHUNK_SIZE;
use crate::config::TerrainConfig;
use crate::context::GeneratorContext;
use crate::noise::remap;
use crate::step::{GenerationStepError, GeneratorStep};

const TEMPERATURE_SALT: u32 = 0x7E3A_0001;
const HUMIDITY_SALT: u32 = 0x4D1D_0002;
/// Climate varies over far larger distances than terrain height.
const CLIMATE_FREQUENCY: f64 = 0.002;

/// Chunk-level climate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Ocean,
    Plains,
    Forest,
    Desert,
    Savanna,
    Tundra,
    Swamp,
    Mountains,
}

/// A biome name that does not match any [`Biome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown biome '{0}'")]
pub struct UnknownBiome(pub String);

impl Biome {
    pub const ALL: [Biome; 8] = [
        Biome::Ocean,
        Biome::Plains,
        Biome::Forest,
        Biome::Desert,
        Biome::Savanna,
        Biome::Tundra,
        Biome::Swamp,
        Biome::Mountains,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Biome::Ocean => "ocean",
            Biome::Plains => "plains",
            Biome::Forest => "forest",
            Biome::Desert => "desert",
            Biome::Savanna => "savanna",
            Biome::Tundra => "tundra",
            Biome::Swamp => "swamp",
            Biome::Mountains => "mountains",
        }
    }

    /// Select a land biome from temperature and humidity in `[0, 1]`.
    pub fn from_climate(temperature: f64, humidity: f64) -> Self {
        if temperature < 0.3 {
            Biome::Tundra
        } else if temperature > 0.7 {
            if humidity > 0.4 {
                Biome::Savanna
            } else {
                Biome::Desert
            }
        } else if humidity > 0.8 {
            Biome::Swamp
        } else if humidity > 0.5 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }

    /// Block placed on top of each land column.
    pub fn surface_block(self) -> BlockType {
        match self {
            Biome::Desert | Biome::Ocean => BlockType::Sand,
            Biome::Tundra => BlockType::Snow,
            Biome::Mountains => BlockType::Stone,
            _ => BlockType::Grass,
        }
    }

    /// Block placed in the few layers under the surface.
    pub fn filler_block(self) -> BlockType {
        match self {
            Biome::Desert | Biome::Ocean => BlockType::Sand,
            Biome::Mountains => BlockType::Stone,
            _ => BlockType::Dirt,
        }
    }

    /// Chance per grass column of a flower or tall grass.
    pub fn flora_density(self) -> f64 {
        match self {
            Biome::Plains => 0.18,
            Biome::Forest | Biome::Swamp => 0.12,
            Biome::Savanna => 0.08,
            _ => 0.0,
        }
    }

    /// Trees attempted per chunk.
    pub fn tree_attempts(self) -> u32 {
        match self {
            Biome::Forest => 4,
            Biome::Swamp | Biome::Plains => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Biome {
    type Err = UnknownBiome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Biome::ALL
            .into_iter()
            .find(|biome| biome.as_str() == s)
            .ok_or_else(|| UnknownBiome(s.to_string()))
    }
}

/// Classifies the chunk and publishes the result under [`BIOME_KEY`].
///
/// Reads the heightmap: chunks that sit mostly under the sea become oceans
/// and chunks well above the base height become mountains. Everything else
/// is picked from climate noise sampled at the chunk centre.
#[derive(Debug, Clone)]
pub struct BiomeStep {
    sea_level: i32,
    mountain_height: i32,
}

impl BiomeStep {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            sea_level: terrain.sea_level,
            mountain_height: terrain.base_height + terrain.height_variation * 3 / 5,
        }
    }

    pub fn classify(&self, context: &GeneratorContext, heights: &[i32]) -> Biome {
        let mean = heights.iter().map(|&h| h as i64).sum::<i64>() / heights.len().max(1) as i64;
        if mean < self.sea_level as i64 {
            return Biome::Ocean;
        }
        if mean > self.mountain_height as i64 {
            return Biome::Mountains;
        }

        let half = CHUNK_SIZE as i32 / 2;
        let origin = context.origin();
        let x = (origin.x + half) as f64 * CLIMATE_FREQUENCY;
        let z = (origin.z + half) as f64 * CLIMATE_FREQUENCY;
        let temperature = remap(
            context.noise().sample(x, 0.0, z, layer_seed(context.seed(), TEMPERATURE_SALT)),
            0.0,
            1.0,
        );
        let humidity = remap(
            context.noise().sample(x, 0.0, z, layer_seed(context.seed(), HUMIDITY_SALT)),
            0.0,
            1.0,
        );
        Biome::from_climate(temperature, humidity)
    }
}

#[async_trait]
impl GeneratorStep for BiomeStep {
    fn name(&self) -> &str {
        "biome"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let heights = read_heightmap(context, self.name())?;
        let biome = self.classify(context, &heights);
        trace!(origin = %context.origin(), %biome, "classified chunk");
        context.add_custom_data(BIOME_KEY, biome.as_str());
        Ok(())
    }
}
