//! Block identifiers and the per-voxel cell stored in chunks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of block kinds understood by the generator.
///
/// `Air` is the zero value and means "no block".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BlockType {
    /// Empty space.
    #[default]
    Air = 0,
    /// Dirt.
    Dirt = 1,
    /// Grass-topped dirt.
    Grass = 2,
    /// Stone.
    Stone = 3,
    /// Water source.
    Water = 4,
    /// Sand.
    Sand = 5,
    /// Tree trunk.
    Wood = 6,
    /// Tree foliage.
    Leaves = 7,
    /// Glass.
    Glass = 8,
    /// Brick.
    Brick = 9,
    /// Unbreakable floor.
    Bedrock = 10,
    /// Snow.
    Snow = 11,
    /// Lava source.
    Lava = 12,
    /// Decorative flower.
    Flower = 13,
    /// Decorative tall grass.
    TallGrass = 14,
}

impl BlockType {
    /// Every block type, in numeric order.
    pub const ALL: [BlockType; 15] = [
        BlockType::Air,
        BlockType::Dirt,
        BlockType::Grass,
        BlockType::Stone,
        BlockType::Water,
        BlockType::Sand,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::Glass,
        BlockType::Brick,
        BlockType::Bedrock,
        BlockType::Snow,
        BlockType::Lava,
        BlockType::Flower,
        BlockType::TallGrass,
    ];

    /// Convert to the stable numeric representation.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert from the stable numeric representation.
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ALL.len() {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Canonical string key used in configs, scripts and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Dirt => "dirt",
            Self::Grass => "grass",
            Self::Stone => "stone",
            Self::Water => "water",
            Self::Sand => "sand",
            Self::Wood => "wood",
            Self::Leaves => "leaves",
            Self::Glass => "glass",
            Self::Brick => "brick",
            Self::Bedrock => "bedrock",
            Self::Snow => "snow",
            Self::Lava => "lava",
            Self::Flower => "flower",
            Self::TallGrass => "tall_grass",
        }
    }

    /// True for [`BlockType::Air`].
    #[inline]
    pub fn is_air(self) -> bool {
        self == Self::Air
    }

    /// Liquids and air can be replaced freely by decoration passes.
    #[inline]
    pub fn is_replaceable(self) -> bool {
        matches!(
            self,
            Self::Air | Self::Water | Self::Lava | Self::TallGrass | Self::Flower
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when parsing a block name that is not part of [`BlockType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown block type '{0}'")]
pub struct UnknownBlockType(pub String);

impl FromStr for BlockType {
    type Err = UnknownBlockType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|block| block.as_str() == key)
            .ok_or_else(|| UnknownBlockType(s.to_string()))
    }
}

/// A block type plus one byte of metadata.
///
/// The metadata byte is opaque here; rendering and gameplay code give it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockCell {
    /// Block kind.
    pub block_type: BlockType,
    /// Opaque metadata bits.
    pub metadata: u8,
}

impl BlockCell {
    /// The empty cell.
    pub const AIR: Self = Self {
        block_type: BlockType::Air,
        metadata: 0,
    };

    /// Build a cell from a type and metadata byte.
    pub const fn new(block_type: BlockType, metadata: u8) -> Self {
        Self {
            block_type,
            metadata,
        }
    }

    /// True when the cell holds no block.
    #[inline]
    pub fn is_air(&self) -> bool {
        self.block_type.is_air()
    }
}

impl From<BlockType> for BlockCell {
    fn from(block_type: BlockType) -> Self {
        Self::new(block_type, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_is_air() {
        let cell = BlockCell::default();
        assert_eq!(cell, BlockCell::AIR);
        assert!(cell.is_air());
        assert_eq!(cell.metadata, 0);
    }

    #[test]
    fn numeric_roundtrip_covers_all_types() {
        for block in BlockType::ALL {
            assert_eq!(BlockType::from_u8(block.as_u8()), Some(block));
        }
        assert_eq!(BlockType::from_u8(BlockType::ALL.len() as u8), None);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Stone".parse::<BlockType>(), Ok(BlockType::Stone));
        assert_eq!("tall-grass".parse::<BlockType>(), Ok(BlockType::TallGrass));
        assert_eq!(
            "obsidian".parse::<BlockType>(),
            Err(UnknownBlockType("obsidian".to_string()))
        );
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&BlockType::TallGrass).unwrap();
        assert_eq!(json, "\"tall_grass\"");
        let cell: BlockCell =
            serde_json::from_str(r#"{"block_type":"bedrock","metadata":3}"#).unwrap();
        assert_eq!(cell, BlockCell::new(BlockType::Bedrock, 3));
    }

    #[test]
    fn replaceable_blocks() {
        assert!(BlockType::Air.is_replaceable());
        assert!(BlockType::Water.is_replaceable());
        assert!(!BlockType::Stone.is_replaceable());
    }
}
