use std::fmt;

use chunkforge_core::{BlockCell, BlockType};
use glam::{IVec3, Vec3};
use thiserror::Error;

/// Chunk width along X and depth along Z, in blocks.
pub const CHUNK_SIZE: usize = 16;
/// Chunk height (Y axis) in blocks.
pub const CHUNK_HEIGHT: usize = 256;
/// Total cell count per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE;

/// Chunk extents as a vector, handy for range checks.
pub const CHUNK_EXTENT: IVec3 =
    IVec3::new(CHUNK_SIZE as i32, CHUNK_HEIGHT as i32, CHUNK_SIZE as i32);

/// Errors raised by chunk accesses and bulk fills.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// A single-cell access fell outside `[0,SIZE)x[0,HEIGHT)x[0,SIZE)`.
    #[error("chunk coordinate ({x}, {y}, {z}) is out of range")]
    OutOfRange { x: i32, y: i32, z: i32 },
    /// A fill region was empty, inverted, or reached past the chunk bounds.
    #[error("invalid fill range {start} .. {end}")]
    InvalidRange { start: IVec3, end: IVec3 },
}

/// World-space origin of a chunk, snapped to the chunk grid.
///
/// This is the cache key: two positions inside the same chunk always map to the
/// same origin.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ChunkOrigin {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkOrigin {
    /// Origin of the chunk at grid coordinates `(cx, cy, cz)`.
    pub const fn from_chunk_coords(cx: i32, cy: i32, cz: i32) -> Self {
        Self {
            x: cx * CHUNK_SIZE as i32,
            y: cy * CHUNK_HEIGHT as i32,
            z: cz * CHUNK_SIZE as i32,
        }
    }

    /// Origin of the chunk containing the given block position.
    pub fn containing(block: IVec3) -> Self {
        let coords = block.div_euclid(CHUNK_EXTENT);
        Self::from_chunk_coords(coords.x, coords.y, coords.z)
    }

    /// Origin of the chunk containing a continuous world position.
    pub fn from_world(position: Vec3) -> Self {
        Self::containing(position.floor().as_ivec3())
    }

    /// Grid coordinates of this chunk.
    pub fn chunk_coords(self) -> IVec3 {
        self.as_ivec3().div_euclid(CHUNK_EXTENT)
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    pub fn as_vec3(self) -> Vec3 {
        self.as_ivec3().as_vec3()
    }

    /// Same-order array form used for seeding.
    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for ChunkOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dense cuboid of block cells.
///
/// The chunk does not know where it lives; the caller tracks its origin.
#[derive(Clone, PartialEq, Eq)]
pub struct ChunkEntity {
    cells: Box<[BlockCell]>,
}

impl fmt::Debug for ChunkEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkEntity")
            .field("size", &CHUNK_SIZE)
            .field("height", &CHUNK_HEIGHT)
            .field(
                "solid_cells",
                &self.cells.iter().filter(|c| !c.is_air()).count(),
            )
            .finish()
    }
}

impl Default for ChunkEntity {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkEntity {
    /// Allocate a fresh chunk filled with air.
    pub fn new() -> Self {
        Self {
            cells: vec![BlockCell::AIR; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
    }

    fn checked_index(x: i32, y: i32, z: i32) -> Result<usize, ChunkError> {
        let in_range = (0..CHUNK_SIZE as i32).contains(&x)
            && (0..CHUNK_HEIGHT as i32).contains(&y)
            && (0..CHUNK_SIZE as i32).contains(&z);
        if !in_range {
            return Err(ChunkError::OutOfRange { x, y, z });
        }
        Ok(Self::index(x as usize, y as usize, z as usize))
    }

    /// Read the cell at chunk-local coordinates.
    pub fn get(&self, x: i32, y: i32, z: i32) -> Result<BlockCell, ChunkError> {
        Ok(self.cells[Self::checked_index(x, y, z)?])
    }

    /// Overwrite the cell at chunk-local coordinates.
    pub fn set(&mut self, x: i32, y: i32, z: i32, cell: BlockCell) -> Result<(), ChunkError> {
        let idx = Self::checked_index(x, y, z)?;
        self.cells[idx] = cell;
        Ok(())
    }

    /// Fill the half-open region `[start, end)` on every axis.
    ///
    /// Nothing is written unless the whole region is valid.
    pub fn fill_region(
        &mut self,
        start: IVec3,
        end: IVec3,
        cell: BlockCell,
    ) -> Result<(), ChunkError> {
        let valid = start.cmplt(end).all()
            && start.cmpge(IVec3::ZERO).all()
            && end.cmple(CHUNK_EXTENT).all();
        if !valid {
            return Err(ChunkError::InvalidRange { start, end });
        }

        let (x0, x1) = (start.x as usize, end.x as usize);
        for y in start.y as usize..end.y as usize {
            for z in start.z as usize..end.z as usize {
                let row = Self::index(0, y, z);
                self.cells[row + x0..row + x1].fill(cell);
            }
        }
        Ok(())
    }

    /// Overwrite every cell.
    pub fn fill(&mut self, cell: BlockCell) {
        self.cells.fill(cell);
    }

    /// Count the cells holding `block_type`.
    pub fn count(&self, block_type: BlockType) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.block_type == block_type)
            .count()
    }

    /// Raw cell storage, Y-major then Z then X.
    pub fn cells(&self) -> &[BlockCell] {
        &self.cells
    }

    /// Highest non-air Y in a column, if any.
    pub fn top_solid_y(&self, x: i32, z: i32) -> Result<Option<i32>, ChunkError> {
        Self::checked_index(x, 0, z)?;
        Ok((0..CHUNK_HEIGHT)
            .rev()
            .find(|&y| !self.cells[Self::index(x as usize, y, z as usize)].is_air())
            .map(|y| y as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_cell() {
        let mut chunk = ChunkEntity::new();
        let cell = BlockCell::new(BlockType::Brick, 9);
        chunk.set(1, 2, 3, cell).unwrap();
        assert_eq!(chunk.get(1, 2, 3).unwrap(), cell);
        assert_eq!(chunk.get(3, 2, 1).unwrap(), BlockCell::AIR);
    }

    #[test]
    fn new_chunk_is_air() {
        let chunk = ChunkEntity::new();
        assert_eq!(chunk.cells().len(), CHUNK_VOLUME);
        assert_eq!(chunk.count(BlockType::Air), CHUNK_VOLUME);
    }

    #[test]
    fn boundary_values_are_out_of_range() {
        let mut chunk = ChunkEntity::new();
        let s = CHUNK_SIZE as i32;
        let h = CHUNK_HEIGHT as i32;
        let bad = [
            (-1, 0, 0),
            (s, 0, 0),
            (0, -1, 0),
            (0, h, 0),
            (0, 0, -1),
            (0, 0, s),
        ];
        for (x, y, z) in bad {
            assert_eq!(chunk.get(x, y, z), Err(ChunkError::OutOfRange { x, y, z }));
            assert_eq!(
                chunk.set(x, y, z, BlockType::Stone.into()),
                Err(ChunkError::OutOfRange { x, y, z })
            );
        }
        assert!(chunk.get(s - 1, h - 1, s - 1).is_ok());
    }

    #[test]
    fn fill_region_touches_only_region() {
        let mut chunk = ChunkEntity::new();
        chunk
            .fill_region(
                IVec3::new(2, 10, 4),
                IVec3::new(5, 12, 6),
                BlockType::Sand.into(),
            )
            .unwrap();
        assert_eq!(chunk.count(BlockType::Sand), 3 * 2 * 2);
        assert_eq!(chunk.get(2, 10, 4).unwrap().block_type, BlockType::Sand);
        assert_eq!(chunk.get(4, 11, 5).unwrap().block_type, BlockType::Sand);
        assert!(chunk.get(5, 11, 5).unwrap().is_air());
        assert!(chunk.get(4, 12, 5).unwrap().is_air());
    }

    #[test]
    fn fill_region_rejects_inverted_and_oversized() {
        let mut chunk = ChunkEntity::new();
        let cases = [
            (IVec3::new(4, 0, 0), IVec3::new(4, 1, 1)),
            (IVec3::new(0, 5, 0), IVec3::new(1, 2, 1)),
            (IVec3::new(-1, 0, 0), IVec3::new(1, 1, 1)),
            (IVec3::ZERO, CHUNK_EXTENT + IVec3::Y),
        ];
        for (start, end) in cases {
            assert_eq!(
                chunk.fill_region(start, end, BlockType::Stone.into()),
                Err(ChunkError::InvalidRange { start, end })
            );
        }
        assert_eq!(chunk.count(BlockType::Air), CHUNK_VOLUME);
    }

    #[test]
    fn top_solid_y_finds_highest_block() {
        let mut chunk = ChunkEntity::new();
        assert_eq!(chunk.top_solid_y(0, 0).unwrap(), None);
        chunk.set(0, 3, 0, BlockType::Dirt.into()).unwrap();
        chunk.set(0, 40, 0, BlockType::Leaves.into()).unwrap();
        assert_eq!(chunk.top_solid_y(0, 0).unwrap(), Some(40));
        assert!(chunk.top_solid_y(-1, 0).is_err());
    }

    #[test]
    fn origin_snaps_to_grid() {
        assert_eq!(
            ChunkOrigin::from_world(Vec3::new(17.5, 3.0, -0.25)),
            ChunkOrigin { x: 16, y: 0, z: -16 }
        );
        assert_eq!(
            ChunkOrigin::containing(IVec3::new(-17, 300, 15)),
            ChunkOrigin { x: -32, y: 256, z: 0 }
        );
        assert_eq!(
            ChunkOrigin::from_chunk_coords(2, 0, -1).chunk_coords(),
            IVec3::new(2, 0, -1)
        );
    }

    #[test]
    fn origin_display() {
        let origin = ChunkOrigin::from_chunk_coords(1, 0, -3);
        assert_eq!(format!("{}", origin), "(16, 0, -48)");
    }
}
