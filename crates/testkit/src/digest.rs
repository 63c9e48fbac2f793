use std::collections::BTreeMap;

use chunkforge_world::{BlockType, ChunkEntity};
use serde::Serialize;

/// Stable fingerprint of a chunk's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkDigest {
    /// FNV-1a hash over every cell, hex encoded.
    pub hash: String,
    /// Cell count per non-air block type.
    pub blocks: BTreeMap<BlockType, usize>,
}

impl ChunkDigest {
    /// Digest `chunk`.
    pub fn of(chunk: &ChunkEntity) -> Self {
        let mut blocks = BTreeMap::new();
        for cell in chunk.cells().iter().filter(|cell| !cell.is_air()) {
            *blocks.entry(cell.block_type).or_insert(0) += 1;
        }
        Self {
            hash: format!("{:016x}", chunk_hash(chunk)),
            blocks,
        }
    }

    /// Pretty JSON for failure messages and artifacts.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// FNV-1a over `(block type, metadata)` of every cell in storage order.
pub fn chunk_hash(chunk: &ChunkEntity) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    chunk.cells().iter().fold(OFFSET, |hash, cell| {
        let hash = (hash ^ cell.block_type.as_u8() as u64).wrapping_mul(PRIME);
        (hash ^ cell.metadata as u64).wrapping_mul(PRIME)
    })
}
