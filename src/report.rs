//! Summary of a generation run, printed as text or JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use chunkforge_core::BlockType;
use chunkforge_world::{initial_origins, ChunkGenerator};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub seed: i32,
    pub radius: i32,
    pub steps: Vec<String>,
    pub chunks: usize,
    pub cached: usize,
    pub elapsed_ms: u128,
    /// Non-air block totals over the initial working set.
    pub blocks: BTreeMap<BlockType, usize>,
}

impl RunReport {
    pub fn collect(generator: &ChunkGenerator, radius: i32, elapsed: Duration) -> Self {
        let origins = initial_origins(radius);
        let mut blocks = BTreeMap::new();
        for origin in &origins {
            let Some(chunk) = generator.cache().try_get(*origin) else {
                continue;
            };
            for cell in chunk.cells().iter().filter(|cell| !cell.is_air()) {
                *blocks.entry(cell.block_type).or_insert(0) += 1;
            }
        }

        Self {
            seed: generator.seed(),
            radius,
            steps: generator.step_names(),
            chunks: origins.len(),
            cached: generator.cache().count(),
            elapsed_ms: elapsed.as_millis(),
            blocks,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "seed:     {}", self.seed)?;
        writeln!(f, "radius:   {}", self.radius)?;
        writeln!(f, "pipeline: {}", self.steps.join(" -> "))?;
        writeln!(
            f,
            "chunks:   {} generated, {} cached, {} ms",
            self.chunks, self.cached, self.elapsed_ms
        )?;
        for (block, count) in &self.blocks {
            writeln!(f, "  {block:<12} {count}")?;
        }
        Ok(())
    }
}
