use async_trait::async_trait;
use chunkforge_core::BlockType;
use tracing::trace;

use crate::context::GeneratorContext;
use crate::step::{GenerationStepError, GeneratorStep, StepResultExt};

/// Seals the bottom of the world with bedrock.
///
/// Only the chunk whose origin sits at world Y 0 has a bottom layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BedrockStep;

#[async_trait]
impl GeneratorStep for BedrockStep {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        if context.origin().y != 0 {
            trace!(origin = %context.origin(), "no world floor in this chunk");
            return Ok(());
        }
        context.fill_layer(0, BlockType::Bedrock).for_step(self.name())
    }
}
