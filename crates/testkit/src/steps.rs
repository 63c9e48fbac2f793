use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chunkforge_world::{
    BlockType, CustomValue, GenerationStepError, GeneratorContext, GeneratorStep, StepResultExt,
};

/// Counts its runs and marks the chunk with one block.
///
/// An optional delay keeps the step suspended long enough for concurrent
/// requests to pile up on the same chunk.
pub struct CountingStep {
    name: String,
    runs: Arc<AtomicUsize>,
    delay: Option<Duration>,
    marker: BlockType,
}

impl CountingStep {
    /// Step that writes stone at the chunk's local origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Arc::new(AtomicUsize::new(0)),
            delay: None,
            marker: BlockType::Stone,
        }
    }

    /// Sleep for `delay` before finishing each run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block written at the chunk's local origin.
    pub fn with_marker(mut self, marker: BlockType) -> Self {
        self.marker = marker;
        self
    }

    /// Shared run counter, readable after the step is handed to a generator.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.runs.clone()
    }

    /// Runs so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeneratorStep for CountingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        context
            .set_block(0, 0, 0, Some(self.marker.into()))
            .for_step(&self.name)
    }
}

/// Appends its name to a shared log on every run.
pub struct RecordingStep {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStep {
    /// Step that records into `log`.
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl GeneratorStep for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        // Suspend once so ordering does not hinge on everything running inline.
        tokio::task::yield_now().await;
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.name.clone());
        Ok(())
    }
}

/// Writes a fixed side-channel value.
pub struct KeyWriterStep {
    name: String,
    key: String,
    value: CustomValue,
}

impl KeyWriterStep {
    /// Step that stores `value` under `key`.
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<CustomValue>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl GeneratorStep for KeyWriterStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        tokio::task::yield_now().await;
        context.add_custom_data(self.key.clone(), self.value.clone());
        Ok(())
    }
}

/// Records the side-channel value it finds under a key, if any.
pub struct KeyReaderStep {
    name: String,
    key: String,
    seen: Arc<Mutex<Vec<Option<CustomValue>>>>,
}

impl KeyReaderStep {
    /// Step that reads `key`.
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            seen: Arc::default(),
        }
    }

    /// Shared log of observed values, one entry per run.
    pub fn observations(&self) -> Arc<Mutex<Vec<Option<CustomValue>>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl GeneratorStep for KeyReaderStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        let value = context.custom_data(&self.key).cloned();
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
        Ok(())
    }
}

/// Fails a set number of times, then succeeds.
pub struct FailingStep {
    name: String,
    message: String,
    remaining_failures: AtomicUsize,
    attempts: Arc<AtomicUsize>,
}

impl FailingStep {
    /// Step that fails on every run.
    pub fn always(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::times(name, message, usize::MAX)
    }

    /// Step that fails on its first `failures` runs.
    pub fn times(name: impl Into<String>, message: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            remaining_failures: AtomicUsize::new(failures),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared attempt counter.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

#[async_trait]
impl GeneratorStep for FailingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            Err(GenerationStepError::new(&self.name, &self.message))
        } else {
            Ok(())
        }
    }
}
