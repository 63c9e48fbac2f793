//! Chunk generator service: runs the step pipeline and mediates every lookup
//! through the chunk cache.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use glam::Vec3;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, trace, warn};

use crate::cache::ChunkCache;
use crate::chunk::{ChunkEntity, ChunkOrigin};
use crate::config::GeneratorConfig;
use crate::context::GeneratorContext;
use crate::noise::NoiseProvider;
use crate::scheduler::Scheduler;
use crate::step::{GenerationStepError, GeneratorStep};

/// Errors surfaced by chunk requests.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// A step failed; the chunk was discarded and not cached.
    #[error(transparent)]
    Step(#[from] GenerationStepError),
    /// The request was abandoned before generation finished.
    #[error("chunk generation at {origin} timed out after {after:?}")]
    TimedOut { origin: ChunkOrigin, after: Duration },
    /// A batch task was cancelled before it produced a chunk.
    #[error("chunk generation task was cancelled")]
    Cancelled,
}

impl GeneratorError {
    /// The step failure behind this error, if any.
    pub fn step_error(&self) -> Option<&GenerationStepError> {
        match self {
            Self::Step(err) => Some(err),
            Self::TimedOut { .. } | Self::Cancelled => None,
        }
    }
}

/// Per-origin gate; holding it is the right to run that origin's pipeline.
type BuildGate = Arc<Mutex<()>>;

struct GeneratorInner {
    seed: i32,
    initial_radius: i32,
    noise: Arc<dyn NoiseProvider>,
    steps: RwLock<Vec<Arc<dyn GeneratorStep>>>,
    cache: ChunkCache,
    in_flight: DashMap<ChunkOrigin, BuildGate>,
}

/// Generates chunks on demand and caches the results.
///
/// Cloning is cheap and yields a handle to the same service, so clones can be
/// moved into spawned tasks.
#[derive(Clone)]
pub struct ChunkGenerator {
    inner: Arc<GeneratorInner>,
}

impl ChunkGenerator {
    /// Build a service with an empty pipeline.
    ///
    /// The cache registers its sweep with `scheduler` immediately.
    pub fn new(
        config: &GeneratorConfig,
        noise: Arc<dyn NoiseProvider>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let cache = ChunkCache::new(&config.cache, scheduler);
        Self {
            inner: Arc::new(GeneratorInner {
                seed: config.seed,
                initial_radius: config.initial_radius.max(0),
                noise,
                steps: RwLock::new(Vec::new()),
                cache,
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Append a step; it runs after every step already registered.
    pub fn add_generator_step(&self, step: Arc<dyn GeneratorStep>) {
        let mut steps = self
            .inner
            .steps
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(step = step.name(), position = steps.len(), "registered generation step");
        steps.push(step);
    }

    /// Remove the first step named `name`. Returns whether one was removed.
    pub fn remove_generator_step(&self, name: &str) -> bool {
        let mut steps = self
            .inner
            .steps
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match steps.iter().position(|step| step.name() == name) {
            Some(index) => {
                steps.remove(index);
                debug!(step = name, "removed generation step");
                true
            }
            None => false,
        }
    }

    /// Registered step names in execution order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps_snapshot()
            .iter()
            .map(|step| step.name().to_string())
            .collect()
    }

    pub fn step_count(&self) -> usize {
        self.inner
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn seed(&self) -> i32 {
        self.inner.seed
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.inner.cache
    }

    /// Chunk containing the world-space `position`, generated if not cached.
    #[instrument(
        skip(self),
        fields(world_seed = self.inner.seed, origin = %ChunkOrigin::from_world(position))
    )]
    pub async fn get_chunk_by_world_position(
        &self,
        position: Vec3,
    ) -> Result<Arc<ChunkEntity>, GeneratorError> {
        self.get_chunk_at_origin(ChunkOrigin::from_world(position))
            .await
    }

    /// Chunk whose minimum corner is `origin`.
    ///
    /// At most one pipeline runs per origin at any time. Callers that arrive
    /// while a build is running wait for it and take the cached result. A
    /// failed run is not cached; the next waiter starts a fresh run of its own.
    pub async fn get_chunk_at_origin(
        &self,
        origin: ChunkOrigin,
    ) -> Result<Arc<ChunkEntity>, GeneratorError> {
        if let Some(chunk) = self.inner.cache.try_get(origin) {
            return Ok(chunk);
        }
        trace!(%origin, "chunk cache miss");

        let gate: BuildGate = Arc::clone(
            self.inner
                .in_flight
                .entry(origin)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let result = {
            let _build = gate.lock().await;
            self.inner.generate(origin).await
        };
        // Clones are only taken under the shard lock, so a count of two (map
        // plus ours) means nobody else is waiting on or running this gate.
        self.inner.in_flight.remove_if(&origin, |_, current| {
            Arc::ptr_eq(current, &gate) && Arc::strong_count(current) == 2
        });
        result
    }

    /// Chunks for every position, in input order.
    ///
    /// Distinct origins generate in parallel; duplicates share one result. The
    /// first failure is returned.
    pub async fn get_chunks_by_positions(
        &self,
        positions: &[Vec3],
    ) -> Result<Vec<Arc<ChunkEntity>>, GeneratorError> {
        let origins: Vec<ChunkOrigin> = positions
            .iter()
            .copied()
            .map(ChunkOrigin::from_world)
            .collect();
        let resolved = self.resolve_all(&origins).await?;
        origins
            .iter()
            .map(|origin| resolved.get(origin).cloned().ok_or(GeneratorError::Cancelled))
            .collect()
    }

    /// Eagerly generate every chunk within the configured radius of the world
    /// origin at y = 0. Returns how many chunks are in the working set.
    pub async fn generate_initial_chunks(&self) -> Result<usize, GeneratorError> {
        let origins = initial_origins(self.inner.initial_radius);
        let started = Instant::now();
        let resolved = self.resolve_all(&origins).await?;
        info!(
            chunks = resolved.len(),
            radius = self.inner.initial_radius,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "initial chunks generated"
        );
        Ok(resolved.len())
    }

    /// Race a request against `after`.
    ///
    /// Generation runs on its own task, so on timeout it keeps going and its
    /// result still lands in the cache; only this caller stops waiting.
    pub async fn get_chunk_with_timeout(
        &self,
        position: Vec3,
        after: Duration,
    ) -> Result<Arc<ChunkEntity>, GeneratorError> {
        let origin = ChunkOrigin::from_world(position);
        let generator = self.clone();
        let task = tokio::spawn(async move { generator.get_chunk_at_origin(origin).await });
        match tokio::time::timeout(after, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Ok(Err(_)) | Err(_) => {
                warn!(%origin, ?after, "chunk request abandoned after timeout");
                Err(GeneratorError::TimedOut { origin, after })
            }
        }
    }

    /// Drop every cached chunk.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        debug!("chunk cache cleared");
    }

    fn steps_snapshot(&self) -> Vec<Arc<dyn GeneratorStep>> {
        self.inner
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn resolve_all(
        &self,
        origins: &[ChunkOrigin],
    ) -> Result<HashMap<ChunkOrigin, Arc<ChunkEntity>>, GeneratorError> {
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();
        for &origin in origins {
            if seen.insert(origin) {
                let generator = self.clone();
                tasks.spawn(async move {
                    let chunk = generator.get_chunk_at_origin(origin).await?;
                    Ok::<_, GeneratorError>((origin, chunk))
                });
            }
        }

        let mut resolved = HashMap::with_capacity(seen.len());
        while let Some(joined) = tasks.join_next().await {
            match settle(joined) {
                Ok((origin, chunk)) => {
                    resolved.insert(origin, chunk);
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }
        Ok(resolved)
    }
}

type Resolved = (ChunkOrigin, Arc<ChunkEntity>);

/// Unwrap one batch task: panics are resumed, cancellation is an error.
fn settle(
    joined: Result<Result<Resolved, GeneratorError>, JoinError>,
) -> Result<Resolved, GeneratorError> {
    match joined {
        Ok(result) => result,
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(join) => {
            debug!(error = %join, "chunk task cancelled");
            Err(GeneratorError::Cancelled)
        }
    }
}

impl GeneratorInner {
    async fn generate(&self, origin: ChunkOrigin) -> Result<Arc<ChunkEntity>, GeneratorError> {
        // A previous holder of the gate may have built this chunk already.
        if let Some(chunk) = self.cache.try_get(origin) {
            return Ok(chunk);
        }

        let steps: Vec<Arc<dyn GeneratorStep>> = self
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let started = Instant::now();
        let mut context =
            GeneratorContext::new(ChunkEntity::new(), origin, Arc::clone(&self.noise), self.seed);

        for step in &steps {
            trace!(step = step.name(), %origin, "running generation step");
            if let Err(err) = step.execute(&mut context).await {
                warn!(
                    step = err.step_name(),
                    line = ?err.line(),
                    column = ?err.column(),
                    %origin,
                    "{err}"
                );
                return Err(err.into());
            }
        }

        let (chunk, clouds) = context.into_parts();
        let chunk = Arc::new(chunk);
        self.cache.set(origin, Arc::clone(&chunk));
        debug!(
            %origin,
            steps = steps.len(),
            cloud_areas = clouds.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "chunk generated"
        );
        Ok(chunk)
    }
}

/// Origins of the chunks within `radius` of the world origin at y = 0,
/// nearest rings first.
pub fn initial_origins(radius: i32) -> Vec<ChunkOrigin> {
    let radius = radius.max(0);
    let mut origins = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
    for ring in 0..=radius {
        for cz in -ring..=ring {
            for cx in -ring..=ring {
                if cx.abs().max(cz.abs()) == ring {
                    origins.push(ChunkOrigin::from_chunk_coords(cx, 0, cz));
                }
            }
        }
    }
    origins
}
