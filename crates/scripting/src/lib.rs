#![warn(missing_docs)]
//! Runs externally authored generation callables as pipeline steps.
//!
//! A script host binds its functions to [`ScriptCallable`]s and hands them to
//! [`ScriptedStep`]. The adapter never sees script text; it invokes the
//! callable and turns every failure into a [`GenerationStepError`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chunkforge_world::{GenerationStepError, GeneratorContext, GeneratorStep};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::trace;

/// Callable bound by a script host.
pub type ScriptCallable = Arc<dyn Fn(&mut GeneratorContext) -> anyhow::Result<()> + Send + Sync>;

/// Failure raised inside script code.
///
/// Script hosts return this (possibly wrapped in `anyhow` context) so the
/// adapter can report where in the script things went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptRuntimeError {
    message: String,
    line: Option<u32>,
    column: Option<u32>,
    stack_trace: Option<String>,
}

impl ScriptRuntimeError {
    /// Error with a message and no location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            stack_trace: None,
        }
    }

    /// Attach the failing line and, when known, column.
    pub fn at(mut self, line: u32, column: Option<u32>) -> Self {
        self.line = Some(line);
        self.column = column;
        self
    }

    /// Attach the script-level stack trace.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Message reported by the script runtime.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// One-based line of the failing statement.
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// One-based column of the failing statement.
    pub fn column(&self) -> Option<u32> {
        self.column
    }

    /// Script-level stack trace, innermost frame first.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

/// Generator step backed by a script-bound callable.
pub struct ScriptedStep {
    name: String,
    callable: ScriptCallable,
}

impl ScriptedStep {
    /// Wrap a closure.
    pub fn new<F>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(&mut GeneratorContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_callable(name, Arc::new(callable))
    }

    /// Wrap a callable that is already shared with the script host.
    pub fn from_callable(name: impl Into<String>, callable: ScriptCallable) -> Self {
        Self {
            name: name.into(),
            callable,
        }
    }

    fn invoke(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        trace!(step = %self.name, origin = %context.origin(), "invoking scripted step");
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callable)(context))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(self.translate(error)),
            Err(payload) => Err(GenerationStepError::from_host(
                &self.name,
                anyhow!("callable panicked: {}", panic_message(payload.as_ref())),
            )),
        }
    }

    fn translate(&self, error: anyhow::Error) -> GenerationStepError {
        let located = error.downcast_ref::<ScriptRuntimeError>().map(|script| {
            (
                script.message().to_string(),
                script.line(),
                script.column(),
                script.stack_trace().map(str::to_string),
            )
        });
        match located {
            Some((detail, line, column, stack_trace)) => GenerationStepError::from_script(
                &self.name,
                detail,
                line,
                column,
                stack_trace,
                error.into(),
            ),
            None => GenerationStepError::from_host(&self.name, error),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[async_trait]
impl GeneratorStep for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        // On a multi-threaded runtime the worker hands its queue to another
        // thread while the callable runs. Elsewhere, yield once so queued
        // generations get a turn before the callable takes the thread.
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.invoke(context))
            }
            _ => {
                tokio::task::yield_now().await;
                self.invoke(context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;
    use chunkforge_world::{BlockType, ChunkEntity, ChunkOrigin};
    use std::error::Error as _;

    fn context() -> GeneratorContext {
        let zero = |_x: f64, _y: f64, _z: f64, _seed: i32| 0.0;
        GeneratorContext::new(ChunkEntity::new(), ChunkOrigin::default(), Arc::new(zero), 1)
    }

    #[tokio::test]
    async fn successful_callable_mutates_context() {
        let step = ScriptedStep::new("paint", |ctx: &mut GeneratorContext| {
            ctx.fill_layer(3, BlockType::Brick)?;
            ctx.add_custom_data("painted", true);
            Ok(())
        });
        let mut ctx = context();
        step.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.get_block(0, 3, 0).unwrap().block_type, BlockType::Brick);
        assert_eq!(ctx.custom_data("painted").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn script_errors_keep_location_and_trace() {
        let step = ScriptedStep::new("rivers", |_ctx: &mut GeneratorContext| {
            Err(ScriptRuntimeError::new("attempt to index a nil value")
                .at(12, Some(7))
                .with_stack_trace("rivers.lua:12: in function 'carve'")
                .into())
        });
        let err = step.execute(&mut context()).await.unwrap_err();
        assert_eq!(err.step_name(), "rivers");
        assert_eq!(err.line(), Some(12));
        assert_eq!(err.column(), Some(7));
        assert_eq!(err.stack_trace(), Some("rivers.lua:12: in function 'carve'"));
        assert_eq!(
            err.to_string(),
            "generation step 'rivers' failed at line 12, column 7: attempt to index a nil value"
        );
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn script_errors_are_found_under_context() {
        let step = ScriptedStep::new("ores", |_ctx: &mut GeneratorContext| {
            Err(ScriptRuntimeError::new("bad vein").at(4, None))
                .context("while placing ore veins")
        });
        let err = step.execute(&mut context()).await.unwrap_err();
        assert_eq!(err.line(), Some(4));
        assert_eq!(err.column(), None);
        assert_eq!(err.to_string(), "generation step 'ores' failed at line 4: bad vein");
    }

    #[tokio::test]
    async fn host_errors_have_no_location() {
        let step = ScriptedStep::new("overflow", |ctx: &mut GeneratorContext| {
            ctx.set_block(0, 999, 0, None)?;
            Ok(())
        });
        let err = step.execute(&mut context()).await.unwrap_err();
        assert_eq!(err.step_name(), "overflow");
        assert_eq!(err.line(), None);
        assert_eq!(err.column(), None);
        assert!(err.stack_trace().is_some());
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panics_become_host_errors() {
        let step = ScriptedStep::new("boom", |_ctx: &mut GeneratorContext| -> anyhow::Result<()> {
            panic!("script host crashed")
        });
        let err = step.execute(&mut context()).await.unwrap_err();
        assert_eq!(err.step_name(), "boom");
        assert!(err.to_string().contains("script host crashed"));
    }

    #[test]
    fn runs_on_current_thread_runtime() {
        let step = ScriptedStep::new("plain", |ctx: &mut GeneratorContext| {
            ctx.add_custom_data("ran", 1i64);
            Ok(())
        });
        let mut ctx = context();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(step.execute(&mut ctx)).unwrap();
        assert_eq!(ctx.custom_data("ran").and_then(|v| v.as_int()), Some(1));
    }
}
