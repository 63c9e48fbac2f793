//! Generator step contract and the single error shape every step failure takes.

use std::backtrace::BacktraceStatus;
use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::GeneratorContext;

/// One ordered stage of chunk construction.
///
/// Steps run strictly in registration order for a given chunk and may rely on
/// blocks or side-channel data written by earlier steps.
#[async_trait]
pub trait GeneratorStep: Send + Sync {
    /// Stable name used for removal and for attributing failures.
    fn name(&self) -> &str;

    /// Apply this step to `context`.
    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError>;
}

/// Boxed underlying failure carried as the error source.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// A step failed while building a chunk.
///
/// Scripted and native failures are normalized into this one shape so callers
/// can report which step broke and where.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GenerationStepError {
    step_name: String,
    message: String,
    line: Option<u32>,
    column: Option<u32>,
    stack_trace: Option<String>,
    #[source]
    cause: Option<BoxedCause>,
}

impl GenerationStepError {
    /// Failure with a plain description and no location.
    pub fn new(step_name: impl Into<String>, detail: impl fmt::Display) -> Self {
        let step_name = step_name.into();
        Self {
            message: format_message(&step_name, &detail.to_string(), None, None),
            step_name,
            line: None,
            column: None,
            stack_trace: None,
            cause: None,
        }
    }

    /// Failure raised by host code (native steps, panics, non-script errors).
    ///
    /// The host-side error chain and backtrace take the place of a script trace.
    pub fn from_host(step_name: impl Into<String>, error: anyhow::Error) -> Self {
        let step_name = step_name.into();
        let stack_trace = match error.backtrace().status() {
            BacktraceStatus::Captured => error.backtrace().to_string(),
            _ => format!("{error:?}"),
        };
        Self {
            message: format_message(&step_name, &format!("{error:#}"), None, None),
            step_name,
            line: None,
            column: None,
            stack_trace: Some(stack_trace),
            cause: Some(error.into()),
        }
    }

    /// Failure located in externally authored code.
    pub fn from_script(
        step_name: impl Into<String>,
        detail: impl fmt::Display,
        line: Option<u32>,
        column: Option<u32>,
        stack_trace: Option<String>,
        cause: BoxedCause,
    ) -> Self {
        let step_name = step_name.into();
        Self {
            message: format_message(&step_name, &detail.to_string(), line, column),
            step_name,
            line,
            column,
            stack_trace,
            cause: Some(cause),
        }
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn column(&self) -> Option<u32> {
        self.column
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

fn format_message(step: &str, detail: &str, line: Option<u32>, column: Option<u32>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => {
            format!("generation step '{step}' failed at line {line}, column {column}: {detail}")
        }
        (Some(line), None) => format!("generation step '{step}' failed at line {line}: {detail}"),
        _ => format!("generation step '{step}' failed: {detail}"),
    }
}

/// Lift any error into a [`GenerationStepError`] attributed to a step.
pub trait StepResultExt<T> {
    fn for_step(self, step_name: &str) -> Result<T, GenerationStepError>;
}

impl<T, E> StepResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn for_step(self, step_name: &str) -> Result<T, GenerationStepError> {
        self.map_err(|err| GenerationStepError::from_host(step_name, err.into()))
    }
}

/// Native step built from a synchronous closure.
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut GeneratorContext) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> GeneratorStep for FnStep<F>
where
    F: Fn(&mut GeneratorContext) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut GeneratorContext) -> Result<(), GenerationStepError> {
        (self.f)(context).for_step(&self.name)
    }
}
