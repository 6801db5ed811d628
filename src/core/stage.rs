use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::error::Result;
use crate::value::PipelineValue;

/// Signature of a stage body: the previous output plus the progress sink.
pub type StageFn = dyn Fn(PipelineValue, &mut dyn Write) -> Result<PipelineValue> + Send + Sync;

/// What the runner must prepare before invoking a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// Receives the previous output unchanged.
    Transform,
    /// Receives `PipelineValue::Intercepted` carrying the previous output and the bindings.
    Command,
}

/// One pipeline step. The role is fixed when the stage is built.
#[derive(Clone)]
pub struct Stage {
    label: String,
    role: StageRole,
    run: Arc<StageFn>,
}

impl Stage {
    pub fn new<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(PipelineValue, &mut dyn Write) -> Result<PipelineValue> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            role: StageRole::Transform,
            run: Arc::new(f),
        }
    }

    pub fn command<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(PipelineValue, &mut dyn Write) -> Result<PipelineValue> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            role: StageRole::Command,
            run: Arc::new(f),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    pub fn needs_bindings(&self) -> bool {
        self.role == StageRole::Command
    }

    pub fn call(&self, input: PipelineValue, progress: &mut dyn Write) -> Result<PipelineValue> {
        (self.run)(input, progress)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("label", &self.label)
            .field("role", &self.role)
            .finish()
    }
}

/// Write a progress line to the sink. Write failures are ignored.
pub fn report_progress(progress: &mut dyn Write, msg: &str) {
    let _ = write!(progress, "\n{}\n", msg);
}
