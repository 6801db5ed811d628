//! Sequential pipeline execution.
//!
//! A run owns one variable store and one resource tracker. Stages execute
//! strictly in order; the first failure stops the run, and tracked files are
//! released afterwards whatever the outcome.

use std::io::{self, Write};

use serde::Serialize;

use crate::defaults::{CleanupErrorPolicy, EngineConfig};
use crate::error::{Error, Result};
use crate::resources::{ReleaseReport, ResourceClass, ResourceTracker};
use crate::stage::Stage;
use crate::value::PipelineValue;
use crate::variables::VariableStore;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunStats {
    pub stages_total: usize,
    pub stages_run: usize,
    pub bindings: usize,
    pub files_closed: usize,
    pub files_deleted: usize,
}

/// Result of one run. When `error` is set, `value` is the last successful
/// stage output and must be treated as partial.
#[derive(Debug)]
pub struct RunOutcome {
    pub value: PipelineValue,
    pub error: Option<Error>,
    pub stats: RunStats,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<PipelineValue> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: EngineConfig,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `stages` in order. Progress goes to `progress`, or nowhere when `None`.
    pub fn execute(&self, progress: Option<&mut dyn Write>, stages: &[Stage]) -> RunOutcome {
        let mut discard = io::sink();
        let progress: &mut dyn Write = match progress {
            Some(p) => p,
            None => &mut discard,
        };

        let mut store = VariableStore::new();
        let mut tracker = ResourceTracker::new(self.config.temp_prefix.clone());
        let mut stats = RunStats {
            stages_total: stages.len(),
            ..RunStats::default()
        };
        let mut value = PipelineValue::Empty;
        let mut stage_error = None;

        for (index, stage) in stages.iter().enumerate() {
            log_status!("run", "Stage {}/{}: {}", index + 1, stages.len(), stage.label());

            let input = if stage.needs_bindings() {
                PipelineValue::Intercepted {
                    raw: Box::new(value.clone()),
                    bindings: store.clone(),
                }
            } else {
                value.clone()
            };

            let output = match stage.call(input, progress) {
                Ok(output) => output,
                Err(err) => {
                    log_status!("run", "Stage '{}' failed: {}", stage.label(), err);
                    stage_error = Some(err);
                    break;
                }
            };
            stats.stages_run += 1;

            if let Err(err) = self.register(&output, &mut store, &mut tracker) {
                value = output;
                stage_error = Some(err);
                break;
            }

            // A binding marker is passed on as-is; the next stage sees the marker.
            value = output;
        }

        stats.bindings = store.len();
        let report = tracker.release();
        stats.files_closed = report.closed;
        stats.files_deleted = report.deleted;

        RunOutcome {
            value,
            error: self.resolve_error(stage_error, report),
            stats,
        }
    }

    fn register(
        &self,
        output: &PipelineValue,
        store: &mut VariableStore,
        tracker: &mut ResourceTracker,
    ) -> Result<()> {
        match output {
            PipelineValue::File(handle) => {
                if tracker.track(handle) == Some(ResourceClass::Temporary) {
                    log_status!("run", "Tracking temporary file {}", handle.display_path());
                }
                Ok(())
            }
            PipelineValue::Variable { name, value } => store.bind(name, (**value).clone()),
            _ => Ok(()),
        }
    }

    fn resolve_error(&self, stage_error: Option<Error>, mut report: ReleaseReport) -> Option<Error> {
        if report.failures.is_empty() {
            return stage_error;
        }
        let extra = report.failures.len() - 1;
        let mut cleanup_error = report.failures.remove(0);
        if extra > 0 {
            cleanup_error = cleanup_error.with_hint(format!(
                "{} more tracked file(s) could not be released",
                extra
            ));
        }

        match (stage_error, self.config.cleanup_errors) {
            (None, _) => Some(cleanup_error),
            (Some(stage_error), CleanupErrorPolicy::Replace) => Some(
                cleanup_error
                    .with_related("maskedError", &stage_error)
                    .with_hint(format!("A stage failed before cleanup: {}", stage_error.message)),
            ),
            (Some(stage_error), CleanupErrorPolicy::PreferStage) => Some(
                stage_error
                    .with_related("cleanupError", &cleanup_error)
                    .with_hint(format!("Cleanup also failed: {}", cleanup_error.message)),
            ),
        }
    }
}

/// Run `stages` with the default engine configuration.
pub fn run(progress: Option<&mut dyn Write>, stages: &[Stage]) -> Result<PipelineValue> {
    Runner::default().execute(progress, stages).into_result()
}
