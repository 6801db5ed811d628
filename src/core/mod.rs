// Public modules
pub mod defaults;
pub mod definition;
pub mod error;
pub mod process;
pub mod resources;
pub mod runner;
pub mod split;
pub mod stage;
pub mod stages;
pub mod substitution;
pub mod value;
pub mod variables;

// Re-export common types for convenience
pub use defaults::{CleanupErrorPolicy, EngineConfig};
pub use error::{Error, ErrorCategory, ErrorCode, Result};
pub use runner::{run, RunOutcome, RunStats, Runner};
pub use split::{split, split_with};
pub use stage::{report_progress, Stage, StageRole};
pub use value::{FileHandle, PipelineValue, ValueKind};
pub use variables::VariableStore;
