use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use pipewright::definition::PipelineDefinition;
use pipewright::EngineConfig;

use super::CmdResult;

#[derive(Args)]
pub struct CheckArgs {
    /// Pipeline definition file (JSON)
    pub definition: PathBuf,

    /// Engine configuration file (default: ./pipewright.json if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct CheckOutput {
    pub definition: String,
    pub stages: usize,
    pub warnings: Vec<String>,
}

pub fn run(args: CheckArgs) -> CmdResult<CheckOutput> {
    let config = EngineConfig::load(args.config.as_deref())?;
    let definition = PipelineDefinition::load(&args.definition)?;
    let report = definition.check(&config)?;

    Ok((
        CheckOutput {
            definition: args.definition.display().to_string(),
            stages: report.stages,
            warnings: report.warnings,
        },
        0,
    ))
}
