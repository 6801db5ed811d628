use std::io;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use pipewright::definition::PipelineDefinition;
use pipewright::{EngineConfig, PipelineValue, RunStats, Runner};

use super::CmdResult;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline definition file (JSON)
    pub definition: PathBuf,

    /// Engine configuration file (default: ./pipewright.json if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Don't stream stage progress and command output to stderr
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Serialize)]
pub struct RunOutput {
    pub value: PipelineValue,
    pub stats: RunStats,
}

pub fn run(args: RunArgs) -> CmdResult<RunOutput> {
    let config = EngineConfig::load(args.config.as_deref())?;
    let definition = PipelineDefinition::load(&args.definition)?;
    definition.check(&config)?;

    let stages = definition.build(&config);
    let runner = Runner::new(config);

    let mut stderr = io::stderr();
    let outcome = if args.quiet {
        runner.execute(None, &stages)
    } else {
        runner.execute(Some(&mut stderr), &stages)
    };

    match outcome.error {
        None => Ok((
            RunOutput {
                value: outcome.value,
                stats: outcome.stats,
            },
            0,
        )),
        Some(mut err) => {
            // Surface what was produced before the failure.
            if let Some(details) = err.details.as_object_mut() {
                details.insert("partialValue".to_string(), outcome.value.to_json());
                details.insert(
                    "stats".to_string(),
                    serde_json::to_value(&outcome.stats).unwrap_or_default(),
                );
            }
            Err(err)
        }
    }
}
