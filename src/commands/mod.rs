pub type CmdResult<T> = pipewright::Result<(T, i32)>;

pub mod check;
pub mod run;

pub(crate) fn run_json(command: crate::Commands) -> (pipewright::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => crate::output::map_cmd_result_to_json(run::run(args)),
        crate::Commands::Check(args) => crate::output::map_cmd_result_to_json(check::run(args)),
    }
}
