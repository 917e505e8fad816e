use clap::Parser;
use scr_launch_tools::env::JobEnv;
use scr_launch_tools::jobstep::{resolve_latest_step_id, Squeue, STEP_QUERY_TOOL};
use scr_launch_tools::logging::init_logging;
use scr_launch_tools::*;

/// Prints the job step id (JOBID.STEP) of the most recently started parallel
/// launch in the current job.  Prints -1 if the step query itself fails.
#[derive(Parser, Clone, Debug)]
struct ClArgs {
    /// Step query command.
    #[clap(long, default_value = STEP_QUERY_TOOL)]
    squeue: String,

    /// Increase logging verbosity (-v info, -vv debug).
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,
}

fn main() -> Result<()> {
    reset_sigpipe();
    let args = ClArgs::parse();
    init_logging(args.verbose)?;

    let env = JobEnv::from_env();
    let query = Squeue {
        binary: args.squeue,
    };
    match resolve_latest_step_id(&env, &query) {
        Ok(id) => {
            println!("{}", id);
            Ok(())
        }
        Err(e) => {
            if let Some(sentinel) = e.sentinel() {
                println!("{}", sentinel);
            }
            Err(e.into())
        }
    }
}
