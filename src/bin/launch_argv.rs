use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use clap::Parser;
use scr_launch_tools::env::JobEnv;
use scr_launch_tools::launcher::build_launch_argv;
use scr_launch_tools::logging::init_logging;
use scr_launch_tools::*;

/// Prints the launcher command line for a parallel job, writing the launcher's
/// host file first when it needs one.
///
/// Launcher arguments follow `--`, e.g. `scr-launch-argv -d node7 -- -n 4 ./app`.
#[derive(Parser, Clone, Debug)]
#[clap(trailing_var_arg(true))]
struct ClArgs {
    /// Launcher executable: mpirun, mpiexec or srun (optionally a full path).
    #[clap(short, long, env = "SCR_LAUNCHER")]
    launcher: Option<String>,

    /// Host file to write.  Defaults to $SCR_PREFIX/.scr/hostfile.
    #[clap(short = 'f', long, env = "SCR_HOSTFILE")]
    hostfile: Option<PathBuf>,

    /// Nodes that are up, in hostlist notation.  Empty means every allocated node.
    #[clap(short, long)]
    up: Option<String>,

    /// Nodes to exclude from the launch, in hostlist notation.
    #[clap(short, long)]
    down: Option<String>,

    /// Replace this process with the launcher instead of printing the command.
    #[clap(long)]
    exec: bool,

    /// Increase logging verbosity (-v info, -vv debug).
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Arguments handed to the launcher unchanged.
    #[clap(allow_hyphen_values(true), multiple_values(true))]
    launcher_args: Vec<String>,
}

fn main() -> Result<()> {
    reset_sigpipe();
    let args = ClArgs::parse();
    init_logging(args.verbose)?;

    let env = JobEnv::from_env();
    let mut config = LaunchConfig::load()?;
    if let Some(l) = args.launcher {
        config.launcher = l;
    }
    if let Some(h) = args.hostfile {
        config.hostfile = Some(h);
    }

    let argv = build_launch_argv(
        &config,
        &env,
        args.up.as_deref().unwrap_or(""),
        args.down.as_deref().unwrap_or(""),
        &args.launcher_args,
    )
    .context("not launching: error writing host file and creating launcher command")?;

    if argv.is_empty() {
        bail!("not launching: no launcher arguments given")
    }

    if args.exec {
        let err = Command::new(&argv[0]).args(&argv[1..]).exec();
        return Err(err).with_context(|| format!("failed to exec {}", &argv[0]));
    }

    println!("{}", display_argv(&argv));
    Ok(())
}
