use clap::{Parser, Subcommand};
use scr_launch_tools::hostlist::{compress, expand};
use scr_launch_tools::*;

/// Converts between compact hostlist notation and individual hostnames.
#[derive(Parser, Clone, Debug)]
struct ClArgs {
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Clone, Debug)]
enum Cmd {
    /// Print one hostname per line, e.g. `expand 'atlas[1-3],rain5'`.
    Expand { hostlist: String },

    /// Print the compact form of the given hostnames (comma or space separated).
    Compress {
        #[clap(required(true), multiple_values(true))]
        hosts: Vec<String>,
    },
}

fn main() -> Result<()> {
    reset_sigpipe();
    let args = ClArgs::parse();
    match args.command {
        Cmd::Expand { hostlist } => {
            for h in expand(&hostlist).with_context(|| format!("bad hostlist: {}", hostlist))? {
                println!("{}", h);
            }
        }
        Cmd::Compress { hosts } => {
            let hosts: Vec<&str> = hosts
                .iter()
                .flat_map(|h| h.split(','))
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .collect();
            println!("{}", compress(&hosts));
        }
    }
    Ok(())
}
