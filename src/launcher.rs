//! Builds the command line for a parallel-job launcher.
//!
//! `mpirun` is told where to start processes through a host file, written fresh
//! before each launch from the per-job host enumeration file. The compact
//! node-count variables are truncated by the resource manager on large
//! allocations, so the enumeration file is the only reliable source.
//! `srun` is given the down nodes to exclude directly.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, error};

use crate::env::{JobEnv, HOSTFILE_VAR};
use crate::hostlist::{self, HostlistError};
use crate::{IndexSet, LaunchConfig};

pub const HOSTFILE_FLAG: &str = "--hostfile";
pub const EXCLUDE_FLAG: &str = "--exclude";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("unknown launcher '{0}'")]
    UnknownLauncher(String),

    #[error("invalid node list")]
    Hostlist(#[from] HostlistError),

    #[error("no usable hosts found (check {var})", var = HOSTFILE_VAR)]
    NoHosts,

    #[error("failed to create host file directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write host file {path:?}")]
    WriteHostfile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Launcher {
    Mpirun,
    Srun,
}

impl FromStr for Launcher {
    type Err = BuildError;

    /// Accepts a bare name or a path to the executable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = Path::new(s.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match name {
            "mpirun" | "mpiexec" => Ok(Launcher::Mpirun),
            "srun" => Ok(Launcher::Srun),
            _ => Err(BuildError::UnknownLauncher(s.to_string())),
        }
    }
}

/// Reads the host enumeration file named by [`HOSTFILE_VAR`].
///
/// Returns the distinct non-blank hostnames in first-seen order, or `None` when
/// the variable is unset, the file cannot be read, or it holds no hostnames.
pub fn discover_hosts(env: &JobEnv) -> Option<Vec<String>> {
    let path = match &env.hostfile_var {
        Some(p) => p,
        None => {
            debug!("{} is not set", HOSTFILE_VAR);
            return None;
        }
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), "cannot read host enumeration file: {}", e);
            return None;
        }
    };

    let hosts: IndexSet<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if hosts.is_empty() {
        debug!(path = %path.display(), "host enumeration file is empty");
        return None;
    }
    Some(hosts.into_iter().map(String::from).collect())
}

/// Drops down hosts and, when an up list is given, anything not in it.
pub fn select_targets(hosts: Vec<String>, up: &[String], down: &[String]) -> Vec<String> {
    let up: HashSet<&str> = up.iter().map(String::as_str).collect();
    let down: HashSet<&str> = down.iter().map(String::as_str).collect();
    hosts
        .into_iter()
        .filter(|h| !down.contains(h.as_str()))
        .filter(|h| up.is_empty() || up.contains(h.as_str()))
        .collect()
}

/// Writes `hosts` comma-joined on a single line, creating the parent directory.
pub fn write_hostfile(path: &Path, hosts: &[String]) -> Result<(), BuildError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| BuildError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, format!("{}\n", hosts.join(","))).map_err(|source| {
        BuildError::WriteHostfile {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn mpirun_argv(
    config: &LaunchConfig,
    env: &JobEnv,
    up_nodes: &str,
    down_nodes: &str,
    launcher_args: &[String],
) -> Result<Vec<String>, BuildError> {
    let down = hostlist::expand(down_nodes)?;
    let up = hostlist::expand(up_nodes)?;

    let hosts = discover_hosts(env).ok_or(BuildError::NoHosts)?;
    let targets = select_targets(hosts, &up, &down);
    if targets.is_empty() {
        return Err(BuildError::NoHosts);
    }
    debug!(hosts = %targets.join(","), excluded = down.len(), "launch targets");

    let path = config.hostfile_path(env);
    if let Err(e) = write_hostfile(&path, &targets) {
        error!(path = %path.display(), "error writing host file: {}", e);
        return Err(e);
    }

    let mut argv = vec![
        config.launcher.clone(),
        HOSTFILE_FLAG.to_string(),
        path.to_string_lossy().into_owned(),
    ];
    argv.extend_from_slice(launcher_args);
    Ok(argv)
}

fn srun_argv(config: &LaunchConfig, down_nodes: &str, launcher_args: &[String]) -> Vec<String> {
    let mut argv = vec![config.launcher.clone()];
    let down_nodes = down_nodes.trim();
    if !down_nodes.is_empty() {
        argv.push(EXCLUDE_FLAG.to_string());
        argv.push(down_nodes.to_string());
    }
    argv.extend_from_slice(launcher_args);
    argv
}

/// Builds the launcher argv for `launcher_args`.
///
/// `up_nodes` and `down_nodes` are compact hostlists and may be empty. An empty
/// `launcher_args` yields an empty argv without touching the filesystem.
pub fn build_launch_argv(
    config: &LaunchConfig,
    env: &JobEnv,
    up_nodes: &str,
    down_nodes: &str,
    launcher_args: &[String],
) -> Result<Vec<String>, BuildError> {
    if launcher_args.is_empty() {
        return Ok(vec![]);
    }
    match config.launcher.parse::<Launcher>()? {
        Launcher::Mpirun => mpirun_argv(config, env, up_nodes, down_nodes, launcher_args),
        Launcher::Srun => Ok(srun_argv(config, down_nodes, launcher_args)),
    }
}
