//! Job identity and scheduler variables, captured once at startup.
//!
//! Nothing else in the crate reads the process environment; operations take a
//! [`JobEnv`] so they can be exercised without a live allocation.

use std::path::PathBuf;

/// Names the per-job host enumeration file (one hostname per line).
pub const HOSTFILE_VAR: &str = "LSB_DJOB_HOSTFILE";

/// Job id variables, in lookup order.
pub const JOBID_VARS: &[&str] = &["SLURM_JOBID", "SLURM_JOB_ID", "LSB_JOBID", "COBALT_JOBID"];

pub const PREFIX_VAR: &str = "SCR_PREFIX";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobEnv {
    pub user: Option<String>,
    pub jobid: Option<String>,
    pub hostfile_var: Option<PathBuf>,
    pub prefix: PathBuf,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl JobEnv {
    pub fn from_env() -> Self {
        let mut env = Self::from_vars(|k| std::env::var(k).ok());
        if env.user.is_none() {
            env.user = non_empty(Some(whoami::username()));
        }
        if env.prefix.as_os_str().is_empty() {
            env.prefix = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        }
        env
    }

    /// Build from an arbitrary variable lookup.  No fallbacks are applied, so an
    /// unset `USER` stays `None` and an unset prefix stays empty.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let jobid = JOBID_VARS.iter().find_map(|k| non_empty(lookup(k)));
        JobEnv {
            user: non_empty(lookup("USER")),
            jobid,
            hostfile_var: non_empty(lookup(HOSTFILE_VAR)).map(PathBuf::from),
            prefix: non_empty(lookup(PREFIX_VAR))
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }
}
