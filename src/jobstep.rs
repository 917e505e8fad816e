//! Finds the scheduler job step that belongs to the most recent parallel launch.
//!
//! `squeue -s` lists the steps of a job; asked to sort by decreasing step id it
//! puts the newest step first. The allocation step (`<job>.0`) and the batch
//! script step (`<job>.batch`) are not launches and are passed over.

use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;
use tracing::{debug, warn};

use crate::env::JobEnv;
use crate::process::{run_capture, Captured};

pub const STEP_QUERY_TOOL: &str = "squeue";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepId {
    pub job_id: String,
    pub step: String,
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.job_id, self.step)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Allocation,
    Batch,
    Launch,
}

impl StepKind {
    fn of(step: &str) -> Self {
        match step {
            "0" => StepKind::Allocation,
            "batch" => StepKind::Batch,
            _ => StepKind::Launch,
        }
    }
}

/// One line of step-listing output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    pub id: StepId,
    pub kind: StepKind,
    pub fields: Vec<String>,
}

impl StepRecord {
    /// `None` for blank lines and lines whose first field has no `.`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let (job_id, rest) = fields.next()?.split_once('.')?;
        // only the second dot component names the step
        let step = rest.split('.').next().unwrap_or(rest);
        if job_id.is_empty() || step.is_empty() {
            return None;
        }
        Some(StepRecord {
            id: StepId {
                job_id: job_id.to_string(),
                step: step.to_string(),
            },
            kind: StepKind::of(step),
            fields: fields.map(String::from).collect(),
        })
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("could not determine user ID")]
    MissingUser,

    #[error("could not determine job ID")]
    MissingJobId,

    #[error("failed to run {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {status}")]
    QueryFailed { tool: String, status: ExitStatus },

    #[error("no launched job step found for job {0}")]
    NoStep(String),
}

impl ResolveError {
    /// The numeric sentinel reported when the query itself failed.
    pub fn sentinel(&self) -> Option<i64> {
        match self {
            ResolveError::QueryFailed { .. } => Some(-1),
            _ => None,
        }
    }
}

/// Source of step-listing output for a user's job.
pub trait StepQuery {
    fn list_steps(&self, user: &str, jobid: &str) -> io::Result<Captured>;

    fn tool(&self) -> &str {
        STEP_QUERY_TOOL
    }
}

pub fn step_query_argv(tool: &str, user: &str, jobid: &str) -> Vec<String> {
    [tool, "-h", "-s", "-u", user, "-j", jobid, "-S", "-i"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Queries the scheduler with `squeue`.
#[derive(Clone, Debug)]
pub struct Squeue {
    pub binary: String,
}

impl Default for Squeue {
    fn default() -> Self {
        Squeue {
            binary: STEP_QUERY_TOOL.to_string(),
        }
    }
}

impl StepQuery for Squeue {
    fn list_steps(&self, user: &str, jobid: &str) -> io::Result<Captured> {
        run_capture(&step_query_argv(&self.binary, user, jobid))
    }

    fn tool(&self) -> &str {
        &self.binary
    }
}

/// First launch step in output order.
pub fn select_latest_step(output: &str) -> Option<StepRecord> {
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match StepRecord::parse(line) {
            Some(r) if r.kind == StepKind::Launch => return Some(r),
            Some(r) => debug!(step = %r.id, kind = ?r.kind, "skipping step"),
            None => warn!(line, "ignoring unrecognised step listing line"),
        }
    }
    None
}

pub fn resolve_latest_step_id<Q>(env: &JobEnv, query: &Q) -> Result<StepId, ResolveError>
where
    Q: StepQuery + ?Sized,
{
    let user = env.user.as_deref().ok_or(ResolveError::MissingUser)?;
    let jobid = env.jobid.as_deref().ok_or(ResolveError::MissingJobId)?;

    let out = query
        .list_steps(user, jobid)
        .map_err(|source| ResolveError::Spawn {
            tool: query.tool().to_string(),
            source,
        })?;
    if !out.status.success() {
        return Err(ResolveError::QueryFailed {
            tool: query.tool().to_string(),
            status: out.status,
        });
    }

    select_latest_step(&out.stdout)
        .map(|r| r.id)
        .ok_or_else(|| ResolveError::NoStep(jobid.to_string()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    struct Canned {
        code: i32,
        stdout: &'static str,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Canned {
        fn new(code: i32, stdout: &'static str) -> Self {
            Canned {
                code,
                stdout,
                calls: RefCell::new(vec![]),
            }
        }
    }

    impl StepQuery for Canned {
        fn list_steps(&self, user: &str, jobid: &str) -> io::Result<Captured> {
            self.calls
                .borrow_mut()
                .push((user.to_string(), jobid.to_string()));
            Ok(Captured {
                status: status(self.code),
                stdout: self.stdout.to_string(),
            })
        }
    }

    fn job_env() -> JobEnv {
        JobEnv {
            user: Some("moody20".into()),
            jobid: Some("123".into()),
            ..Default::default()
        }
    }

    const LISTING: &str = "\
         123.2     a.out  pbatch  moody20  0:02 n[1-4]
         123.1     a.out  pbatch  moody20  1:07 n[1-4]
         123.0     a.out  pbatch  moody20  3:12 n[1-4]
     123.batch     batch  pbatch  moody20  3:30 n1
";

    #[test]
    fn query_command_line() {
        assert_eq!(
            step_query_argv("squeue", "moody20", "123"),
            ["squeue", "-h", "-s", "-u", "moody20", "-j", "123", "-S", "-i"]
        );
    }

    #[test]
    fn parse_records() {
        let r = StepRecord::parse("  123.2  a.out pbatch").unwrap();
        assert_eq!(r.id.to_string(), "123.2");
        assert_eq!(r.kind, StepKind::Launch);
        assert_eq!(r.fields, ["a.out", "pbatch"]);

        assert_eq!(StepRecord::parse("123.0").unwrap().kind, StepKind::Allocation);
        assert_eq!(StepRecord::parse("123.batch x").unwrap().kind, StepKind::Batch);
        assert!(StepRecord::parse("").is_none());
        assert!(StepRecord::parse("STEPID NAME").is_none());
        assert!(StepRecord::parse("123. foo").is_none());
    }

    #[test]
    fn newest_launch_step_wins() -> Result<(), ResolveError> {
        let q = Canned::new(0, LISTING);
        assert_eq!(resolve_latest_step_id(&job_env(), &q)?.to_string(), "123.2");
        assert_eq!(
            q.calls.borrow().as_slice(),
            &[("moody20".to_string(), "123".to_string())]
        );
        Ok(())
    }

    #[test]
    fn output_order_is_trusted() {
        let out = "123.batch x\n123.1 x\n123.5 x\n";
        assert_eq!(select_latest_step(out).unwrap().id.step, "1");
    }

    #[test]
    fn only_allocation_and_batch() {
        let q = Canned::new(0, "123.0 a\n123.batch b\n\n");
        let e = resolve_latest_step_id(&job_env(), &q).unwrap_err();
        assert!(matches!(e, ResolveError::NoStep(ref j) if j == "123"));
        assert_eq!(e.sentinel(), None);
    }

    #[test]
    fn failed_query_ignores_stdout() {
        let q = Canned::new(1, LISTING);
        let e = resolve_latest_step_id(&job_env(), &q).unwrap_err();
        assert!(matches!(e, ResolveError::QueryFailed { .. }));
        assert_eq!(e.sentinel(), Some(-1));
    }

    #[test]
    fn missing_identity_skips_query() {
        let q = Canned::new(0, LISTING);

        let env = JobEnv {
            user: None,
            ..job_env()
        };
        assert!(matches!(
            resolve_latest_step_id(&env, &q),
            Err(ResolveError::MissingUser)
        ));

        let env = JobEnv {
            jobid: None,
            ..job_env()
        };
        assert!(matches!(
            resolve_latest_step_id(&env, &q),
            Err(ResolveError::MissingJobId)
        ));
        assert!(q.calls.borrow().is_empty());
    }

    #[test]
    fn missing_tool_is_spawn_error() {
        let q = Squeue {
            binary: "/definitely/not/squeue".into(),
        };
        let e = resolve_latest_step_id(&job_env(), &q).unwrap_err();
        assert!(matches!(e, ResolveError::Spawn { .. }));
        assert_eq!(e.sentinel(), None);
    }
}
