use std::fmt::Display;
use std::path::Path;

use serde::de::DeserializeOwned;

pub use indexmap::{IndexMap, IndexSet};

pub use anyhow::{anyhow, bail, Context, Result};

pub mod env;
pub mod hostlist;
pub mod jobstep;
pub mod launcher;
pub mod logging;
pub mod process;

mod config;
pub use config::*;

/// Restore the default SIGPIPE action so piping into `head` exits quietly.
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

pub fn read_json<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let f = std::fs::File::open(path).with_context(|| format!("failed to read {:?}", path))?;
    serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("deserialization of {:?} failed", path))
}

/// Joins argv tokens with single spaces, for display only.
pub fn display_argv<S: Display>(argv: &[S]) -> String {
    let mut s = String::new();
    for (i, a) in argv.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&a.to_string());
    }
    s
}
