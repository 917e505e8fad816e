use std::io;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Runs `argv` directly (no shell), inheriting stderr and capturing stdout.
pub fn run_capture<S: AsRef<str>>(argv: &[S]) -> io::Result<Captured> {
    let argv: Vec<&str> = argv.iter().map(|a| a.as_ref()).collect();
    let (program, args) = argv.split_first().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
    })?;
    debug!(command = %crate::display_argv(&argv), "running");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()?;
    Ok(Captured {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_status() -> io::Result<()> {
        let c = run_capture(&["sh", "-c", "echo hello; exit 3"])?;
        assert_eq!(c.stdout, "hello\n");
        assert_eq!(c.status.code(), Some(3));
        Ok(())
    }

    #[test]
    fn empty_and_missing_commands() {
        let e = run_capture::<&str>(&[]).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e = run_capture(&["/definitely/not/a/binary"]).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
