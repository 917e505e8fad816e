use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::JobEnv;
use crate::*;

pub const CONFIG_FILE: &str = "launch.json";

pub fn config_directory() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow!("unable to determine user config directory"))?;
    p.push("scr-launch-tools");
    Ok(p)
}

/// Launcher settings, read from `<config dir>/scr-launch-tools/launch.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub launcher: String,
    pub hostfile: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            launcher: "mpirun".to_string(),
            hostfile: None,
        }
    }
}

impl LaunchConfig {
    pub fn load() -> Result<Self> {
        match config_directory() {
            Ok(dir) => Self::load_from(dir.join(CONFIG_FILE)),
            Err(e) => {
                debug!("{}, using default launch config", e);
                Ok(Self::default())
            }
        }
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no launch config file");
            return Ok(Self::default());
        }
        read_json(path)
    }

    /// The configured host file, or `<prefix>/.scr/hostfile`.
    pub fn hostfile_path(&self, env: &JobEnv) -> PathBuf {
        match &self.hostfile {
            Some(p) => p.clone(),
            None => env.prefix.join(".scr").join("hostfile"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let c = LaunchConfig::load_from(dir.path().join(CONFIG_FILE))?;
        assert_eq!(c, LaunchConfig::default());
        assert_eq!(c.launcher, "mpirun");
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"hostfile": "/p/run/hosts"}"#)?;
        let c = LaunchConfig::load_from(&path)?;
        assert_eq!(c.launcher, "mpirun");
        assert_eq!(c.hostfile, Some(PathBuf::from("/p/run/hosts")));

        std::fs::write(&path, "not json")?;
        assert!(LaunchConfig::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn hostfile_defaults_under_prefix() {
        let env = JobEnv {
            prefix: PathBuf::from("/p/run"),
            ..Default::default()
        };
        let c = LaunchConfig::default();
        assert_eq!(c.hostfile_path(&env), PathBuf::from("/p/run/.scr/hostfile"));

        let c = LaunchConfig {
            hostfile: Some("/tmp/h".into()),
            ..c
        };
        assert_eq!(c.hostfile_path(&env), PathBuf::from("/tmp/h"));
    }
}
