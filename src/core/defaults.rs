use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_SHELL: &str = "bash";
pub const TEMPORARY_FILE_PREFIX: &str = "pipewright-temporary-file";
pub const CONFIG_FILE_NAME: &str = "pipewright.json";
pub const SHELL_ENV_VAR: &str = "PIPEWRIGHT_SHELL";

/// What a run returns when a cleanup step fails after a stage already failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupErrorPolicy {
    /// The cleanup failure is returned; the stage error is kept under `details.maskedError`.
    #[default]
    Replace,
    /// The stage error is returned; the cleanup failure is kept under `details.cleanupError`.
    PreferStage,
}

/// Engine settings, overridable via pipewright.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Shell used as `<shell> -c <command>` by command stages.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Name prefix marking engine-created files that are deleted at run end.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    #[serde(default)]
    pub cleanup_errors: CleanupErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            temp_prefix: default_temp_prefix(),
            cleanup_errors: CleanupErrorPolicy::default(),
        }
    }
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_temp_prefix() -> String {
    TEMPORARY_FILE_PREFIX.to_string()
}

impl EngineConfig {
    pub fn from_json(content: &str, source: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(content).map_err(|e| Error::config_invalid_json(source, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// Order: the explicit path if given, else `pipewright.json` in the
    /// working directory if it exists, else built-in defaults. The
    /// `PIPEWRIGHT_SHELL` environment variable overrides the shell afterwards.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let candidate = PathBuf::from(CONFIG_FILE_NAME);
                candidate.is_file().then_some(candidate)
            }
        };

        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
                })?;
                log_status!("config", "Loaded {}", path.display());
                Self::from_json(&content, &path.to_string_lossy())?
            }
            None => Self::default(),
        };

        if let Ok(shell) = env::var(SHELL_ENV_VAR) {
            if !shell.trim().is_empty() {
                config.shell = shell.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(Error::config_invalid_value("shell", "shell cannot be empty"));
        }
        // An empty prefix would classify every file as temporary.
        if self.temp_prefix.is_empty() {
            return Err(Error::config_invalid_value(
                "temp_prefix",
                "temporary file prefix cannot be empty",
            ));
        }
        Ok(())
    }
}
