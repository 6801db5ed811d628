//! JSON pipeline definitions.
//!
//! ```json
//! {
//!   "stages": [
//!     { "type": "insert", "value": "hello" },
//!     { "type": "bind", "name": "greeting" },
//!     { "type": "insert" },
//!     { "type": "exec", "command": "echo -n \"#{greeting}\"" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::EngineConfig;
use crate::error::{Error, Result};
use crate::split::split_with;
use crate::stage::Stage;
use crate::stages;
use crate::substitution::placeholders;
use crate::utils::io::OpenMode;
use crate::value::PipelineValue;
use crate::variables::{is_reserved, validate_name};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub stages: Vec<StageDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageDefinition {
    Insert {
        /// `null`/absent inserts an empty value, a string inserts text, anything else a struct.
        #[serde(default)]
        value: Value,
    },
    Bind {
        name: String,
    },
    Exec {
        command: String,
    },
    MarshalJson,
    UnmarshalJson,
    WriteFile {
        path: String,
    },
    ReadFile {
        path: String,
    },
    LoadFile {
        path: String,
        #[serde(default)]
        mode: OpenMode,
    },
    WriteTempFile,
    ExcludeLines {
        #[serde(default = "default_separator")]
        separator: String,
        exclude: Vec<String>,
    },
    Split {
        #[serde(default)]
        left: Vec<StageDefinition>,
        #[serde(default)]
        right: Vec<StageDefinition>,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}

/// Findings of a static check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub stages: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn insert_value(value: &Value) -> PipelineValue {
    match value {
        Value::Null => PipelineValue::Empty,
        Value::String(s) => PipelineValue::Text(s.clone()),
        other => PipelineValue::Struct(other.clone()),
    }
}

impl PipelineDefinition {
    pub fn from_json(content: &str, source: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            Error::invalid_definition(source, e.to_string())
                .with_hint("Each stage needs a \"type\", e.g. {\"type\": \"exec\", \"command\": \"ls\"}")
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        Self::from_json(&content, &path.to_string_lossy())
    }

    /// Build runnable stages; command and temp-file stages use `config`.
    pub fn build(&self, config: &EngineConfig) -> Vec<Stage> {
        build_stages(&self.stages, config)
    }

    /// Validate binding names and duplicate binds without running anything.
    ///
    /// Unbound placeholders and file names colliding with the temporary
    /// prefix are reported as warnings.
    pub fn check(&self, config: &EngineConfig) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        check_stages(&self.stages, "stages", config, &mut HashSet::new(), &mut report)?;
        Ok(report)
    }
}

fn build_stages(defs: &[StageDefinition], config: &EngineConfig) -> Vec<Stage> {
    defs.iter().map(|def| build_stage(def, config)).collect()
}

fn build_stage(def: &StageDefinition, config: &EngineConfig) -> Stage {
    match def {
        StageDefinition::Insert { value } => stages::insert(insert_value(value)),
        StageDefinition::Bind { name } => stages::bind(name.clone()),
        StageDefinition::Exec { command } => {
            stages::exec_with_shell(config.shell.clone(), command.clone())
        }
        StageDefinition::MarshalJson => stages::marshal_json(),
        StageDefinition::UnmarshalJson => stages::unmarshal_json(),
        StageDefinition::WriteFile { path } => stages::write_file(expand_path(path)),
        StageDefinition::ReadFile { path } => stages::read_file(expand_path(path)),
        StageDefinition::LoadFile { path, mode } => {
            stages::load_file_handle(expand_path(path), *mode)
        }
        StageDefinition::WriteTempFile => stages::write_temp_file_with(config.temp_prefix.clone()),
        StageDefinition::ExcludeLines { separator, exclude } => {
            let exclusions: Vec<&str> = exclude.iter().map(String::as_str).collect();
            stages::exclude_lines(separator.clone(), &exclusions)
        }
        StageDefinition::Split { left, right } => split_with(
            config.clone(),
            build_stages(left, config),
            build_stages(right, config),
        ),
    }
}

fn check_stages(
    defs: &[StageDefinition],
    path: &str,
    config: &EngineConfig,
    bound: &mut HashSet<String>,
    report: &mut CheckReport,
) -> Result<()> {
    for (index, def) in defs.iter().enumerate() {
        let at = format!("{}[{}]", path, index);
        report.stages += 1;

        match def {
            StageDefinition::Bind { name } => {
                validate_name(name).map_err(|e| e.with_hint(format!("at {}", at)))?;
                if !bound.insert(name.clone()) {
                    return Err(Error::duplicate_variable(name).with_hint(format!("at {}", at)));
                }
            }
            StageDefinition::Exec { command } => {
                for name in placeholders(command) {
                    if !is_reserved(&name) && !bound.contains(&name) {
                        report.warnings.push(format!(
                            "{}: #{{{}}} is never bound and will be passed through literally",
                            at, name
                        ));
                    }
                }
                if index > 0 && matches!(defs[index - 1], StageDefinition::Bind { .. }) {
                    report.warnings.push(format!(
                        "{}: follows a bind stage, so #{{content}} and #{{file}} will not resolve",
                        at
                    ));
                }
            }
            StageDefinition::WriteFile { path: file } | StageDefinition::LoadFile { path: file, .. } => {
                let expanded = expand_path(file);
                let name = expanded
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if name.starts_with(&config.temp_prefix) {
                    report.warnings.push(format!(
                        "{}: '{}' starts with the temporary prefix and will be deleted at run end",
                        at, file
                    ));
                }
            }
            StageDefinition::Split { left, right } => {
                // Branches start with an empty store of their own.
                check_stages(left, &format!("{}.left", at), config, &mut HashSet::new(), report)?;
                check_stages(right, &format!("{}.right", at), config, &mut HashSet::new(), report)?;
            }
            StageDefinition::Insert { .. }
            | StageDefinition::MarshalJson
            | StageDefinition::UnmarshalJson
            | StageDefinition::ReadFile { .. }
            | StageDefinition::WriteTempFile
            | StageDefinition::ExcludeLines { .. } => {}
        }
    }
    Ok(())
}
