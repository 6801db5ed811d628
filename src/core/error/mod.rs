use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationInvalidVariable,
    ValidationDuplicateVariable,
    ValidationInvalidDefinition,

    TypeMismatch,
    TypeUnsupportedVariable,

    ExecutionSpawnFailed,
    ExecutionCommandFailed,
    ExecutionDrainFailed,

    ResourceCreateFailed,
    ResourceCloseFailed,
    ResourceDeleteFailed,

    ConfigInvalidJson,
    ConfigInvalidValue,

    InternalIoError,
    InternalJsonError,
}

/// Coarse grouping of error codes: which part of a run produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    TypeMismatch,
    Execution,
    Resource,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationInvalidVariable => "validation.invalid_variable",
            ErrorCode::ValidationDuplicateVariable => "validation.duplicate_variable",
            ErrorCode::ValidationInvalidDefinition => "validation.invalid_definition",

            ErrorCode::TypeMismatch => "type.mismatch",
            ErrorCode::TypeUnsupportedVariable => "type.unsupported_variable",

            ErrorCode::ExecutionSpawnFailed => "execution.spawn_failed",
            ErrorCode::ExecutionCommandFailed => "execution.command_failed",
            ErrorCode::ExecutionDrainFailed => "execution.drain_failed",

            ErrorCode::ResourceCreateFailed => "resource.create_failed",
            ErrorCode::ResourceCloseFailed => "resource.close_failed",
            ErrorCode::ResourceDeleteFailed => "resource.delete_failed",

            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::ValidationInvalidVariable
            | ErrorCode::ValidationDuplicateVariable
            | ErrorCode::ValidationInvalidDefinition
            | ErrorCode::ConfigInvalidJson
            | ErrorCode::ConfigInvalidValue => ErrorCategory::Validation,

            ErrorCode::TypeMismatch | ErrorCode::TypeUnsupportedVariable => {
                ErrorCategory::TypeMismatch
            }

            ErrorCode::ExecutionSpawnFailed
            | ErrorCode::ExecutionCommandFailed
            | ErrorCode::ExecutionDrainFailed => ErrorCategory::Execution,

            ErrorCode::ResourceCreateFailed
            | ErrorCode::ResourceCloseFailed
            | ErrorCode::ResourceDeleteFailed => ErrorCategory::Resource,

            ErrorCode::InternalIoError | ErrorCode::InternalJsonError => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidVariableDetails {
    pub name: String,
    pub pattern: String,
    pub reserved: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateVariableDetails {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMismatchDetails {
    pub stage: String,
    pub expected: Vec<String>,
    pub received: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedVariableDetails {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

pub const VARIABLE_NAME_PATTERN: &str = "^[a-zA-Z]+$";

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn invalid_variable(name: impl Into<String>) -> Self {
        let details = to_details(InvalidVariableDetails {
            name: name.into(),
            pattern: VARIABLE_NAME_PATTERN.to_string(),
            reserved: vec!["content".to_string(), "file".to_string()],
        });

        Self::new(
            ErrorCode::ValidationInvalidVariable,
            "not a valid variable name, must match: [a-zA-Z] (excluding: content, file)",
            details,
        )
    }

    pub fn duplicate_variable(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("variable: {} already exists", name);
        Self::new(
            ErrorCode::ValidationDuplicateVariable,
            message,
            to_details(DuplicateVariableDetails { name }),
        )
        .with_hint("Bind each name once per run; nested split branches get their own store")
    }

    pub fn invalid_definition(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidDefinition,
            format!("Invalid pipeline definition: {}", problem),
            serde_json::json!({ "field": field.into(), "problem": problem }),
        )
    }

    pub fn type_mismatch(stage: impl Into<String>, expected: &[&str], received: impl Into<String>) -> Self {
        let details = TypeMismatchDetails {
            stage: stage.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            received: received.into(),
        };
        let message = format!(
            "provided input must be {}, got {}",
            details.expected.join(" or "),
            details.received
        );
        Self::new(ErrorCode::TypeMismatch, message, to_details(details))
    }

    pub fn unsupported_variable(name: impl Into<String>, kind: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!(
            "don't know how to replace variable '{}', required: text, bytes or file",
            name
        );
        Self::new(
            ErrorCode::TypeUnsupportedVariable,
            message,
            to_details(UnsupportedVariableDetails {
                name,
                kind: kind.into(),
            }),
        )
    }

    pub fn spawn_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::ExecutionSpawnFailed,
            format!("failed to start command: {}", error),
            serde_json::json!({ "command": command.into(), "error": error }),
        )
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = match details.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "command terminated by signal".to_string(),
        };
        Self::new(ErrorCode::ExecutionCommandFailed, message, to_details(details))
    }

    pub fn drain_failed(stream: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::ExecutionDrainFailed,
            format!("failed reading {}: {}", stream, error),
            serde_json::json!({ "stream": stream, "error": error }),
        )
    }

    pub fn resource_create(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::resource(ErrorCode::ResourceCreateFailed, "create", path, error)
    }

    pub fn resource_close(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::resource(ErrorCode::ResourceCloseFailed, "close", path, error)
    }

    pub fn resource_delete(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::resource(ErrorCode::ResourceDeleteFailed, "delete", path, error)
    }

    fn resource(code: ErrorCode, action: &str, path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = ResourceDetails {
            path: path.into(),
            error: error.into(),
        };
        let message = format!("failed to {} {}: {}", action, details.path, details.error);
        Self::new(code, message, to_details(details))
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(key: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value: {}", problem),
            serde_json::json!({ "key": key.into(), "problem": problem }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalIoError,
            error.clone(),
            to_details(InternalErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalJsonError,
            error.clone(),
            to_details(InternalErrorDetails { error, context }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach a secondary error under `details.<key>` so it survives being superseded.
    pub fn with_related(mut self, key: &str, other: &Error) -> Self {
        let related = serde_json::json!({
            "code": other.code.as_str(),
            "message": other.message,
            "details": other.details,
        });
        match self.details {
            Value::Object(ref mut map) => {
                map.insert(key.to_string(), related);
            }
            _ => {
                let mut map = serde_json::Map::new();
                map.insert(key.to_string(), related);
                self.details = Value::Object(map);
            }
        }
        self
    }
}
