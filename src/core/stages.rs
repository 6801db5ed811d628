//! Ready-made stages: value insertion, variable binding, shell commands,
//! JSON conversion, file access and line filtering.

use std::io::Write;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::defaults::{DEFAULT_SHELL, TEMPORARY_FILE_PREFIX};
use crate::error::{Error, Result};
use crate::process;
use crate::stage::{report_progress, Stage};
use crate::substitution::substitute;
use crate::utils::io::{self, OpenMode};
use crate::utils::lines;
use crate::value::{FileHandle, PipelineValue};
use crate::variables::validate_name;

fn content_of(stage: &str, input: &PipelineValue) -> Result<Vec<u8>> {
    input
        .content_bytes()
        .map(|b| b.to_vec())
        .ok_or_else(|| Error::type_mismatch(stage, &["text", "bytes"], input.kind().as_str()))
}

/// Discard the input and emit `value`.
pub fn insert(value: impl Into<PipelineValue>) -> Stage {
    let value = value.into();
    Stage::new("insert", move |_, progress| {
        report_progress(progress, "Inserting value into pipeline");
        Ok(value.clone())
    })
}

/// Save the input under `name`, referenced later as `#{name}` in command stages.
///
/// The next stage receives the binding marker rather than the input, so a
/// bind is normally followed by a stage that discards it (e.g. `insert`).
/// The name is checked when the stage runs.
pub fn bind(name: impl Into<String>) -> Stage {
    let name = name.into();
    Stage::new(format!("bind {}", name), move |input, _| {
        validate_name(&name)?;
        Ok(PipelineValue::Variable {
            name: name.clone(),
            value: Box::new(input),
        })
    })
}

/// Run a shell command built from `template`.
///
/// `#{content}` is the previous stage's text or bytes, `#{file}` the path of a
/// file it returned, and `#{name}` any bound variable. The output is the
/// command's stdout.
pub fn exec(template: impl Into<String>) -> Stage {
    exec_with_shell(DEFAULT_SHELL, template)
}

pub fn exec_with_shell(shell: impl Into<String>, template: impl Into<String>) -> Stage {
    let shell = shell.into();
    let template = template.into();
    Stage::command("exec", move |input, progress: &mut dyn Write| {
        let (raw, bindings) = match input {
            PipelineValue::Intercepted { raw, bindings } => (raw, bindings),
            other => {
                return Err(
                    Error::type_mismatch("exec", &["intercepted"], other.kind().as_str())
                        .with_hint("exec command wasn't intercepted; run it through a Runner"),
                )
            }
        };

        let command = substitute(&template, &bindings, &raw)?;
        report_progress(progress, &format!("Executing command: {}", command));
        let output = process::execute(&shell, &command, progress)?;
        Ok(PipelineValue::Bytes(output.stdout))
    })
}

/// Serialize the input as compact JSON bytes.
pub fn marshal_json() -> Stage {
    Stage::new("marshal_json", |input, progress| {
        report_progress(progress, "Marshalling provided content as JSON");
        let json = match &input {
            PipelineValue::Empty => Value::Null,
            PipelineValue::Struct(v) => v.clone(),
            PipelineValue::Text(_) | PipelineValue::Bytes(_) | PipelineValue::File(_) => {
                Value::String(input.as_text().unwrap_or_default())
            }
            PipelineValue::Variable { .. }
            | PipelineValue::Split { .. }
            | PipelineValue::Intercepted { .. } => input.to_json(),
        };
        serde_json::to_vec(&json)
            .map(PipelineValue::Bytes)
            .map_err(|e| Error::internal_json(e.to_string(), Some("marshal_json".to_string())))
    })
}

/// Parse text or bytes as JSON into a `Struct` value.
pub fn unmarshal_json() -> Stage {
    Stage::new("unmarshal_json", |input, progress| {
        report_progress(progress, "Unmarshalling provided JSON data into struct");
        let content = content_of("unmarshal_json", &input)?;
        serde_json::from_slice::<Value>(&content)
            .map(PipelineValue::Struct)
            .map_err(|e| Error::internal_json(e.to_string(), Some("unmarshal_json".to_string())))
    })
}

/// Like [`unmarshal_json`], but the JSON must deserialize into `T`; the
/// emitted value is `T` serialized back, so unknown fields are dropped.
pub fn unmarshal_json_as<T>() -> Stage
where
    T: DeserializeOwned + Serialize + 'static,
{
    let type_name = std::any::type_name::<T>();
    Stage::new(format!("unmarshal_json<{}>", type_name), move |input, progress| {
        report_progress(progress, &format!("Unmarshalling provided JSON data into {}", type_name));
        let content = content_of("unmarshal_json", &input)?;
        let typed: T = serde_json::from_slice(&content)
            .map_err(|e| Error::internal_json(e.to_string(), Some(type_name.to_string())))?;
        serde_json::to_value(typed)
            .map(PipelineValue::Struct)
            .map_err(|e| Error::internal_json(e.to_string(), Some(type_name.to_string())))
    })
}

/// Write text or bytes to `path` and emit an open read handle to it.
///
/// The file is kept after the run; only its handle is closed.
pub fn write_file(path: impl Into<PathBuf>) -> Stage {
    let path = path.into();
    Stage::new("write_file", move |input, progress| {
        let content = content_of("write_file", &input)?;
        report_progress(progress, &format!("Writing content to file: {}", path.display()));
        io::write_bytes(&path, &content)?;
        let file = io::open(&path, OpenMode::Read)?;
        Ok(PipelineValue::File(FileHandle::open(&path, file)))
    })
}

/// Open a handle to `path`, discarding the input.
pub fn load_file_handle(path: impl Into<PathBuf>, mode: OpenMode) -> Stage {
    let path = path.into();
    Stage::new("load_file", move |_, progress| {
        report_progress(progress, &format!("Loading file handler to: {}", path.display()));
        let file = io::open(&path, mode)?;
        Ok(PipelineValue::File(FileHandle::open(&path, file)))
    })
}

/// Emit the bytes of `path`, discarding the input.
pub fn read_file(path: impl Into<PathBuf>) -> Stage {
    let path = path.into();
    Stage::new("read_file", move |_, progress| {
        report_progress(progress, &format!("Reading content of file: {}", path.display()));
        io::read_bytes(&path, "read_file").map(PipelineValue::Bytes)
    })
}

/// Write text or bytes to a new temporary file, deleted when the run ends.
pub fn write_temp_file() -> Stage {
    write_temp_file_with(TEMPORARY_FILE_PREFIX)
}

/// Like [`write_temp_file`] with a custom name prefix. The runner only deletes
/// the file if the prefix matches its configured temporary prefix.
pub fn write_temp_file_with(prefix: impl Into<String>) -> Stage {
    let prefix = prefix.into();
    Stage::new("write_temp_file", move |input, progress| {
        let content = content_of("write_temp_file", &input)?;
        let path = io::write_temp(&prefix, &content)?;
        report_progress(progress, &format!("Created temporary file: {}", path.display()));
        Ok(PipelineValue::File(FileHandle::closed(path)))
    })
}

/// Remove every line containing any of `exclusions`.
///
/// Input other than text or bytes yields empty text.
pub fn exclude_lines(separator: impl Into<String>, exclusions: &[&str]) -> Stage {
    let separator = separator.into();
    let exclusions: Vec<String> = exclusions.iter().map(|s| s.to_string()).collect();
    Stage::new("exclude_lines", move |input, _| {
        let text = match &input {
            PipelineValue::Text(_) | PipelineValue::Bytes(_) => input.as_text().unwrap_or_default(),
            _ => String::new(),
        };
        Ok(PipelineValue::Text(lines::exclude(&text, &separator, &exclusions)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run;
    use serde::Deserialize;
    use std::fs;

    #[derive(Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn exec_outside_runner_is_rejected() {
        let mut sink = std::io::sink();
        let err = exec("echo hi").call(PipelineValue::Empty, &mut sink).unwrap_err();
        assert_eq!(err.code.as_str(), "type.mismatch");
    }

    #[test]
    fn bind_validates_name_when_run() {
        let stage = bind("myVar1");
        let mut sink = std::io::sink();
        let err = stage.call(PipelineValue::text("x"), &mut sink).unwrap_err();
        assert_eq!(
            err.message,
            "not a valid variable name, must match: [a-zA-Z] (excluding: content, file)"
        );
    }

    #[test]
    fn json_round_trip_is_compact() {
        let out = run(
            None,
            &[
                insert(r#"{"name": "bob"}"#),
                unmarshal_json(),
                marshal_json(),
            ],
        )
        .unwrap();
        assert_eq!(out, PipelineValue::bytes(br#"{"name":"bob"}"#.to_vec()));
    }

    #[test]
    fn unmarshal_rejects_malformed_json() {
        let err = run(None, &[insert(r#""name": "bob"}"#), unmarshal_json()]).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.json_error");
    }

    #[test]
    fn unmarshal_rejects_non_text_input() {
        let err = run(None, &[insert(PipelineValue::Empty), unmarshal_json()]).unwrap_err();
        assert_eq!(err.code.as_str(), "type.mismatch");
        assert_eq!(err.details["received"], "empty");
    }

    #[test]
    fn typed_unmarshal_drops_unknown_fields() {
        let out = run(
            None,
            &[
                insert(r#"{"name": "bob", "age": 3}"#),
                unmarshal_json_as::<Greeting>(),
            ],
        )
        .unwrap();
        assert_eq!(out, PipelineValue::Struct(serde_json::json!({"name": "bob"})));
    }

    #[test]
    fn typed_unmarshal_requires_fields() {
        let err = run(None, &[insert(r#"{"age": 3}"#), unmarshal_json_as::<Greeting>()])
            .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.json_error");
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("something");
        let out = run(
            None,
            &[insert("some content"), write_file(&path), read_file(&path)],
        )
        .unwrap();
        assert_eq!(out, PipelineValue::bytes(b"some content".to_vec()));
        assert!(path.exists());
    }

    #[test]
    fn exclude_lines_on_struct_yields_empty_text() {
        let out = run(
            None,
            &[
                insert(PipelineValue::Struct(serde_json::json!({"a": 1}))),
                exclude_lines("\n", &["a"]),
            ],
        )
        .unwrap();
        assert_eq!(out, PipelineValue::text(""));
    }

    #[test]
    fn temp_file_is_removed_after_run() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let observe = {
            let seen = std::sync::Arc::clone(&seen);
            Stage::new("observe", move |input: PipelineValue, _: &mut dyn Write| {
                if let PipelineValue::File(handle) = &input {
                    *seen.lock().unwrap() = Some(handle.path().to_path_buf());
                }
                Ok(input)
            })
        };

        run(None, &[insert("hello"), write_temp_file(), observe]).unwrap();
        let path = seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
        assert!(fs::metadata(&path).is_err());
    }
}
