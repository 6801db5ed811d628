//! Values flowing between stages.
//!
//! Every stage receives and returns a [`PipelineValue`]. The variant set is
//! closed: stages branch on it with an exhaustive `match` instead of probing
//! types at run time.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::variables::VariableStore;

/// A file produced by a stage: its path plus, for persistent files, the open handle.
///
/// Clones share one descriptor slot. Closing through any clone closes it for
/// all of them. The runner closes or deletes the file at the end of the run
/// depending on its name.
#[derive(Clone)]
pub struct FileHandle {
    path: PathBuf,
    handle: Arc<Mutex<Option<File>>>,
}

impl FileHandle {
    pub fn open(path: impl Into<PathBuf>, file: File) -> Self {
        Self {
            path: path.into(),
            handle: Arc::new(Mutex::new(Some(file))),
        }
    }

    /// A handle whose descriptor has already been closed.
    pub fn closed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    /// Final path component, the part checked against the temporary prefix.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Remove the descriptor from the shared slot; every clone then reports closed.
    pub(crate) fn take_file(&self) -> Option<File> {
        self.slot().take()
    }

    fn slot(&self) -> MutexGuard<'_, Option<File>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PipelineValue {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    File(FileHandle),
    Struct(Value),
    /// Marker returned by a bind stage; the runner stores `value` under `name`.
    Variable {
        name: String,
        value: Box<PipelineValue>,
    },
    Split {
        left: Box<PipelineValue>,
        right: Box<PipelineValue>,
    },
    /// Input handed to command stages: the previous raw output plus the bindings.
    Intercepted {
        raw: Box<PipelineValue>,
        bindings: VariableStore,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Empty,
    Text,
    Bytes,
    File,
    Struct,
    Variable,
    Split,
    Intercepted,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Empty => "empty",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::File => "file",
            ValueKind::Struct => "struct",
            ValueKind::Variable => "variable",
            ValueKind::Split => "split",
            ValueKind::Intercepted => "intercepted",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineValue {
    pub fn text(s: impl Into<String>) -> Self {
        PipelineValue::Text(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        PipelineValue::Bytes(b.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            PipelineValue::Empty => ValueKind::Empty,
            PipelineValue::Text(_) => ValueKind::Text,
            PipelineValue::Bytes(_) => ValueKind::Bytes,
            PipelineValue::File(_) => ValueKind::File,
            PipelineValue::Struct(_) => ValueKind::Struct,
            PipelineValue::Variable { .. } => ValueKind::Variable,
            PipelineValue::Split { .. } => ValueKind::Split,
            PipelineValue::Intercepted { .. } => ValueKind::Intercepted,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PipelineValue::Empty)
    }

    /// Textual form used for substitution: decoded text, or the path of a file.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PipelineValue::Text(s) => Some(s.clone()),
            PipelineValue::Bytes(b) => Some(String::from_utf8_lossy(b).to_string()),
            PipelineValue::File(f) => Some(f.display_path()),
            PipelineValue::Empty
            | PipelineValue::Struct(_)
            | PipelineValue::Variable { .. }
            | PipelineValue::Split { .. }
            | PipelineValue::Intercepted { .. } => None,
        }
    }

    /// Raw content of a Text or Bytes value.
    pub fn content_bytes(&self) -> Option<&[u8]> {
        match self {
            PipelineValue::Text(s) => Some(s.as_bytes()),
            PipelineValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PipelineValue::Empty => json!({ "kind": "empty" }),
            PipelineValue::Text(s) => json!({ "kind": "text", "value": s }),
            PipelineValue::Bytes(b) => {
                json!({ "kind": "bytes", "value": String::from_utf8_lossy(b) })
            }
            PipelineValue::File(f) => json!({ "kind": "file", "path": f.display_path() }),
            PipelineValue::Struct(v) => json!({ "kind": "struct", "value": v }),
            PipelineValue::Variable { name, value } => {
                json!({ "kind": "variable", "name": name, "value": value.to_json() })
            }
            PipelineValue::Split { left, right } => {
                json!({ "kind": "split", "left": left.to_json(), "right": right.to_json() })
            }
            PipelineValue::Intercepted { raw, bindings } => json!({
                "kind": "intercepted",
                "raw": raw.to_json(),
                "bindings": bindings.names(),
            }),
        }
    }
}

impl Serialize for PipelineValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for PipelineValue {
    fn from(s: &str) -> Self {
        PipelineValue::Text(s.to_string())
    }
}

impl From<String> for PipelineValue {
    fn from(s: String) -> Self {
        PipelineValue::Text(s)
    }
}

impl From<Vec<u8>> for PipelineValue {
    fn from(b: Vec<u8>) -> Self {
        PipelineValue::Bytes(b)
    }
}

impl From<Value> for PipelineValue {
    fn from(v: Value) -> Self {
        PipelineValue::Struct(v)
    }
}

impl From<FileHandle> for PipelineValue {
    fn from(f: FileHandle) -> Self {
        PipelineValue::File(f)
    }
}
