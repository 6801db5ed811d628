//! Run-scoped, write-once variable bindings.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result, VARIABLE_NAME_PATTERN};
use crate::value::PipelineValue;

/// Placeholder name bound to the previous stage's text or bytes.
pub const CONTENT: &str = "content";
/// Placeholder name bound to the previous stage's file path.
pub const FILE: &str = "file";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(VARIABLE_NAME_PATTERN).expect("static pattern compiles"))
}

pub fn is_reserved(name: &str) -> bool {
    name == CONTENT || name == FILE
}

/// Check that `name` is usable as a binding: letters only, not `content` or `file`.
pub fn validate_name(name: &str) -> Result<()> {
    if is_reserved(name) || !name_pattern().is_match(name) {
        return Err(Error::invalid_variable(name));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    vars: HashMap<String, PipelineValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. A name can be bound once per store.
    pub fn bind(&mut self, name: &str, value: PipelineValue) -> Result<()> {
        validate_name(name)?;
        if self.vars.contains_key(name) {
            return Err(Error::duplicate_variable(name));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PipelineValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PipelineValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }
}
