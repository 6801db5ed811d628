//! `#{name}` placeholder resolution for command templates.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::value::PipelineValue;
use crate::variables::{VariableStore, CONTENT, FILE};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#\{([a-zA-Z]+)\}").expect("static pattern compiles"))
}

/// Identifiers referenced by `template`, sorted and deduplicated.
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolve the ambient `#{content}` / `#{file}` placeholders and every bound variable.
///
/// Placeholders naming nothing known are left as-is. The template is scanned
/// once, so text inserted for one placeholder is never expanded again.
pub fn substitute(template: &str, bindings: &VariableStore, ambient: &PipelineValue) -> Result<String> {
    let mut values: HashMap<String, String> = HashMap::new();

    match ambient {
        PipelineValue::Text(_) | PipelineValue::Bytes(_) => {
            if let Some(text) = ambient.as_text() {
                values.insert(CONTENT.to_string(), text);
            }
        }
        PipelineValue::File(handle) => {
            values.insert(FILE.to_string(), handle.display_path());
        }
        _ => {}
    }

    // Every binding must be renderable, referenced or not.
    for name in bindings.names() {
        if let Some(value) = bindings.get(&name) {
            let text = value
                .as_text()
                .ok_or_else(|| Error::unsupported_variable(&name, value.kind().as_str()))?;
            values.insert(name, text);
        }
    }

    let resolved = placeholder_pattern().replace_all(template, |caps: &Captures| {
        match values.get(&caps[1]) {
            Some(text) => text.clone(),
            None => caps[0].to_string(),
        }
    });
    Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FileHandle;

    #[test]
    fn resolves_bound_and_ambient_placeholders() {
        let mut store = VariableStore::new();
        store.bind("a", PipelineValue::text("X")).unwrap();
        store
            .bind("b", PipelineValue::File(FileHandle::closed("/tmp/y")))
            .unwrap();

        let out = substitute("#{a}-#{content}-#{b}", &store, &PipelineValue::text("Z")).unwrap();
        assert_eq!(out, "X-Z-/tmp/y");
    }

    #[test]
    fn unbound_placeholders_pass_through() {
        let store = VariableStore::new();
        let out = substitute("echo #{nope}", &store, &PipelineValue::Empty).unwrap();
        assert_eq!(out, "echo #{nope}");
    }

    #[test]
    fn file_ambient_fills_file_not_content() {
        let store = VariableStore::new();
        let ambient = PipelineValue::File(FileHandle::closed("/tmp/in.json"));
        let out = substitute("cat #{file} #{content}", &store, &ambient).unwrap();
        assert_eq!(out, "cat /tmp/in.json #{content}");
    }

    #[test]
    fn replaces_every_occurrence() {
        let store = VariableStore::new();
        let out = substitute("#{content}#{content}", &store, &PipelineValue::bytes(b"ab".to_vec()))
            .unwrap();
        assert_eq!(out, "abab");
    }

    #[test]
    fn struct_binding_is_unsupported() {
        let mut store = VariableStore::new();
        store
            .bind("data", PipelineValue::Struct(serde_json::json!({"k": 1})))
            .unwrap();

        let err = substitute("echo", &store, &PipelineValue::Empty).unwrap_err();
        assert_eq!(err.code.as_str(), "type.unsupported_variable");
        assert_eq!(err.details["name"], "data");
        assert_eq!(err.details["kind"], "struct");
    }

    #[test]
    fn placeholders_lists_identifiers() {
        assert_eq!(
            placeholders("#{b} #{a} #{b} #{not_valid} #{}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn inserted_text_is_not_expanded_again() {
        let mut store = VariableStore::new();
        store.bind("a", PipelineValue::text("#{b}")).unwrap();
        store.bind("b", PipelineValue::text("X")).unwrap();

        for _ in 0..50 {
            let out = substitute("echo #{a} #{b}", &store, &PipelineValue::Empty).unwrap();
            assert_eq!(out, "echo #{b} X");
        }
    }

    #[test]
    fn content_containing_placeholders_stays_literal() {
        let mut store = VariableStore::new();
        store.bind("a", PipelineValue::text("X")).unwrap();
        let out = substitute("#{content}", &store, &PipelineValue::text("#{a}")).unwrap();
        assert_eq!(out, "#{a}");
    }
}
