//! Merging and validation of documentation responses
//!
//! Partial JSON documentation maps arrive one per chunk; they are
//! deep-merged into a single map and validated against the wire shape
//! before anything touches the source file. Merge is associative and
//! order-insensitive for disjoint keys; colliding leaves are last-wins.

use crate::llm::parse;
use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

/// Reserved key grouping free (non-member) function entries.
pub const GLOBAL_FUNCTIONS: &str = "global_functions";

/// Wire key wrapping the documentation map in every response.
pub const DOCSTRINGS_KEY: &str = "docstrings";

/// Merged mapping from declaration name to documentation content.
pub type DocumentationMap = Map<String, Value>;

/// Which shape checks apply to a merged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full docstring response: every class needs a `docstring`.
    Full,
    /// Example-correction response: only examples are expected.
    ExamplesOnly,
    /// Missing-docstring response: partial coverage is the point.
    MissingOnly,
}

/// Outcome of validating a merged response. Never mutated after
/// creation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

/// Recursively merge two JSON values. Objects merge key-by-key;
/// anything else is overwritten by the later operand.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match merged.remove(&key) {
                    Some(existing) => {
                        merged.insert(key, deep_merge(existing, value));
                    }
                    None => {
                        merged.insert(key, value);
                    }
                }
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Fold a list of JSON objects into one, deeply merging nested maps.
pub fn merge_objects<I>(objects: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    objects
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}

/// Extract, merge, and validate the documentation map embedded in a set
/// of raw backend responses.
pub fn extract_docstrings(
    contents: &[&str],
    mode: ValidationMode,
    max_line_length: usize,
) -> Result<DocumentationMap> {
    let mut objects = Vec::with_capacity(contents.len());
    for content in contents {
        objects.push(parse::parse_json(content)?);
    }
    let merged = merge_objects(objects);

    let result = validate(&merged, mode, max_line_length);
    if !result.ok {
        return Err(anyhow!(
            "{}",
            result.reason.unwrap_or_else(|| "invalid response".to_string())
        ));
    }

    match merged.get(DOCSTRINGS_KEY) {
        Some(Value::Object(map)) if !map.is_empty() => Ok(map.clone()),
        _ => Err(anyhow!("No docstrings found in response.")),
    }
}

/// Validate a merged response object against the wire shape.
///
/// Any violation names the offending key in the reason.
pub fn validate(root: &Value, mode: ValidationMode, max_line_length: usize) -> ValidationResult {
    let docstrings = match root.get(DOCSTRINGS_KEY) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return ValidationResult::fail(
                "Invalid format: 'docstrings' should be an object.".to_string(),
            )
        }
        None if mode == ValidationMode::MissingOnly => return ValidationResult::ok(),
        None => {
            return ValidationResult::fail(
                "Invalid format: response has no 'docstrings' object.".to_string(),
            )
        }
    };

    if mode != ValidationMode::ExamplesOnly {
        for (key, value) in docstrings {
            if key == GLOBAL_FUNCTIONS {
                let Value::Object(functions) = value else {
                    return ValidationResult::fail(format!(
                        "Invalid format: global functions under '{key}' should be an object."
                    ));
                };
                let result = validate_docstring_strings(functions, max_line_length);
                if !result.ok {
                    return result;
                }
                continue;
            }

            // Every other key is a class entry.
            let Value::Object(class_doc) = value else {
                return ValidationResult::fail(format!(
                    "Invalid format: Class '{key}' should contain a 'docstring'."
                ));
            };
            if mode == ValidationMode::Full && !class_doc.contains_key("docstring") {
                return ValidationResult::fail(format!(
                    "Invalid format: Class '{key}' should contain a 'docstring'."
                ));
            }
            if let Some(methods) = class_doc.get("methods") {
                let Value::Object(methods) = methods else {
                    return ValidationResult::fail(format!(
                        "Invalid format: Methods under class '{key}' should be an object."
                    ));
                };
                let result = validate_docstring_strings(methods, max_line_length);
                if !result.ok {
                    return result;
                }
            }
            if let Some(Value::String(docstring)) = class_doc.get("docstring") {
                if let Some(line) = over_long_line(docstring, max_line_length) {
                    return ValidationResult::fail(format!(
                        "Docstring line in '{key}' exceeds maximum length of {max_line_length} characters: {line}"
                    ));
                }
            }
        }
    }

    // Legacy wire variant carries a sibling 'examples' object.
    if let Some(examples) = root.get("examples") {
        if !examples.is_object() {
            return ValidationResult::fail(
                "Invalid format: 'examples' should be an object.".to_string(),
            );
        }
    }

    ValidationResult::ok()
}

fn validate_docstring_strings(
    entries: &Map<String, Value>,
    max_line_length: usize,
) -> ValidationResult {
    for (name, doc) in entries {
        let Value::String(doc) = doc else {
            return ValidationResult::fail(format!(
                "Invalid format: docstring for '{name}' should be a string."
            ));
        };
        if over_long_line(doc, max_line_length).is_some() {
            return ValidationResult::fail(format!(
                "Docstring line in '{name}' exceeds maximum length of {max_line_length} characters."
            ));
        }
    }
    ValidationResult::ok()
}

fn over_long_line(doc: &str, max_line_length: usize) -> Option<&str> {
    // Escaped newlines arrive as literal \n sequences in the JSON
    // string; length limits apply to the lines after unescaping.
    doc.split("\\n")
        .flat_map(|part| part.split('\n'))
        .find(|line| line.chars().count() > max_line_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_recurses_into_objects() {
        let a = json!({"docstrings": {"A": {"docstring": "one"}}});
        let b = json!({"docstrings": {"B": {"docstring": "two"}}});
        let merged = deep_merge(a, b);
        assert_eq!(merged["docstrings"]["A"]["docstring"], "one");
        assert_eq!(merged["docstrings"]["B"]["docstring"], "two");
    }

    #[test]
    fn test_deep_merge_leaf_collision_is_last_wins() {
        let a = json!({"docstrings": {"A": {"docstring": "old", "example": "kept"}}});
        let b = json!({"docstrings": {"A": {"docstring": "new"}}});
        let merged = deep_merge(a, b);
        assert_eq!(merged["docstrings"]["A"]["docstring"], "new");
        assert_eq!(merged["docstrings"]["A"]["example"], "kept");
    }

    #[test]
    fn test_merge_is_associative_for_disjoint_leaves() {
        let a = json!({"docstrings": {"A": {"docstring": "a"}}});
        let b = json!({"docstrings": {"B": {"docstring": "b"}}});
        let c = json!({"docstrings": {"global_functions": {"f": "doc"}}});

        let all_at_once = merge_objects([a.clone(), b.clone(), c.clone()]);
        let left_first = deep_merge(deep_merge(a.clone(), b.clone()), c.clone());
        let right_first = deep_merge(a, deep_merge(b, c));

        assert_eq!(all_at_once, left_first);
        assert_eq!(all_at_once, right_first);
    }

    #[test]
    fn test_validate_rejects_class_without_docstring() {
        let root = json!({"docstrings": {"X": {"notdocstring": "y"}}});
        let result = validate(&root, ValidationMode::Full, 999);
        assert!(!result.ok);
        assert!(result.reason.unwrap().contains("X"));
    }

    #[test]
    fn test_validate_rejects_non_object_methods() {
        let root = json!({"docstrings": {"X": {"docstring": "d", "methods": "nope"}}});
        let result = validate(&root, ValidationMode::Full, 999);
        assert!(!result.ok);
        assert!(result.reason.unwrap().contains("X"));
    }

    #[test]
    fn test_validate_rejects_non_object_global_functions() {
        let root = json!({"docstrings": {"global_functions": ["f"]}});
        let result = validate(&root, ValidationMode::Full, 999);
        assert!(!result.ok);
        assert!(result.reason.unwrap().contains("global_functions"));
    }

    #[test]
    fn test_validate_enforces_line_length() {
        let root = json!({"docstrings": {"X": {"docstring": "short\\nbut this line is rather too long"}}});
        let result = validate(&root, ValidationMode::Full, 20);
        assert!(!result.ok);
        assert!(result.reason.unwrap().contains("X"));
    }

    #[test]
    fn test_examples_only_mode_skips_docstring_checks() {
        let root = json!({"docstrings": {"X": {"example": "print(1)"}}});
        let result = validate(&root, ValidationMode::ExamplesOnly, 999);
        assert!(result.ok);
    }

    #[test]
    fn test_extract_docstrings_merges_chunk_responses() {
        let part1 = r#"{"docstrings": {"A": {"docstring": "first"}}}"#;
        let part2 = r#"{"docstrings": {"global_functions": {"f": "second"}}}"#;
        let map = extract_docstrings(&[part1, part2], ValidationMode::Full, 999).unwrap();
        assert_eq!(map["A"]["docstring"], "first");
        assert_eq!(map[GLOBAL_FUNCTIONS]["f"], "second");
    }

    #[test]
    fn test_extract_docstrings_requires_some_content() {
        let empty = r#"{"docstrings": {}}"#;
        assert!(extract_docstrings(&[empty], ValidationMode::Full, 999).is_err());
    }
}
