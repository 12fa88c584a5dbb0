//! JSON extraction from raw model output
//!
//! Backends return free text that is expected to contain one embedded
//! JSON object. This module digs it out: markdown fences stripped, a
//! balanced-brace scan that respects string literals and escapes, and
//! repair of the usual model-side JSON slop before parsing.

use anyhow::{anyhow, Result};
use serde_json::Value;

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// Extract the first balanced top-level JSON object from free text.
///
/// Braces inside string literals (and escaped quotes inside those
/// strings) do not count toward balance.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let clean = strip_markdown_fences(text);

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;
    let mut start = None;

    for (i, c) in clean.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &clean[s..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Remove trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes to regular quotes
    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    // Remove any control characters that might have slipped in
    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Parse the embedded JSON object out of a raw backend response.
pub fn parse_json(text: &str) -> Result<Value> {
    let json_str =
        extract_json_object(text).ok_or_else(|| anyhow!("no JSON object found in response"))?;

    match serde_json::from_str::<Value>(json_str) {
        Ok(value) => Ok(value),
        Err(initial_error) => {
            let fixed = fix_json_issues(json_str);
            serde_json::from_str::<Value>(&fixed)
                .map_err(|_| anyhow!("response is not valid JSON: {initial_error}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let text = "Here you go:\n{\"a\": 1}\nEnjoy.";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_through_markdown_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_braces_inside_strings_do_not_count() {
        let text = "{\"doc\": \"uses {braces} and a \\\" quote\"}";
        let parsed = parse_json(text).unwrap();
        assert_eq!(parsed["doc"], "uses {braces} and a \" quote");
    }

    #[test]
    fn test_unbalanced_braces_yield_nothing() {
        assert!(extract_json_object("{\"a\": {\"b\": 1}").is_none());
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn test_ignores_stray_closing_brace() {
        let text = "}\n{\"a\": 1}";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_parse_json_repairs_trailing_commas() {
        let text = "{\"a\": [1, 2,], \"b\": 3,}";
        let parsed = parse_json(text).unwrap();
        assert_eq!(parsed["b"], 3);
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert!(parse_json("{\"a\": oops}").is_err());
    }
}
