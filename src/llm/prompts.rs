//! Prompt templates for the documentation backends
//!
//! Templates carry `{name}` placeholders filled in by `format_prompt`.
//! Every backend receives the same templates; only transport differs.

use std::collections::HashMap;

/// Primary request: document one source fragment.
pub const DOCSTRINGS: &str = r#"You write Python docstrings. Analyze the source code below and produce docstrings for every class, method, and module-level function in it.

OUTPUT FORMAT (JSON, and nothing else):
{
  "docstrings": {
    "<ClassName>": {
      "docstring": "...",
      "example": "...",
      "methods": {"<method_name>": "..."}
    },
    "global_functions": {"<function_name>": "..."}
  }
}

RULES:
- Every class entry MUST contain a "docstring" field.
- Methods go under their class's "methods" object, never under global_functions.
- Module-level functions go under the reserved "global_functions" key.
- "example" is a short runnable snippet demonstrating the class; omit it for classes that need no example.
- Class docstring verbosity level: {class_docstrings_verbosity_level} of 5.
- Function/method docstring verbosity level: {function_docstrings_verbosity_level} of 5.
- Example verbosity level: {example_verbosity_level} of 5.
- No docstring line may exceed {max_line_length} characters.
- Use \n inside JSON strings for line breaks; do not emit literal newlines inside strings.
- This is attempt {retry_count}. The fragment may be one part of a larger file; document only what you see.

SOURCE CODE:
{source_code}"#;

/// Retry after a malformed or incomplete response.
pub const RETRY: &str = r#"Your previous response could not be used: {last_error_message}

Produce the ENTIRE corrected JSON object again, in the exact format requested before. Output only the JSON object - no commentary, no markdown fences. This is attempt {retry_count}."#;

/// Retry only the example snippets that failed syntax validation.
pub const RETRY_EXAMPLES: &str = r#"The example snippets you produced for the following classes are not valid Python: {class_names}

Return a JSON object with corrected examples for ONLY those classes:
{
  "docstrings": {
    "<ClassName>": {"docstring": "...", "example": "..."}
  }
}

Each example must be a syntactically valid Python snippet. Use \n inside JSON strings for line breaks. Output only the JSON object."#;

/// Secondary single-pass request for declarations still undocumented.
pub const MISSING_DOCSTRINGS: &str = r#"The following functions or classes still have no docstring: {function_names}

Return a JSON object with docstrings for ONLY those names, in this format:
{
  "docstrings": {
    "<ClassName>": {"docstring": "...", "methods": {"<method_name>": "..."}},
    "global_functions": {"<function_name>": "..."}
  }
}

Output only the JSON object - no commentary. This is attempt {retry_count}."#;

/// Replace each `{key}` placeholder with its value.
///
/// Unknown placeholders are left alone so a template with literal
/// braces (the JSON examples above) survives substitution.
pub fn format_prompt(template: &str, replacements: &HashMap<&str, String>) -> String {
    let mut prompt = template.to_string();
    for (key, value) in replacements {
        prompt = prompt.replace(&format!("{{{key}}}"), value);
    }
    prompt
}
