//! Docstring insertion and example injection
//!
//! All insertion positions are computed against the original line array
//! before any text is emitted, so earlier insertions can never shift the
//! line numbers of later ones. Insertion is purely additive: an empty
//! documentation map returns the source unchanged, byte for byte.

use crate::docmap::{DocumentationMap, GLOBAL_FUNCTIONS};
use crate::index::{parser, DeclKind, Declaration, StructuralIndex};
use serde_json::Value;
use std::collections::BTreeMap;

const INDENT_STEP: usize = 4;

/// A generated example that could not be injected.
#[derive(Debug, Clone)]
pub struct ExampleFailure {
    pub class_name: String,
    pub reason: String,
}

/// Insert every docstring in `map` into `source`.
///
/// Class docstrings go after the `class` line, method docstrings after
/// their own `def` line, and `global_functions` entries after each
/// module-level `def`. Names that no longer resolve to a declaration
/// are skipped.
pub fn insert_docstrings(source: &str, map: &DocumentationMap) -> String {
    let index = StructuralIndex::build(source);
    let mut insertions: BTreeMap<usize, String> = BTreeMap::new();

    for (name, entry) in map {
        if name == GLOBAL_FUNCTIONS {
            let Value::Object(functions) = entry else {
                continue;
            };
            for (func_name, doc) in functions {
                let Value::String(doc) = doc else { continue };
                if let Some(decl) = find_top_level_function(&index, func_name) {
                    insertions.insert(decl.start_line - 1, format_docstring(doc, decl.indent));
                }
            }
            continue;
        }

        let Value::Object(class_doc) = entry else {
            continue;
        };
        let Some(class_decl) = index.find_class(name) else {
            continue;
        };
        if let Some(Value::String(doc)) = class_doc.get("docstring") {
            insertions.insert(
                class_decl.start_line - 1,
                format_docstring(doc, class_decl.indent),
            );
        }
        if let Some(Value::Object(methods)) = class_doc.get("methods") {
            for (method_name, doc) in methods {
                let Value::String(doc) = doc else { continue };
                if let Some(method) = find_method(class_decl, method_name) {
                    insertions.insert(method.start_line - 1, format_docstring(doc, method.indent));
                }
            }
        }
    }

    apply_insertions(source, &insertions)
}

/// Per-class example snippets carried alongside the docstrings.
pub fn collect_examples(map: &DocumentationMap) -> Vec<(String, String)> {
    map.iter()
        .filter(|(name, _)| name.as_str() != GLOBAL_FUNCTIONS)
        .filter_map(|(name, entry)| {
            let example = entry.get("example")?.as_str()?;
            if example.trim().is_empty() {
                return None;
            }
            Some((name.clone(), example.to_string()))
        })
        .collect()
}

/// Append each example to its class as a `def example_function_<Class>`
/// member. Every wrapped snippet is syntax-checked before touching the
/// source; a snippet that fails the check (or whose class cannot be
/// found) is recorded and skipped.
pub fn add_example_functions(
    source: &str,
    examples: &[(String, String)],
) -> (String, Vec<ExampleFailure>) {
    let mut current = source.to_string();
    let mut failures = Vec::new();

    for (class_name, example) in examples {
        match add_one_example(&current, class_name, example) {
            Ok(updated) => current = updated,
            Err(reason) => failures.push(ExampleFailure {
                class_name: class_name.clone(),
                reason,
            }),
        }
    }

    (current, failures)
}

fn add_one_example(source: &str, class_name: &str, example: &str) -> Result<String, String> {
    // The class end line moves as earlier examples land, so the index
    // is rebuilt against the current text for every injection.
    let index = StructuralIndex::build(source);
    let class_decl = index
        .find_class(class_name)
        .ok_or_else(|| format!("class '{class_name}' not found in source"))?;

    let unescaped = example.replace("\\n", "\n");
    let body: Vec<String> = unescaped
        .lines()
        .map(|l| l.trim_end().to_string())
        .collect();

    // Validate the wrapped unit standalone, at zero indent, before
    // committing it to the file.
    let mut probe = format!("def example_function_{class_name}(self):\n");
    for line in &body {
        probe.push_str("    ");
        probe.push_str(line);
        probe.push('\n');
    }
    if !parser::syntax_ok(&probe) {
        return Err(format!(
            "example for class '{class_name}' is not valid Python"
        ));
    }

    let def_indent = " ".repeat(class_decl.indent + INDENT_STEP);
    let body_indent = " ".repeat(class_decl.indent + 2 * INDENT_STEP);

    let mut block = String::new();
    block.push('\n');
    block.push_str(&format!(
        "{def_indent}def example_function_{class_name}(self):\n"
    ));
    for line in &body {
        if line.is_empty() {
            block.push('\n');
        } else {
            block.push_str(&body_indent);
            block.push_str(line);
            block.push('\n');
        }
    }
    // Drop the trailing newline; the join below restores separators.
    block.pop();

    let mut lines: Vec<&str> = source.split('\n').collect();
    let at = class_decl.end_line.min(lines.len());
    lines.insert(at, block.as_str());
    Ok(lines.join("\n"))
}

fn find_top_level_function<'a>(
    index: &'a StructuralIndex,
    name: &str,
) -> Option<&'a Declaration> {
    index
        .declarations
        .iter()
        .find(|d| d.kind == DeclKind::Function && d.name == name)
}

fn find_method<'a>(class_decl: &'a Declaration, name: &str) -> Option<&'a Declaration> {
    fn walk<'a>(decls: &'a [Declaration], name: &str) -> Option<&'a Declaration> {
        for d in decls {
            if d.kind == DeclKind::Function && d.name == name {
                return Some(d);
            }
            if let Some(found) = walk(&d.children, name) {
                return Some(found);
            }
        }
        None
    }
    walk(&class_decl.children, name)
}

/// Render one docstring block indented one level past its declaration.
///
/// Single-line docstrings stay inline between the quotes; multi-line
/// ones get the quotes on their own lines.
fn format_docstring(doc: &str, decl_indent: usize) -> String {
    let indent = " ".repeat(decl_indent + INDENT_STEP);
    let unescaped = doc.replace("\\n", "\n");
    let lines: Vec<&str> = unescaped.lines().collect();

    if lines.len() <= 1 {
        return format!("{indent}\"\"\"{}\"\"\"", unescaped.trim());
    }

    let mut out = format!("{indent}\"\"\"\n");
    for line in &lines {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(&indent);
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.push_str(&indent);
    out.push_str("\"\"\"");
    out
}

/// Emit the original lines, appending each block right after its
/// (0-based) key line. Keys beyond the last line are clamped.
fn apply_insertions(source: &str, insertions: &BTreeMap<usize, String>) -> String {
    if insertions.is_empty() {
        return source.to_string();
    }
    let lines: Vec<&str> = source.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + insertions.len());
    for (i, line) in lines.iter().enumerate() {
        out.push(line);
        if let Some(block) = insertions.get(&i) {
            out.push(block.as_str());
        }
    }
    out.join("\n")
}
