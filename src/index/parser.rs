//! Tree-sitter based parser for Python structural analysis

use super::{DeclKind, Declaration, StructuralIndex};
use anyhow::bail;
use std::cell::RefCell;
use tree_sitter::{Node, Parser, Tree};

// Tree-sitter parsers are expensive to create but can be reused for
// multiple parses. Thread-local storage gives each thread its own
// pre-configured parser.
thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });
}

fn parse(content: &str) -> Option<Tree> {
    PYTHON_PARSER.with(|p| p.borrow_mut().parse(content, None))
}

/// Returns true if the text parses as Python without syntax errors.
///
/// This is the non-executing syntax check used to vet generated example
/// code before it is inserted into a file.
pub fn syntax_ok(content: &str) -> bool {
    match parse(content) {
        Some(tree) => !tree.root_node().has_error(),
        None => false,
    }
}

pub(super) fn build_index(source: &str) -> StructuralIndex {
    let Some(tree) = parse(source) else {
        return StructuralIndex {
            declarations: Vec::new(),
            parse_failed: true,
        };
    };
    if tree.root_node().has_error() {
        return StructuralIndex {
            declarations: Vec::new(),
            parse_failed: true,
        };
    }

    let mut declarations = Vec::new();
    collect_declarations(tree.root_node(), source, &mut declarations);
    StructuralIndex {
        declarations,
        parse_failed: false,
    }
}

fn collect_declarations(node: Node, content: &str, out: &mut Vec<Declaration>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(decl) = declaration_from_node(child, content) {
                    out.push(decl);
                }
            }
            "decorated_definition" => {
                // The docstring belongs after the def line, not after the
                // decorators, so index the inner definition node.
                if let Some(def) = child.child_by_field_name("definition") {
                    if let Some(decl) = declaration_from_node(def, content) {
                        out.push(decl);
                    }
                }
            }
            // Declarations can hide under if/try/with blocks at any level
            _ => collect_declarations(child, content, out),
        }
    }
}

fn declaration_from_node(node: Node, content: &str) -> Option<Declaration> {
    let kind = match node.kind() {
        "function_definition" => DeclKind::Function,
        "class_definition" => DeclKind::Class,
        _ => return None,
    };
    let name_node = node.child_by_field_name("name")?;

    let mut children = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_declarations(body, content, &mut children);
    }

    Some(Declaration {
        kind,
        name: node_text(&name_node, content),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        indent: node.start_position().column,
        children,
    })
}

/// List every function/method/class lacking a docstring.
///
/// Generated example members (`example_function_*`) are skipped by a
/// name-based heuristic. Fails if the source no longer parses.
pub fn missing_docstrings(source: &str) -> anyhow::Result<Vec<String>> {
    let Some(tree) = parse(source) else {
        bail!("parser returned no tree");
    };
    if tree.root_node().has_error() {
        bail!("source contains syntax errors");
    }
    let mut missing = Vec::new();
    scan_missing(tree.root_node(), source, &mut missing);
    Ok(missing)
}

fn scan_missing(node: Node, content: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = node_text(&name_node, content);
                    if !has_docstring(child) && !name.contains("example_") {
                        out.push(name);
                    }
                }
                if let Some(body) = child.child_by_field_name("body") {
                    scan_missing(body, content, out);
                }
            }
            _ => scan_missing(child, content, out),
        }
    }
}

/// A declaration has a docstring when the first statement of its body is
/// a bare string expression.
fn has_docstring(def_node: Node) -> bool {
    let Some(body) = def_node.child_by_field_name("body") else {
        return false;
    };
    let Some(first) = body.named_child(0) else {
        return false;
    };
    first.kind() == "expression_statement"
        && first
            .named_child(0)
            .map(|n| n.kind() == "string")
            .unwrap_or(false)
}

fn node_text(node: &Node, content: &str) -> String {
    content[node.start_byte()..node.end_byte()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_ok() {
        assert!(syntax_ok("def f():\n    pass\n"));
        assert!(!syntax_ok("def f(:\n    pass\n"));
    }

    #[test]
    fn test_missing_docstrings_reports_undocumented() {
        let source = "def documented():\n    \"\"\"Has one.\"\"\"\n    pass\n\ndef bare():\n    pass\n";
        let missing = missing_docstrings(source).unwrap();
        assert_eq!(missing, vec!["bare"]);
    }

    #[test]
    fn test_missing_docstrings_skips_example_members() {
        let source = "class C:\n    \"\"\"Doc.\"\"\"\n    def example_function_C(self):\n        pass\n";
        let missing = missing_docstrings(source).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_docstrings_includes_methods() {
        let source = "class C:\n    \"\"\"Doc.\"\"\"\n    def m(self):\n        pass\n";
        let missing = missing_docstrings(source).unwrap();
        assert_eq!(missing, vec!["m"]);
    }

    #[test]
    fn test_missing_docstrings_rejects_broken_source() {
        assert!(missing_docstrings("def broken(:\n").is_err());
    }

    #[test]
    fn test_decorated_definition_spans_def_line() {
        let source = "@decorator\ndef wrapped():\n    pass\n";
        let index = build_index(source);
        assert_eq!(index.declarations.len(), 1);
        assert_eq!(index.declarations[0].start_line, 2);
    }
}
