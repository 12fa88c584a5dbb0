//! Structural index of a Python source file
//!
//! Uses tree-sitter to build a declaration tree (functions, classes,
//! nesting) with line-span information. The index is built once per
//! processing pass and consumed read-only by the chunker and the
//! insertion engine.

pub mod parser;

/// Kind of declaration tracked by the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Class,
}

/// A parsed function, method, or class with a known line span.
///
/// Line numbers are 1-indexed and inclusive of the full body. `indent`
/// is the column of the `def`/`class` keyword.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub indent: usize,
    pub children: Vec<Declaration>,
}

/// Declaration tree for one source text.
///
/// A syntax error produces a *degenerate* index (`parse_failed` set, no
/// declarations) rather than an error, so downstream chunking can still
/// proceed on a line-count basis.
#[derive(Debug, Clone, Default)]
pub struct StructuralIndex {
    pub declarations: Vec<Declaration>,
    pub parse_failed: bool,
}

impl StructuralIndex {
    pub fn build(source: &str) -> Self {
        parser::build_index(source)
    }

    /// All declarations in document order, depth-first.
    pub fn flatten(&self) -> Vec<&Declaration> {
        let mut out = Vec::new();
        fn walk<'a>(decls: &'a [Declaration], out: &mut Vec<&'a Declaration>) {
            for d in decls {
                out.push(d);
                walk(&d.children, out);
            }
        }
        walk(&self.declarations, &mut out);
        out
    }

    /// Find a class declaration by name (first match in document order).
    pub fn find_class(&self, name: &str) -> Option<&Declaration> {
        self.flatten()
            .into_iter()
            .find(|d| d.kind == DeclKind::Class && d.name == name)
    }
}
