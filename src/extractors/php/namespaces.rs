// PHP namespace and import declarations
//
// A file is split into namespace sections; each section carries the `use`
// imports declared in it. Class names written in code are resolved against the
// section that contains them.

use crate::extractors::base::{PhpSource, named_children};
use std::collections::HashMap;
use std::ops::Range;
use tree_sitter::Node;

/// Namespace and class imports in effect at some point of a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameContext {
    namespace: Option<String>,
    /// lowercased alias -> fully qualified name (no leading `\`)
    imports: HashMap<String, String>,
}

impl NameContext {
    pub fn new(namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace
                .map(|ns| ns.trim_matches('\\').to_string())
                .filter(|ns| !ns.is_empty()),
            imports: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn add_import(&mut self, alias: &str, fqn: &str) {
        self.imports.insert(
            alias.to_ascii_lowercase(),
            fqn.trim_start_matches('\\').to_string(),
        );
    }

    /// Prefix a declared short name with the current namespace
    pub fn qualify(&self, short_name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, short_name),
            None => short_name.to_string(),
        }
    }

    /// Resolve a class name as written in code to its fully qualified form.
    ///
    /// `self`/`static`/`parent` are left to the caller.
    pub fn resolve_class(&self, name: &str) -> String {
        let name = name.trim();
        if let Some(fully_qualified) = name.strip_prefix('\\') {
            return fully_qualified.to_string();
        }
        if let Some(relative) = name.strip_prefix("namespace\\") {
            return self.qualify(relative);
        }

        let (head, tail) = match name.split_once('\\') {
            Some((head, tail)) => (head, Some(tail)),
            None => (name, None),
        };
        if let Some(imported) = self.imports.get(&head.to_ascii_lowercase()) {
            return match tail {
                Some(tail) => format!("{}\\{}", imported, tail),
                None => imported.clone(),
            };
        }

        self.qualify(name)
    }
}

/// Namespace sections of one file, in source order
#[derive(Debug, Clone, Default)]
pub struct NameSections {
    sections: Vec<(Range<usize>, NameContext)>,
}

impl NameSections {
    pub fn build(source: &PhpSource) -> Self {
        let root = source.root();
        let mut sections = Vec::new();
        let mut current = NameContext::default();
        let mut section_start = 0;

        for child in named_children(&root) {
            match child.kind() {
                "namespace_definition" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| source.text(&n).to_string());

                    if let Some(body) = child.child_by_field_name("body") {
                        // braced form: `namespace Foo { ... }`
                        let mut braced = NameContext::new(name.as_deref());
                        for statement in named_children(&body) {
                            if statement.kind() == "namespace_use_declaration" {
                                collect_imports(source, &statement, &mut braced);
                            }
                        }
                        sections.push((child.byte_range(), braced));
                    } else {
                        sections.push((section_start..child.start_byte(), current));
                        current = NameContext::new(name.as_deref());
                        section_start = child.start_byte();
                    }
                }
                "namespace_use_declaration" => collect_imports(source, &child, &mut current),
                _ => {}
            }
        }
        sections.push((section_start..source.content().len().max(section_start), current));

        Self { sections }
    }

    /// Context in effect at a byte offset. Braced sections lie inside the
    /// trailing file-level section, so the latest-starting match wins.
    pub fn at(&self, byte: usize) -> NameContext {
        self.sections
            .iter()
            .filter(|(range, _)| range.contains(&byte) || range.end == byte)
            .max_by_key(|(range, _)| range.start)
            .map(|(_, context)| context.clone())
            .unwrap_or_default()
    }
}

/// Record the class imports of a `use` declaration.
///
/// Handles `use A\B;`, `use A\B as C;`, `use A\{B, C as D};`. Function and
/// constant imports are ignored.
fn collect_imports(source: &PhpSource, declaration: &Node, context: &mut NameContext) {
    let mut cursor = declaration.walk();
    let imports_non_class = declaration
        .children(&mut cursor)
        .any(|c| matches!(c.kind(), "function" | "const"));
    if imports_non_class {
        return;
    }

    let children = named_children(declaration);
    let group_prefix = children
        .iter()
        .find(|c| c.kind() == "namespace_name")
        .map(|n| source.text(n).trim_matches('\\').to_string());

    for child in &children {
        match child.kind() {
            "namespace_use_clause" => add_clause(source, child, None, context),
            "namespace_use_group" => {
                for clause in named_children(child) {
                    if matches!(clause.kind(), "namespace_use_clause" | "namespace_use_group_clause") {
                        add_clause(source, &clause, group_prefix.as_deref(), context);
                    }
                }
            }
            _ => {}
        }
    }
}

fn add_clause(source: &PhpSource, clause: &Node, prefix: Option<&str>, context: &mut NameContext) {
    let parts = named_children(clause);
    let Some(target) = parts.first() else {
        return;
    };

    let target = source.text(target).trim_start_matches('\\');
    let fqn = match prefix {
        Some(prefix) => format!("{}\\{}", prefix, target),
        None => target.to_string(),
    };

    let alias = clause
        .child_by_field_name("alias")
        .or_else(|| parts.get(1).copied())
        .map(|n| source.text(&n).to_string())
        .unwrap_or_else(|| fqn.rsplit('\\').next().unwrap_or(&fqn).to_string());

    context.add_import(&alias, &fqn);
}
