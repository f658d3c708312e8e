// AST access layer for symfact
//
// Every extractor works on a `PhpSource` (path + content + tree-sitter tree) and
// classifies nodes through the closed `PhpNodeKind` enumeration instead of
// comparing grammar kind strings all over the codebase.

use crate::error::{Result, SymfactError};
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::{Language, Node, Parser, Point, Tree};

/// The tree-sitter PHP grammar (mixed HTML/PHP files)
pub fn php_language() -> Language {
    tree_sitter_php::LANGUAGE_PHP.into()
}

/// Create a parser configured for PHP
pub fn new_php_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser.set_language(&php_language())?;
    Ok(parser)
}

/// A parsed PHP file. Immutable once built; every query borrows nodes from it.
pub struct PhpSource {
    path: PathBuf,
    content: String,
    tree: Tree,
}

impl std::fmt::Debug for PhpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhpSource")
            .field("path", &self.path)
            .field("bytes", &self.content.len())
            .finish()
    }
}

impl PhpSource {
    pub fn parse(path: impl Into<PathBuf>, content: impl Into<String>) -> Result<Self> {
        let mut parser = new_php_parser()?;
        Self::parse_with(&mut parser, path, content)
    }

    /// Parse with a caller-owned parser (one parser per worker thread)
    pub fn parse_with(
        parser: &mut Parser,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let path = path.into();
        let content = content.into();
        let tree = parser
            .parse(&content, None)
            .ok_or_else(|| SymfactError::Parse(path.clone()))?;

        debug!("Parsed {} ({} bytes)", path.display(), content.len());
        Ok(Self {
            path,
            content,
            tree,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`
    pub fn text(&self, node: &Node) -> &str {
        self.content.get(node.byte_range()).unwrap_or("")
    }

    /// Smallest named node at a 1-based line and 0-based column
    pub fn node_at(&self, line: usize, column: usize) -> Option<Node<'_>> {
        let point = Point::new(line.checked_sub(1)?, column);
        self.root().named_descendant_for_point_range(point, point)
    }
}

/// Closed classification of the grammar nodes the extractors care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhpNodeKind {
    StringLiteral,
    ArrayLiteral,
    ArrayElement,
    ClassConstantAccess,
    /// Bare or qualified identifier (`FOO`, `App\Foo`)
    Name,
    Variable,
    /// `$a->b()` and `$a?->b()`
    MemberCall,
    /// `Foo::bar()`
    StaticCall,
    FunctionCall,
    Assignment,
    Return,
    Statement,
    Block,
    /// Methods, functions and closures; each opens its own variable scope
    FunctionLike,
    /// `fn() =>` shares the variables of its parent scope
    ArrowFunction,
    Parameter,
    ClassLike,
    ConstDeclaration,
    Comment,
    Other,
}

impl PhpNodeKind {
    pub fn of(node: &Node) -> Self {
        match node.kind() {
            "string" | "encapsed_string" => Self::StringLiteral,
            "array_creation_expression" => Self::ArrayLiteral,
            "array_element_initializer" => Self::ArrayElement,
            "class_constant_access_expression" => Self::ClassConstantAccess,
            "name" | "qualified_name" => Self::Name,
            "variable_name" => Self::Variable,
            "member_call_expression" | "nullsafe_member_call_expression" => Self::MemberCall,
            "scoped_call_expression" => Self::StaticCall,
            "function_call_expression" => Self::FunctionCall,
            "assignment_expression" | "reference_assignment_expression" => Self::Assignment,
            "return_statement" => Self::Return,
            "compound_statement" => Self::Block,
            "method_declaration"
            | "function_definition"
            | "anonymous_function"
            | "anonymous_function_creation_expression" => Self::FunctionLike,
            "arrow_function" => Self::ArrowFunction,
            "simple_parameter" | "property_promotion_parameter" | "variadic_parameter" => {
                Self::Parameter
            }
            "class_declaration" | "interface_declaration" | "trait_declaration"
            | "enum_declaration" => Self::ClassLike,
            "const_declaration" => Self::ConstDeclaration,
            "comment" => Self::Comment,
            kind if kind.ends_with("_statement") => Self::Statement,
            _ => Self::Other,
        }
    }

    pub fn is_statement(self) -> bool {
        matches!(self, Self::Statement | Self::Return)
    }

    /// Calls on a receiver: the building blocks of a fluent chain
    pub fn is_method_call(self) -> bool {
        matches!(self, Self::MemberCall | Self::StaticCall)
    }

    /// Nodes whose bodies do not see the surrounding local variables
    pub fn opens_scope(self) -> bool {
        matches!(self, Self::FunctionLike | Self::ClassLike)
    }
}

/// Named children in source order
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Named children that are not comments
pub fn code_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    named_children(node)
        .into_iter()
        .filter(|child| PhpNodeKind::of(child) != PhpNodeKind::Comment)
        .collect()
}

/// Depth-first pre-order walk over named nodes. `visit` returns whether to
/// descend into the node's children.
pub fn walk_named<'t, F>(node: Node<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    if !visit(node) {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_named(child, visit);
    }
}

/// All descendants (including `node` itself) of the given kind
pub fn descendants_of_kind<'t>(node: Node<'t>, kind: PhpNodeKind) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk_named(node, &mut |n| {
        if PhpNodeKind::of(&n) == kind {
            found.push(n);
        }
        true
    });
    found
}

/// First descendant in document order matching `predicate`
pub fn first_descendant<'t, F>(node: Node<'t>, predicate: F) -> Option<Node<'t>>
where
    F: Fn(&Node<'t>) -> bool,
{
    let mut found = None;
    walk_named(node, &mut |n| {
        if found.is_some() {
            return false;
        }
        if predicate(&n) {
            found = Some(n);
            return false;
        }
        true
    });
    found
}

/// Nearest ancestor-or-self matching `predicate`
pub fn enclosing<'t, F>(node: Node<'t>, predicate: F) -> Option<Node<'t>>
where
    F: Fn(&Node<'t>) -> bool,
{
    let mut current = Some(node);
    while let Some(n) = current {
        if predicate(&n) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Nearest enclosing statement; never crosses a function or class boundary.
pub fn enclosing_statement(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = Some(node);
    while let Some(n) = current {
        let kind = PhpNodeKind::of(&n);
        if kind.is_statement() {
            return Some(n);
        }
        if kind.opens_scope() && n != node {
            return None;
        }
        current = n.parent();
    }
    None
}

/// Contents of a string literal without interpolation, unescaped.
///
/// Returns `None` for non-strings and for double-quoted strings that
/// interpolate variables.
pub fn string_literal_value(source: &PhpSource, node: &Node) -> Option<String> {
    match node.kind() {
        "string" => {
            let raw = strip_quotes(source.text(node), '\'')?;
            Some(raw.replace("\\'", "'").replace("\\\\", "\\"))
        }
        "encapsed_string" => {
            let interpolates = named_children(node)
                .iter()
                .any(|c| !matches!(c.kind(), "string_content" | "string_value" | "escape_sequence"));
            if interpolates {
                return None;
            }
            let raw = strip_quotes(source.text(node), '"')?;
            Some(
                raw.replace("\\\"", "\"")
                    .replace("\\$", "$")
                    .replace("\\n", "\n")
                    .replace("\\t", "\t")
                    .replace("\\\\", "\\"),
            )
        }
        _ => None,
    }
}

fn strip_quotes(text: &str, quote: char) -> Option<&str> {
    // binary string prefix: b'...'
    let text = text
        .strip_prefix('b')
        .or_else(|| text.strip_prefix('B'))
        .filter(|rest| rest.starts_with(quote))
        .unwrap_or(text);
    text.strip_prefix(quote)?.strip_suffix(quote)
}

/// Key and value expressions of an `array_element_initializer`.
///
/// The key is `None` for list-style entries (`['a', 'b']`).
pub fn array_entry<'t>(element: &Node<'t>) -> (Option<Node<'t>>, Option<Node<'t>>) {
    let mut cursor = element.walk();
    let has_arrow = element.children(&mut cursor).any(|c| c.kind() == "=>");
    let parts = code_children(element);
    if has_arrow {
        (parts.first().copied(), parts.get(1).copied())
    } else {
        (None, parts.first().copied())
    }
}

/// Elements of an array literal, in source order
pub fn array_elements<'t>(array: &Node<'t>) -> Vec<Node<'t>> {
    named_children(array)
        .into_iter()
        .filter(|n| PhpNodeKind::of(n) == PhpNodeKind::ArrayElement)
        .collect()
}

/// Value expressions of a call's `arguments` node, in source order.
/// Named arguments keep their position.
pub fn call_arguments<'t>(call: &Node<'t>) -> Vec<Node<'t>> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    named_children(&arguments)
        .into_iter()
        .filter(|n| n.kind() == "argument")
        .filter_map(|argument| code_children(&argument).last().copied())
        .collect()
}

/// Name of a variable node without the `$` sigil
pub fn variable_name<'s>(source: &'s PhpSource, node: &Node) -> &'s str {
    source.text(node).trim_start_matches('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_value_variants() {
        let code = r#"<?php $a = 'it\'s'; $b = "plain"; $c = "x $y";"#;
        let source = PhpSource::parse("test.php", code).unwrap();
        let strings = descendants_of_kind(source.root(), PhpNodeKind::StringLiteral);
        let values: Vec<Option<String>> = strings
            .iter()
            .map(|s| string_literal_value(&source, s))
            .collect();

        assert_eq!(values[0].as_deref(), Some("it's"));
        assert_eq!(values[1].as_deref(), Some("plain"));
        assert_eq!(values[2], None);
    }

    #[test]
    fn test_enclosing_statement_of_nested_call() {
        let code = "<?php\nfunction f($qb) {\n    $qb->select('a')->from('B', 'b');\n}\n";
        let source = PhpSource::parse("test.php", code).unwrap();
        let calls = descendants_of_kind(source.root(), PhpNodeKind::MemberCall);
        assert_eq!(calls.len(), 2);

        let statement = enclosing_statement(calls[1]).unwrap();
        assert_eq!(statement.kind(), "expression_statement");
        assert_eq!(enclosing_statement(calls[0]), Some(statement));
    }
}
