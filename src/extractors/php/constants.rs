// String constant resolution
//
// Event names are usually declared as class constants (`KernelEvents::REQUEST`)
// and referenced symbolically as array keys. `ConstantTable` indexes every
// string-valued class constant, global `const` and `define()` of the loaded
// sources so such keys can be turned back into their string value.

use super::namespaces::{NameContext, NameSections};
use crate::extractors::base::{
    PhpNodeKind, PhpSource, call_arguments, code_children, enclosing, named_children,
    string_literal_value, walk_named,
};
use std::collections::HashMap;
use tracing::debug;
use tree_sitter::Node;

/// Aliased constants (`const A = self::B;`) are followed at most this far
const MAX_ALIAS_DEPTH: usize = 8;

/// A symbolic reference to a constant, with class names already resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantReference {
    /// Fully qualified owning class; `None` for global constants
    pub class_name: Option<String>,
    pub constant_name: String,
    /// Namespace a bare global constant was written in (PHP falls back to the
    /// global namespace when `Ns\NAME` is undefined)
    pub namespace: Option<String>,
}

impl ConstantReference {
    pub fn class_constant(class_name: &str, constant_name: &str) -> Self {
        Self {
            class_name: Some(class_name.trim_start_matches('\\').to_string()),
            constant_name: constant_name.to_string(),
            namespace: None,
        }
    }

    /// Build a reference from a `Foo::BAR` or `BAR` expression.
    ///
    /// `self`/`static` resolve to `current_class`; `Foo::class` is a class name,
    /// not a constant, and yields `None`.
    pub fn from_node(
        source: &PhpSource,
        node: &Node,
        names: &NameContext,
        current_class: Option<&str>,
    ) -> Option<Self> {
        match PhpNodeKind::of(node) {
            PhpNodeKind::ClassConstantAccess => {
                let parts = code_children(node);
                if parts.len() < 2 {
                    return None;
                }
                let constant_name = source.text(&parts[parts.len() - 1]);
                if constant_name.eq_ignore_ascii_case("class") {
                    return None;
                }
                let class_name = scope_class_name(source, &parts[0], names, current_class)?;
                Some(Self {
                    class_name: Some(class_name),
                    constant_name: constant_name.to_string(),
                    namespace: None,
                })
            }
            PhpNodeKind::Name => {
                let text = source.text(node);
                let (namespace, constant_name) = match text.strip_prefix('\\') {
                    Some(global) => (None, global.to_string()),
                    None => (names.namespace().map(str::to_string), text.to_string()),
                };
                Some(Self {
                    class_name: None,
                    constant_name,
                    namespace,
                })
            }
            _ => None,
        }
    }

    /// Symbolic text of the reference, e.g. `\App\Events::ORDER_PLACED`
    pub fn signature(&self) -> String {
        match &self.class_name {
            Some(class_name) => format!("\\{}::{}", class_name, self.constant_name),
            None => format!("\\{}", self.constant_name),
        }
    }

    fn lookup_keys(&self) -> Vec<String> {
        match &self.class_name {
            Some(class_name) => vec![class_key(class_name, &self.constant_name)],
            None => {
                let mut keys = Vec::with_capacity(2);
                if let Some(ns) = &self.namespace {
                    keys.push(format!("{}\\{}", ns, self.constant_name));
                }
                keys.push(self.constant_name.clone());
                keys
            }
        }
    }
}

/// Resolve the class part of `X::...` (a name, `self` or `static`)
pub(crate) fn scope_class_name(
    source: &PhpSource,
    scope: &Node,
    names: &NameContext,
    current_class: Option<&str>,
) -> Option<String> {
    match scope.kind() {
        "relative_scope" => {
            let text = source.text(scope);
            if text.eq_ignore_ascii_case("self") || text.eq_ignore_ascii_case("static") {
                current_class.map(str::to_string)
            } else {
                None
            }
        }
        "name" | "qualified_name" => Some(names.resolve_class(source.text(scope))),
        _ => None,
    }
}

/// External constant resolver: symbolic reference -> string value
pub trait StringConstantResolver: Send + Sync {
    fn resolve_string_constant(&self, reference: &ConstantReference) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq)]
enum ConstantValue {
    Literal(String),
    Alias(ConstantReference),
}

/// In-memory constant index built from parsed sources
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    values: HashMap<String, ConstantValue>,
}

fn class_key(class_name: &str, constant_name: &str) -> String {
    format!(
        "{}::{}",
        class_name.trim_start_matches('\\').to_ascii_lowercase(),
        constant_name
    )
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert_class_constant(&mut self, class_name: &str, constant_name: &str, value: &str) {
        self.values.insert(
            class_key(class_name, constant_name),
            ConstantValue::Literal(value.to_string()),
        );
    }

    pub fn insert_global_constant(&mut self, name: &str, value: &str) {
        self.values.insert(
            name.trim_start_matches('\\').to_string(),
            ConstantValue::Literal(value.to_string()),
        );
    }

    /// Index every string constant declared in `source`
    pub fn index_source(&mut self, source: &PhpSource) {
        let sections = NameSections::build(source);
        let before = self.values.len();

        walk_named(source.root(), &mut |node| {
            match PhpNodeKind::of(&node) {
                PhpNodeKind::ConstDeclaration => self.index_const_declaration(source, &sections, node),
                PhpNodeKind::FunctionCall => self.index_define(source, &sections, node),
                _ => {}
            }
            true
        });

        debug!(
            "Indexed {} constants from {}",
            self.values.len().saturating_sub(before),
            source.path().display()
        );
    }

    fn index_const_declaration(&mut self, source: &PhpSource, sections: &NameSections, node: Node) {
        let names = sections.at(node.start_byte());
        let owner = enclosing(node, |n| PhpNodeKind::of(n) == PhpNodeKind::ClassLike)
            .and_then(|class| class.child_by_field_name("name"))
            .map(|name| names.qualify(source.text(&name)));

        for element in named_children(&node) {
            if element.kind() != "const_element" {
                continue;
            }
            let parts = code_children(&element);
            let (Some(name), Some(value)) = (parts.first(), parts.last()) else {
                continue;
            };
            if parts.len() < 2 {
                continue;
            }

            let constant_name = source.text(name);
            let value = if let Some(literal) = string_literal_value(source, value) {
                ConstantValue::Literal(literal)
            } else if let Some(reference) =
                ConstantReference::from_node(source, value, &names, owner.as_deref())
            {
                ConstantValue::Alias(reference)
            } else {
                continue;
            };

            let key = match &owner {
                Some(class_name) => class_key(class_name, constant_name),
                None => names.qualify(constant_name),
            };
            self.values.insert(key, value);
        }
    }

    /// `define('NAME', 'value')`
    fn index_define(&mut self, source: &PhpSource, sections: &NameSections, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if !source.text(&function).trim_start_matches('\\').eq_ignore_ascii_case("define") {
            return;
        }
        let arguments = call_arguments(&node);
        let (Some(name), Some(value)) = (arguments.first(), arguments.get(1)) else {
            return;
        };
        let Some(name) = string_literal_value(source, name) else {
            return;
        };

        if let Some(literal) = string_literal_value(source, value) {
            self.insert_global_constant(&name, &literal);
        } else if let Some(reference) =
            ConstantReference::from_node(source, value, &sections.at(node.start_byte()), None)
        {
            self.values
                .insert(name.trim_start_matches('\\').to_string(), ConstantValue::Alias(reference));
        }
    }

    fn resolve(&self, reference: &ConstantReference, depth: usize) -> Option<String> {
        if depth == 0 {
            return None;
        }
        let value = reference
            .lookup_keys()
            .iter()
            .find_map(|key| self.values.get(key))?;

        match value {
            ConstantValue::Literal(literal) => Some(literal.clone()),
            ConstantValue::Alias(next) => self.resolve(next, depth - 1),
        }
    }
}

impl StringConstantResolver for ConstantTable {
    fn resolve_string_constant(&self, reference: &ConstantReference) -> Option<String> {
        self.resolve(reference, MAX_ALIAS_DEPTH)
    }
}
