// PHP class-level extraction for symfact
//
// Class declarations with their heritage, the class handle passed to
// collectors, and the `PhpIndex` seam through which collectors query the
// loaded project.

pub mod arrays;
pub mod constants;
pub mod namespaces;

use crate::extractors::base::{PhpNodeKind, PhpSource, code_children, named_children, walk_named};
use constants::{StringConstantResolver, scope_class_name};
use namespaces::{NameContext, NameSections};
use std::ops::Range;
use tree_sitter::Node;

/// Kind of a class-like declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl ClassKind {
    fn of(node: &Node) -> Option<Self> {
        match node.kind() {
            "class_declaration" => Some(Self::Class),
            "interface_declaration" => Some(Self::Interface),
            "trait_declaration" => Some(Self::Trait),
            "enum_declaration" => Some(Self::Enum),
            _ => None,
        }
    }
}

/// A class-like declaration found in a file, names fully qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredClass {
    pub fqn: String,
    pub kind: ClassKind,
    pub byte_range: Range<usize>,
    /// `extends` targets (several for interfaces)
    pub parents: Vec<String>,
    pub interfaces: Vec<String>,
}

/// All class-like declarations of a file, in source order
pub fn declared_classes(source: &PhpSource) -> Vec<DeclaredClass> {
    let sections = NameSections::build(source);
    let mut classes = Vec::new();

    walk_named(source.root(), &mut |node| {
        let Some(kind) = ClassKind::of(&node) else {
            return true;
        };
        let Some(name) = node.child_by_field_name("name") else {
            return true;
        };
        let names = sections.at(node.start_byte());

        let mut parents = Vec::new();
        let mut interfaces = Vec::new();
        for clause in named_children(&node) {
            let target = match clause.kind() {
                "base_clause" => &mut parents,
                "class_interface_clause" => &mut interfaces,
                _ => continue,
            };
            target.extend(
                code_children(&clause)
                    .iter()
                    .filter(|n| PhpNodeKind::of(n) == PhpNodeKind::Name)
                    .map(|n| names.resolve_class(source.text(n))),
            );
        }

        classes.push(DeclaredClass {
            fqn: names.qualify(source.text(&name)),
            kind,
            byte_range: node.byte_range(),
            parents,
            interfaces,
        });
        true
    });

    classes
}

/// A class declaration inside a loaded source
#[derive(Debug, Clone)]
pub struct ClassHandle<'a> {
    pub source: &'a PhpSource,
    pub node: Node<'a>,
    /// Fully qualified name without leading `\`
    pub fqn: String,
}

impl<'a> ClassHandle<'a> {
    pub fn short_name(&self) -> &str {
        self.fqn.rsplit('\\').next().unwrap_or(&self.fqn)
    }

    /// Method declared directly in the class body (PHP method names are
    /// case-insensitive)
    pub fn find_method(&self, name: &str) -> Option<Node<'a>> {
        let body = self.node.child_by_field_name("body")?;
        named_children(&body).into_iter().find(|member| {
            member.kind() == "method_declaration"
                && member
                    .child_by_field_name("name")
                    .is_some_and(|n| self.source.text(&n).eq_ignore_ascii_case(name))
        })
    }

    /// Namespace and imports in effect at the declaration
    pub fn name_context(&self) -> NameContext {
        NameSections::build(self.source).at(self.node.start_byte())
    }

    pub fn offset(&self) -> usize {
        self.node.start_byte()
    }

    /// 1-based line of the declaration
    pub fn line(&self) -> usize {
        self.node.start_position().row + 1
    }
}

/// Project-wide queries the collectors rely on
pub trait PhpIndex {
    /// Concrete classes implementing `contract`, directly or through parents
    /// and interface inheritance
    fn subscriber_implementors(&self, contract: &str) -> Vec<ClassHandle<'_>>;

    /// Whether a class only exists as a test fixture
    fn is_test_class(&self, class: &ClassHandle<'_>) -> bool;

    /// Declarations of a fully qualified class name (may be several)
    fn find_classes(&self, fqn: &str) -> Vec<ClassHandle<'_>>;

    fn constants(&self) -> &dyn StringConstantResolver;
}

/// Class named by a `Foo::class` expression
pub fn class_reference(
    source: &PhpSource,
    node: &Node,
    names: &NameContext,
    current_class: Option<&str>,
) -> Option<String> {
    if PhpNodeKind::of(node) != PhpNodeKind::ClassConstantAccess {
        return None;
    }
    let parts = code_children(node);
    let (scope, member) = (parts.first()?, parts.last()?);
    if parts.len() < 2 || !source.text(member).eq_ignore_ascii_case("class") {
        return None;
    }
    scope_class_name(source, scope, names, current_class)
}
