// Local variable scope index
//
// Built once per function body (or per file for top-level code). Every
// variable name that is declared in the scope, by assignment or as a
// parameter, gets a `DeclarationId`; all uses of that name in the same scope
// are its references. Nested functions, closures and classes are separate
// scopes, except for the variables a closure imports with `use (...)`. Arrow
// functions see the enclosing variables and are indexed with them.

use crate::extractors::base::{PhpNodeKind, PhpSource, enclosing, named_children, variable_name};
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclarationId(usize);

#[derive(Debug)]
struct Binding<'t> {
    name: String,
    /// Every occurrence in the scope, in document order
    references: Vec<Node<'t>>,
    declared: bool,
}

#[derive(Debug)]
pub struct ScopeIndex<'t> {
    root: Node<'t>,
    bindings: Vec<Binding<'t>>,
    by_name: HashMap<String, DeclarationId>,
    /// Node ids of declaring occurrences
    declarations: HashSet<usize>,
}

/// `$this` is never a local builder variable
fn is_this(name: &str) -> bool {
    name.eq_ignore_ascii_case("this")
}

fn is_closure_use_clause(node: &Node) -> bool {
    node.kind() == "anonymous_function_use_clause"
}

/// Whether a variable occurrence declares the variable
fn declares(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match PhpNodeKind::of(&parent) {
        PhpNodeKind::Assignment => parent.child_by_field_name("left") == Some(*node),
        PhpNodeKind::Parameter => parent.child_by_field_name("name") == Some(*node),
        _ => false,
    }
}

impl<'t> ScopeIndex<'t> {
    /// Index the scope rooted at `root` (a function-like node or the program)
    pub fn build(source: &'t PhpSource, root: Node<'t>) -> Self {
        let mut index = Self {
            root,
            bindings: Vec::new(),
            by_name: HashMap::new(),
            declarations: HashSet::new(),
        };
        index.visit(source, root);
        index
    }

    /// Index for the scope that contains `node`
    pub fn for_node(source: &'t PhpSource, node: Node<'t>) -> Self {
        let root = enclosing(node, |n| PhpNodeKind::of(n) == PhpNodeKind::FunctionLike)
            .unwrap_or_else(|| source.root());
        Self::build(source, root)
    }

    fn visit(&mut self, source: &'t PhpSource, node: Node<'t>) {
        let kind = PhpNodeKind::of(&node);
        if kind.opens_scope() && node != self.root {
            // closure imports are uses of the enclosing variables
            for child in named_children(&node).into_iter().filter(is_closure_use_clause) {
                self.visit(source, child);
            }
            return;
        }

        if kind == PhpNodeKind::Variable {
            self.record(source, node);
            return;
        }

        for child in named_children(&node) {
            self.visit(source, child);
        }
    }

    fn record(&mut self, source: &'t PhpSource, node: Node<'t>) {
        let name = variable_name(source, &node);
        if is_this(name) {
            return;
        }
        let id = match self.by_name.get(name) {
            Some(&id) => id,
            None => {
                let id = DeclarationId(self.bindings.len());
                self.bindings.push(Binding {
                    name: name.to_string(),
                    references: Vec::new(),
                    declared: false,
                });
                self.by_name.insert(name.to_string(), id);
                id
            }
        };

        let binding = &mut self.bindings[id.0];
        binding.references.push(node);
        if declares(&node) {
            binding.declared = true;
            self.declarations.insert(node.id());
        }
    }

    pub fn root(&self) -> Node<'t> {
        self.root
    }

    pub fn is_declaration(&self, node: &Node) -> bool {
        self.declarations.contains(&node.id())
    }

    /// Declaration a variable occurrence refers to; `None` when the name is
    /// never declared in this scope or the node is not indexed here
    pub fn resolve(&self, node: &Node) -> Option<DeclarationId> {
        self.bindings
            .iter()
            .position(|b| b.declared && b.references.iter().any(|r| r.id() == node.id()))
            .map(DeclarationId)
    }

    pub fn name(&self, id: DeclarationId) -> &str {
        &self.bindings[id.0].name
    }

    /// Every occurrence of the declared variable, declarations included
    pub fn references(&self, id: DeclarationId) -> &[Node<'t>] {
        &self.bindings[id.0].references
    }
}
