// Fluent chain resolution
//
// A builder is usually configured across several statements:
//
//     $qb = $repository->createQueryBuilder('o');
//     $qb->join('o.customer', 'c');
//     if ($paid) {
//         $qb->andWhere('o.paid = :paid')->setParameter('paid', true);
//     }
//
// Starting from any call, the resolver collects the calls of the statement it
// belongs to and, when that statement works on a local variable, the calls of
// every other statement using the same variable.

use super::scope::ScopeIndex;
use crate::extractors::base::{
    PhpNodeKind, PhpSource, call_arguments, descendants_of_kind, enclosing_statement,
    first_descendant, variable_name,
};
use std::collections::HashSet;
use tracing::debug;
use tree_sitter::Node;

/// One call of a fluent chain
#[derive(Debug, Clone)]
pub struct MethodCall<'t> {
    pub node: Node<'t>,
    pub name: String,
    pub arguments: Vec<Node<'t>>,
}

impl<'t> MethodCall<'t> {
    pub fn from_node(source: &PhpSource, node: Node<'t>) -> Option<Self> {
        if !PhpNodeKind::of(&node).is_method_call() {
            return None;
        }
        let name = node.child_by_field_name("name")?;
        Some(Self {
            node,
            name: source.text(&name).to_string(),
            arguments: call_arguments(&node),
        })
    }

    /// Replay position: the start of the method name. Chained calls all start
    /// at the receiver, so the call node itself cannot order them.
    pub fn position(&self) -> usize {
        self.node
            .child_by_field_name("name")
            .map_or(self.node.start_byte(), |n| n.start_byte())
    }
}

fn method_calls<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut calls = descendants_of_kind(node, PhpNodeKind::MemberCall);
    calls.extend(descendants_of_kind(node, PhpNodeKind::StaticCall));
    calls
}

/// First variable of a statement other than `$this`
fn first_variable<'t>(source: &PhpSource, statement: Node<'t>) -> Option<Node<'t>> {
    first_descendant(statement, |n| {
        PhpNodeKind::of(n) == PhpNodeKind::Variable
            && !variable_name(source, n).eq_ignore_ascii_case("this")
    })
}

/// Statement-local calls plus, when the statement uses a declared local
/// variable, the calls of every statement referencing that variable.
fn chain_nodes<'t>(source: &'t PhpSource, start: Node<'t>) -> Vec<Node<'t>> {
    let Some(statement) = enclosing_statement(start) else {
        return method_calls(start);
    };
    let mut nodes = method_calls(statement);

    let Some(variable) = first_variable(source, statement) else {
        return nodes;
    };

    let scope = ScopeIndex::for_node(source, variable);
    if scope.is_declaration(&variable) {
        return nodes;
    }
    let Some(declaration) = scope.resolve(&variable) else {
        debug!(
            "Unresolved variable ${} at line {}",
            variable_name(source, &variable),
            variable.start_position().row + 1
        );
        return nodes;
    };

    for reference in scope.references(declaration) {
        if let Some(other) = enclosing_statement(*reference) {
            if other != statement {
                nodes.extend(method_calls(other));
            }
        }
    }
    nodes
}

/// Every method call acting on the same builder as `start`, deduplicated.
/// The order is unspecified; replay sorts by [`MethodCall::position`].
pub fn resolve_chain<'t>(source: &'t PhpSource, start: Node<'t>) -> Vec<MethodCall<'t>> {
    let mut seen = HashSet::new();
    chain_nodes(source, start)
        .into_iter()
        .filter(|node| seen.insert(node.id()))
        .filter_map(|node| MethodCall::from_node(source, node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_named<'t>(source: &'t PhpSource, name: &str) -> Node<'t> {
        descendants_of_kind(source.root(), PhpNodeKind::MemberCall)
            .into_iter()
            .find(|n| {
                n.child_by_field_name("name")
                    .is_some_and(|m| source.text(&m) == name)
            })
            .unwrap()
    }

    fn names(calls: &[MethodCall]) -> Vec<String> {
        let mut names: Vec<String> = calls.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_declaring_statement_stays_local() {
        let code = r#"<?php
function f($em) {
    $qb = $em->createQueryBuilder()->select('u');
    $qb->where('u.id = :id');
}
"#;
        let source = PhpSource::parse("test.php", code).unwrap();
        let calls = resolve_chain(&source, call_named(&source, "select"));
        assert_eq!(names(&calls), vec!["createQueryBuilder", "select"]);
    }

    #[test]
    fn test_statement_without_variable_is_local() {
        let code = r#"<?php
class Repo {
    function f() {
        return $this->createQueryBuilder('u')->select('u')->getQuery();
    }
}
"#;
        let source = PhpSource::parse("test.php", code).unwrap();
        let calls = resolve_chain(&source, call_named(&source, "select"));
        assert_eq!(names(&calls), vec!["createQueryBuilder", "getQuery", "select"]);
    }

    #[test]
    fn test_other_scopes_are_not_searched() {
        let code = r#"<?php
function a($qb) {
    $qb->join('u.orders', 'o');
}
function b($qb) {
    $qb->setParameter('x', 1);
}
"#;
        let source = PhpSource::parse("test.php", code).unwrap();
        let calls = resolve_chain(&source, call_named(&source, "join"));
        assert_eq!(names(&calls), vec!["join"]);
    }

    #[test]
    fn test_position_follows_method_name() {
        let code = "<?php $qb->select('u')->from('User', 'u');";
        let source = PhpSource::parse("test.php", code).unwrap();
        let select = MethodCall::from_node(&source, call_named(&source, "select")).unwrap();
        let from = MethodCall::from_node(&source, call_named(&source, "from")).unwrap();

        assert!(select.node.start_byte() == from.node.start_byte());
        assert!(select.position() < from.position());
        assert_eq!(from.arguments.len(), 2);
    }
}
