// Array-literal fact extraction
//
// Reads the declarative `[key => value]` maps returned by convention methods
// such as `getSubscribedEvents()`. Keys are resolved to strings, values to the
// handler names they declare. Anything unrecognized is skipped silently.

use super::constants::{ConstantReference, StringConstantResolver};
use super::namespaces::NameContext;
use crate::extractors::base::{
    PhpNodeKind, PhpSource, array_elements, array_entry, string_literal_value,
};
use tree_sitter::Node;

/// What an extraction needs besides the array node itself
pub struct ArrayFactContext<'a> {
    pub source: &'a PhpSource,
    pub names: &'a NameContext,
    /// FQN used for `self::` / `static::` keys
    pub current_class: Option<&'a str>,
    pub constants: &'a dyn StringConstantResolver,
}

/// One resolved `key => value` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayFact {
    pub key: String,
    /// Symbolic text of the key when it was a constant reference
    pub key_signature: Option<String>,
    /// Handler names in source order; empty when the value declared none
    pub handlers: Vec<String>,
}

impl<'a> ArrayFactContext<'a> {
    /// String value of a literal or of a constant reference
    fn resolve_string(&self, node: &Node) -> Option<(String, Option<String>)> {
        if let Some(literal) = string_literal_value(self.source, node) {
            return Some((literal, None));
        }
        let reference =
            ConstantReference::from_node(self.source, node, self.names, self.current_class)?;
        let value = self.constants.resolve_string_constant(&reference)?;
        Some((value, Some(reference.signature())))
    }

    fn first_element_value<'t>(&self, array: &Node<'t>) -> Option<Node<'t>> {
        array_elements(array)
            .first()
            .and_then(|element| array_entry(element).1)
    }

    /// Handler names declared by an entry value, by precedence:
    /// scalar, `['method', priority]`, `[['a', 0], ['b', 1]]`.
    fn handlers(&self, value: &Node) -> Vec<String> {
        if let Some((name, _)) = self.resolve_string(value) {
            return vec![name];
        }
        if PhpNodeKind::of(value) != PhpNodeKind::ArrayLiteral {
            return Vec::new();
        }

        let Some(first) = self.first_element_value(value) else {
            return Vec::new();
        };
        if let Some(name) = string_literal_value(self.source, &first) {
            return vec![name];
        }
        if PhpNodeKind::of(&first) != PhpNodeKind::ArrayLiteral {
            return Vec::new();
        }

        array_elements(value)
            .iter()
            .filter_map(|element| array_entry(element).1)
            .filter(|inner| PhpNodeKind::of(inner) == PhpNodeKind::ArrayLiteral)
            .filter_map(|inner| self.first_element_value(&inner))
            .filter_map(|method| string_literal_value(self.source, &method))
            .collect()
    }
}

/// Extract the keyed entries of an array literal.
///
/// Returns an empty list when `expression` is not an array literal.
pub fn extract_array_facts(context: &ArrayFactContext, expression: &Node) -> Vec<ArrayFact> {
    if PhpNodeKind::of(expression) != PhpNodeKind::ArrayLiteral {
        return Vec::new();
    }

    let mut facts = Vec::new();
    for element in array_elements(expression) {
        let (Some(key), value) = array_entry(&element) else {
            continue;
        };
        let Some((key, key_signature)) = context.resolve_string(&key) else {
            continue;
        };

        facts.push(ArrayFact {
            key,
            key_signature,
            handlers: value.map(|v| context.handlers(&v)).unwrap_or_default(),
        });
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::base::first_descendant;
    use crate::extractors::php::constants::ConstantTable;

    fn facts_of(code: &str, constants: &ConstantTable) -> Vec<ArrayFact> {
        let source = PhpSource::parse("test.php", code).unwrap();
        let names = NameContext::new(Some("App"));
        let array = first_descendant(source.root(), |n| {
            PhpNodeKind::of(n) == PhpNodeKind::ArrayLiteral
        })
        .unwrap();
        let context = ArrayFactContext {
            source: &source,
            names: &names,
            current_class: Some("App\\Subscriber"),
            constants,
        };
        extract_array_facts(&context, &array)
    }

    #[test]
    fn test_unresolvable_and_positional_keys_are_skipped() {
        let facts = facts_of(
            "<?php return ['a' => 'onA', 'onB', Missing::KEY => 'onC', $dyn => 'onD'];",
            &ConstantTable::new(),
        );
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "a");
        assert_eq!(facts[0].handlers, vec!["onA".to_string()]);
    }

    #[test]
    fn test_self_constant_key_and_unknown_value() {
        let mut constants = ConstantTable::new();
        constants.insert_class_constant("App\\Subscriber", "EVT", "evt.self");

        let facts = facts_of("<?php return [self::EVT => $handler];", &constants);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "evt.self");
        assert_eq!(facts[0].key_signature.as_deref(), Some("\\App\\Subscriber::EVT"));
        assert!(facts[0].handlers.is_empty());
    }
}
