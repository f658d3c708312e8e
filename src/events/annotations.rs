// `@Event` docblock index
//
// Event-name constants documented with `@Event("App\Event\OrderPlaced")` name
// the event object class dispatched for them.

use crate::extractors::base::{
    PhpNodeKind, PhpSource, code_children, named_children, string_literal_value, walk_named,
};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static EVENT_ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@Event\b(?:\(\s*["']\\?([^"']*)["']\s*\))?"#).unwrap()
});

/// Event names declared through annotations, keyed by name
pub trait EventAnnotationIndex {
    fn event_names(&self) -> Vec<String>;

    /// Event object classes documented for `name`
    fn event_instances(&self, name: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventAnnotationTable {
    events: BTreeMap<String, BTreeSet<String>>,
}

impl EventAnnotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event name, optionally with its event class
    pub fn insert(&mut self, name: &str, instance: Option<&str>) {
        let instances = self.events.entry(name.to_string()).or_default();
        if let Some(instance) = instance.map(|i| i.trim_start_matches('\\')).filter(|i| !i.is_empty()) {
            instances.insert(instance.to_string());
        }
    }

    pub fn index_source(&mut self, source: &PhpSource) {
        walk_named(source.root(), &mut |node| {
            if PhpNodeKind::of(&node) != PhpNodeKind::ConstDeclaration {
                return true;
            }
            let Some(doc) = node
                .prev_named_sibling()
                .filter(|n| PhpNodeKind::of(n) == PhpNodeKind::Comment)
            else {
                return false;
            };
            let Some(captures) = EVENT_ANNOTATION_RE.captures(source.text(&doc)) else {
                return false;
            };
            let instance = captures.get(1).map(|m| m.as_str());

            for element in named_children(&node) {
                let parts = code_children(&element);
                if element.kind() != "const_element" || parts.len() < 2 {
                    continue;
                }
                if let Some(name) = string_literal_value(source, &parts[parts.len() - 1]) {
                    self.insert(&name, instance);
                }
            }
            false
        });
    }
}

impl EventAnnotationIndex for EventAnnotationTable {
    fn event_names(&self) -> Vec<String> {
        self.events.keys().cloned().collect()
    }

    fn event_instances(&self, name: &str) -> Vec<String> {
        self.events
            .get(name)
            .map(|instances| instances.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_event_docblocks() {
        let code = r#"<?php
namespace App\Event;

final class OrderEvents
{
    /**
     * @Event("App\Event\OrderPlacedEvent")
     */
    public const PLACED = 'order.placed';

    /** @Event */
    public const CANCELLED = 'order.cancelled';

    /** @EventListener("nope") */
    public const IGNORED = 'order.ignored';

    public const UNDOCUMENTED = 'order.undocumented';
}
"#;
        let source = PhpSource::parse("OrderEvents.php", code).unwrap();
        let mut table = EventAnnotationTable::new();
        table.index_source(&source);

        assert_eq!(
            table.event_names(),
            vec!["order.cancelled".to_string(), "order.placed".to_string()]
        );
        assert_eq!(
            table.event_instances("order.placed"),
            vec!["App\\Event\\OrderPlacedEvent".to_string()]
        );
        assert!(table.event_instances("order.cancelled").is_empty());
        assert!(table.event_instances("order.undocumented").is_empty());
    }
}
