//! Event subscriber facts.
//!
//! Subscribers declare the events they handle through the static
//! `getSubscribedEvents()` map:
//!
//! ```php
//! public static function getSubscribedEvents(): array
//! {
//!     return [
//!         KernelEvents::REQUEST => 'onRequest',
//!         'order.placed' => ['onOrder', 10],
//!         'order.paid' => [['audit', 0], ['notify', -5]],
//!     ];
//! }
//! ```
//!
//! This module turns those maps into [`SubscribedEvent`] facts and merges them
//! with listener tags and the `@Event` annotation index when resolving
//! navigation targets or the list of known event names.

pub mod annotations;
pub mod tags;

use crate::config::EventConfig;
use crate::extractors::base::{PhpNodeKind, code_children, walk_named};
use crate::extractors::php::arrays::{ArrayFactContext, extract_array_facts};
use crate::extractors::php::{ClassHandle, PhpIndex};
use annotations::EventAnnotationIndex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tags::ListenerTagSource;
use tracing::debug;
use tree_sitter::Node;

pub use annotations::EventAnnotationTable;
pub use tags::{ServiceDefinitions, TagAttributes};

/// Type hint shown for subscriber-declared events
pub const SUBSCRIBER_TYPE_TEXT: &str = "EventSubscriber";

/// Type hint for annotated events without a documented event class
pub const ANNOTATION_TYPE_TEXT: &str = "Event";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribedEvent {
    pub event_name: String,
    /// Fully qualified subscriber class
    pub subscriber_type_name: String,
    pub handler_method_name: Option<String>,
    /// Symbolic key when the event name came from a constant, e.g.
    /// `\Symfony\Component\HttpKernel\KernelEvents::REQUEST`
    pub key_signature: Option<String>,
}

impl SubscribedEvent {
    pub fn type_text(&self) -> &'static str {
        SUBSCRIBER_TYPE_TEXT
    }
}

/// First `return` of a method body, ignoring closures and nested classes
fn first_return<'t>(body: Node<'t>) -> Option<Node<'t>> {
    let mut found = None;
    walk_named(body, &mut |node| {
        if found.is_some() {
            return false;
        }
        let kind = PhpNodeKind::of(&node);
        if kind == PhpNodeKind::Return {
            found = Some(node);
            return false;
        }
        node == body || !(kind.opens_scope() || kind == PhpNodeKind::ArrowFunction)
    });
    found
}

/// Subscribed events declared by one subscriber class
pub fn subscriber_events(
    class: &ClassHandle<'_>,
    index: &dyn PhpIndex,
    config: &EventConfig,
) -> Vec<SubscribedEvent> {
    let Some(method) = class.find_method(&config.subscribed_events_method) else {
        return Vec::new();
    };
    let Some(returned) = method
        .child_by_field_name("body")
        .and_then(first_return)
        .and_then(|ret| code_children(&ret).first().copied())
    else {
        return Vec::new();
    };

    let names = class.name_context();
    let context = ArrayFactContext {
        source: class.source,
        names: &names,
        current_class: Some(&class.fqn),
        constants: index.constants(),
    };

    let mut events = Vec::new();
    for fact in extract_array_facts(&context, &returned) {
        let handlers: Vec<Option<String>> = if fact.handlers.is_empty() {
            vec![None]
        } else {
            fact.handlers.into_iter().map(Some).collect()
        };
        for handler in handlers {
            events.push(SubscribedEvent {
                event_name: fact.key.clone(),
                subscriber_type_name: class.fqn.clone(),
                handler_method_name: handler,
                key_signature: fact.key_signature.clone(),
            });
        }
    }
    events
}

/// Every event declared by a non-test implementor of the subscriber contract
pub fn collect_subscribed_events(index: &dyn PhpIndex, config: &EventConfig) -> Vec<SubscribedEvent> {
    let mut events = Vec::new();
    for class in index.subscriber_implementors(&config.subscriber_interface) {
        if index.is_test_class(&class) {
            debug!("Skipping test subscriber {}", class.fqn);
            continue;
        }
        events.extend(subscriber_events(&class, index, config));
    }
    debug!("Collected {} subscribed events", events.len());
    events
}

/// Events subscribed under `event_name`
pub fn subscribed_event<'e>(events: &'e [SubscribedEvent], event_name: &str) -> Vec<&'e SubscribedEvent> {
    events.iter().filter(|e| e.event_name == event_name).collect()
}

/// A navigable class declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassTarget {
    pub fqn: String,
    pub path: PathBuf,
    /// Byte offset of the declaration
    pub offset: usize,
    pub line: usize,
}

impl ClassTarget {
    fn of(class: &ClassHandle<'_>) -> Self {
        Self {
            fqn: class.fqn.clone(),
            path: class.source.path().to_path_buf(),
            offset: class.offset(),
            line: class.line(),
        }
    }
}

/// Class declarations handling `event_name`: subscribers, tagged listener
/// services and annotated event classes. Each declaration appears once.
pub fn collect_event_targets(
    index: &dyn PhpIndex,
    config: &EventConfig,
    events: &[SubscribedEvent],
    event_name: &str,
    tags: &dyn ListenerTagSource,
    annotations: &dyn EventAnnotationIndex,
) -> Vec<ClassTarget> {
    let mut class_names: Vec<String> = subscribed_event(events, event_name)
        .into_iter()
        .map(|e| e.subscriber_type_name.clone())
        .collect();

    tags.visit_tag(&config.listener_tag, &mut |attributes| {
        let matches = attributes
            .attribute("event")
            .is_some_and(|event| !event.trim().is_empty() && event == event_name);
        if !matches || attributes.service_id.trim().is_empty() {
            return;
        }
        if let Some(class) = tags.resolve_service_class(&attributes.service_id) {
            class_names.push(class);
        }
    });

    class_names.extend(annotations.event_instances(event_name));

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for class_name in class_names {
        for class in index.find_classes(&class_name) {
            let target = ClassTarget::of(&class);
            if seen.insert((target.path.clone(), target.offset)) {
                targets.push(target);
            }
        }
    }
    targets
}

/// A known event name with the hint describing where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventNameHint {
    pub name: String,
    pub type_text: String,
}

/// Every known event name, sorted. When sources disagree the later one wins:
/// subscribers, then listener tags, then annotations.
pub fn collect_event_names(
    config: &EventConfig,
    events: &[SubscribedEvent],
    tags: &dyn ListenerTagSource,
    annotations: &dyn EventAnnotationIndex,
) -> Vec<EventNameHint> {
    let mut hints: BTreeMap<String, String> = BTreeMap::new();

    for event in events {
        hints.insert(event.event_name.clone(), event.type_text().to_string());
    }

    tags.visit_tag(&config.listener_tag, &mut |attributes| {
        if let Some(event) = attributes.attribute("event").filter(|e| !e.trim().is_empty()) {
            hints.insert(event.to_string(), config.listener_tag.clone());
        }
    });

    for name in annotations.event_names() {
        let type_text = annotations
            .event_instances(&name)
            .into_iter()
            .next()
            .unwrap_or_else(|| ANNOTATION_TYPE_TEXT.to_string());
        hints.insert(name, type_text);
    }

    hints
        .into_iter()
        .map(|(name, type_text)| EventNameHint { name, type_text })
        .collect()
}
