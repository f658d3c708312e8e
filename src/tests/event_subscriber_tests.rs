// Event subscriber tests
//
// Subscribed events are read from `getSubscribedEvents()` of every class that
// implements the subscriber interface, then merged with listener tags and the
// `@Event` annotation index.

use super::workspace_from;
use crate::config::EventConfig;
use crate::events::{
    SubscribedEvent, collect_event_names, collect_event_targets, collect_subscribed_events,
    subscribed_event,
};
use crate::events::{EventAnnotationTable, ServiceDefinitions};

const SUBSCRIBER_HEADER: &str = r#"<?php
namespace App\EventSubscriber;

use Symfony\Component\EventDispatcher\EventSubscriberInterface;
"#;

fn subscriber(class_body: &str) -> String {
    format!(
        "{}\nclass FooSubscriber implements EventSubscriberInterface\n{{\n    public static function getSubscribedEvents(): array\n    {{\n        {}\n    }}\n}}\n",
        SUBSCRIBER_HEADER, class_body
    )
}

fn events_of(files: &[(&str, &str)]) -> Vec<SubscribedEvent> {
    let workspace = workspace_from(files);
    collect_subscribed_events(&workspace, &EventConfig::default())
}

fn handlers(events: &[SubscribedEvent]) -> Vec<(String, Option<String>)> {
    events
        .iter()
        .map(|e| (e.event_name.clone(), e.handler_method_name.clone()))
        .collect()
}

#[cfg(test)]
mod subscribed_event_tests {
    use super::*;

    #[test]
    fn test_string_handler() {
        let code = subscriber("return ['pre.foo' => 'onFoo'];");
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "pre.foo");
        assert_eq!(events[0].handler_method_name.as_deref(), Some("onFoo"));
        assert_eq!(events[0].subscriber_type_name, "App\\EventSubscriber\\FooSubscriber");
        assert_eq!(events[0].key_signature, None);
        assert_eq!(events[0].type_text(), "EventSubscriber");
    }

    #[test]
    fn test_handler_with_priority() {
        let code = subscriber("return ['pre.foo' => ['onFoo', 5]];");
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(
            handlers(&events),
            vec![("pre.foo".to_string(), Some("onFoo".to_string()))]
        );
    }

    #[test]
    fn test_priority_grouped_handlers() {
        let code = subscriber("return ['pre.foo' => [['onA', 0], ['onB', 1]]];");
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(
            handlers(&events),
            vec![
                ("pre.foo".to_string(), Some("onA".to_string())),
                ("pre.foo".to_string(), Some("onB".to_string())),
            ]
        );
        assert!(events.iter().all(|e| e.subscriber_type_name == events[0].subscriber_type_name));
    }

    #[test]
    fn test_constant_key_resolves_with_signature() {
        let code = format!(
            "{}\nclass FOO {{ const BAR = 'evt.x'; }}\n\nclass FooSubscriber implements EventSubscriberInterface\n{{\n    public static function getSubscribedEvents(): array {{ return [FOO::BAR => 'onX']; }}\n}}\n",
            SUBSCRIBER_HEADER
        );
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "evt.x");
        assert_eq!(
            events[0].key_signature.as_deref(),
            Some("\\App\\EventSubscriber\\FOO::BAR")
        );
    }

    #[test]
    fn test_imported_constant_from_other_file() {
        let events_class = r#"<?php
namespace App\Event;

final class OrderEvents
{
    public const PLACED = 'order.placed';
}
"#;
        let code = format!(
            "{}use App\\Event\\OrderEvents;\n\nclass FooSubscriber implements EventSubscriberInterface\n{{\n    public static function getSubscribedEvents(): array {{ return [OrderEvents::PLACED => 'onPlaced', OrderEvents::MISSING => 'onMissing']; }}\n}}\n",
            SUBSCRIBER_HEADER
        );
        let events = events_of(&[
            ("src/Event/OrderEvents.php", events_class),
            ("src/FooSubscriber.php", &code),
        ]);

        assert_eq!(
            handlers(&events),
            vec![("order.placed".to_string(), Some("onPlaced".to_string()))]
        );
        assert_eq!(
            events[0].key_signature.as_deref(),
            Some("\\App\\Event\\OrderEvents::PLACED")
        );
    }

    #[test]
    fn test_unrecognized_value_keeps_event_without_handler() {
        let code = subscriber("return ['pre.foo' => $this->handler, 'pre.bar' => [], 42];");
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(
            handlers(&events),
            vec![("pre.foo".to_string(), None), ("pre.bar".to_string(), None)]
        );
    }

    #[test]
    fn test_first_return_ignores_closures() {
        let code = subscriber(
            "$build = function () { return ['closure.event' => 'onClosure']; };\n        return ['real.event' => 'onReal'];",
        );
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        assert_eq!(
            handlers(&events),
            vec![("real.event".to_string(), Some("onReal".to_string()))]
        );
    }

    #[test]
    fn test_non_array_return_yields_nothing() {
        let code = subscriber("return self::EVENTS;");
        assert!(events_of(&[("src/FooSubscriber.php", &code)]).is_empty());
    }

    #[test]
    fn test_implementors_through_parents_and_interfaces() {
        let code = r#"<?php
namespace App\EventSubscriber;

use Symfony\Component\EventDispatcher\EventSubscriberInterface;

interface AppSubscriber extends EventSubscriberInterface {}

abstract class BaseSubscriber implements EventSubscriberInterface {}

class ChildSubscriber extends BaseSubscriber
{
    public static function getSubscribedEvents(): array { return ['child.event' => 'onChild']; }
}

class InterfaceSubscriber implements AppSubscriber
{
    public static function getSubscribedEvents(): array { return ['iface.event' => 'onIface']; }
}

class Unrelated
{
    public static function getSubscribedEvents(): array { return ['nope' => 'nope']; }
}
"#;
        let events = events_of(&[("src/Subscribers.php", code)]);
        let mut names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["child.event", "iface.event"]);
    }

    #[test]
    fn test_test_classes_are_skipped() {
        let in_test_namespace = r#"<?php
namespace App\Tests\EventSubscriber;

use Symfony\Component\EventDispatcher\EventSubscriberInterface;

class FixtureSubscriber implements EventSubscriberInterface
{
    public static function getSubscribedEvents(): array { return ['fixture.event' => 'on']; }
}
"#;
        let phpunit_case = r#"<?php
namespace App\EventSubscriber;

use PHPUnit\Framework\TestCase;
use Symfony\Component\EventDispatcher\EventSubscriberInterface;

class InlineSubscriberTest extends TestCase implements EventSubscriberInterface
{
    public static function getSubscribedEvents(): array { return ['test.event' => 'on']; }
}
"#;
        let real = subscriber("return ['real.event' => 'onReal'];");
        let events = events_of(&[
            ("tests/FixtureSubscriber.php", in_test_namespace),
            ("src/InlineSubscriberTest.php", phpunit_case),
            ("src/FooSubscriber.php", &real),
        ]);

        assert_eq!(handlers(&events), vec![("real.event".to_string(), Some("onReal".to_string()))]);
    }

    #[test]
    fn test_subscribed_event_filters_by_name() {
        let code = subscriber("return ['a' => 'onA', 'b' => 'onB', 'a2' => 'onA2'];");
        let events = events_of(&[("src/FooSubscriber.php", &code)]);

        let filtered = subscribed_event(&events, "b");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].handler_method_name.as_deref(), Some("onB"));
        assert!(subscribed_event(&events, "missing").is_empty());
    }
}

#[cfg(test)]
mod event_target_tests {
    use super::*;

    const EVENTS: &str = r#"<?php
namespace App\Event;

final class OrderEvents
{
    /**
     * @Event("App\Event\OrderPlacedEvent")
     */
    public const PLACED = 'order.placed';
}

class OrderPlacedEvent {}
"#;

    const LISTENER: &str = r#"<?php
namespace App\Listener;

class OrderListener
{
    public function __invoke() {}
}
"#;

    const SERVICES: &str = r#"{
        "services": {
            "app.order_listener": {
                "class": "App\\Listener\\OrderListener",
                "tags": [{"name": "kernel.event_listener", "event": "order.placed"}]
            },
            "App\\EventSubscriber\\FooSubscriber": {
                "tags": [{"name": "kernel.event_listener", "event": "order.placed"}]
            },
            "app.user_listener": {
                "class": "App\\Listener\\Missing",
                "tags": [{"name": "kernel.event_listener", "event": "user.created"}]
            }
        }
    }"#;

    #[test]
    fn test_targets_merge_sources_without_duplicates() {
        let code = subscriber("return [\\App\\Event\\OrderEvents::PLACED => 'onPlaced'];");
        let workspace = workspace_from(&[
            ("src/Event/OrderEvents.php", EVENTS),
            ("src/Listener/OrderListener.php", LISTENER),
            ("src/FooSubscriber.php", &code),
        ]);
        let config = EventConfig::default();
        let events = collect_subscribed_events(&workspace, &config);
        let services = ServiceDefinitions::from_json_str(SERVICES).unwrap();

        let targets = collect_event_targets(
            &workspace,
            &config,
            &events,
            "order.placed",
            &services,
            workspace.annotations(),
        );
        let fqns: Vec<&str> = targets.iter().map(|t| t.fqn.as_str()).collect();

        assert_eq!(
            fqns,
            vec![
                "App\\EventSubscriber\\FooSubscriber",
                "App\\Listener\\OrderListener",
                "App\\Event\\OrderPlacedEvent",
            ]
        );
        assert_eq!(targets[1].path.to_str(), Some("src/Listener/OrderListener.php"));
        assert_eq!(targets[1].line, 4);

        // listener class is not part of the workspace
        let none = collect_event_targets(
            &workspace,
            &config,
            &events,
            "user.created",
            &services,
            workspace.annotations(),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_event_names_prefer_later_sources() {
        let code = subscriber("return ['order.placed' => 'onPlaced', 'kernel.request' => 'onRequest'];");
        let workspace = workspace_from(&[
            ("src/Event/OrderEvents.php", EVENTS),
            ("src/FooSubscriber.php", &code),
        ]);
        let config = EventConfig::default();
        let events = collect_subscribed_events(&workspace, &config);
        let services = ServiceDefinitions::from_json_str(SERVICES).unwrap();

        let mut annotations = EventAnnotationTable::new();
        for source in workspace.sources() {
            annotations.index_source(source);
        }
        annotations.insert("security.login", None);

        let hints: Vec<(String, String)> =
            collect_event_names(&config, &events, &services, &annotations)
                .into_iter()
                .map(|h| (h.name, h.type_text))
                .collect();

        assert_eq!(
            hints,
            vec![
                ("kernel.request".to_string(), "EventSubscriber".to_string()),
                ("order.placed".to_string(), "App\\Event\\OrderPlacedEvent".to_string()),
                ("security.login".to_string(), "Event".to_string()),
                ("user.created".to_string(), "kernel.event_listener".to_string()),
            ]
        );
    }
}
