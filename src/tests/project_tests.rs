// Project tests
//
// Loading a project directory from disk, configuration files and the
// epoch-keyed event cache behind `SymfonyProject`.

use crate::config::{CONFIG_FILE_NAME, SymfactConfig};
use crate::error::SymfactError;
use crate::events::ServiceDefinitions;
use crate::extractors::PhpIndex;
use crate::project::SymfonyProject;
use crate::querybuilder::metadata::NoEntityMetadata;
use crate::templates::TemplateEdgeKind;
use crate::workspace::{PHP_EXTENSION, PhpWorkspace, collect_files};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const SUBSCRIBER: &str = r#"<?php
namespace App\EventSubscriber;

use Symfony\Component\EventDispatcher\EventSubscriberInterface;

class OrderSubscriber implements EventSubscriberInterface
{
    public static function getSubscribedEvents(): array
    {
        return ['order.placed' => 'onPlaced'];
    }
}
"#;

const REPOSITORY: &str = r#"<?php
namespace App\Repository;

class OrderRepository
{
    public function paid($qb)
    {
        $qb->from('App\Entity\Order', 'o');
        $qb->andWhere('o.paid = :paid');
    }
}
"#;

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// A small Symfony-shaped project: sources, an excluded cache directory and
/// two templates
fn project_dir() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "src/EventSubscriber/OrderSubscriber.php", SUBSCRIBER);
    write(root, "src/Repository/OrderRepository.php", REPOSITORY);
    write(
        root,
        "var/cache/dev/ContainerXyz/OrderSubscriberProxy.php",
        &SUBSCRIBER.replace("OrderSubscriber", "OrderSubscriberProxy"),
    );
    write(root, "templates/base.html.twig", "{% block body %}{% endblock %}");
    write(
        root,
        "templates/order/show.html.twig",
        "{% extends 'base.html.twig' %}\n{% block body %}order{% endblock %}",
    );
    temp_dir
}

#[cfg(test)]
mod workspace_tests {
    use super::*;

    #[test]
    fn test_collect_files_skips_excluded_directories() {
        let temp_dir = project_dir();
        let root = temp_dir.path();

        let all = collect_files(root, PHP_EXTENSION, &[]);
        assert_eq!(all.len(), 3);

        let files = collect_files(root, PHP_EXTENSION, &["var".to_string()]);
        assert_eq!(
            files,
            vec![
                root.join("src/EventSubscriber/OrderSubscriber.php"),
                root.join("src/Repository/OrderRepository.php"),
            ]
        );
    }

    #[test]
    fn test_load_indexes_classes() {
        let temp_dir = project_dir();
        let workspace = PhpWorkspace::load(temp_dir.path(), &SymfactConfig::default()).unwrap();

        assert_eq!(workspace.sources().len(), 2);
        assert_eq!(workspace.class_count(), 2);
        let found = workspace.find_classes("\\App\\EventSubscriber\\OrderSubscriber");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line(), 6);
        assert!(workspace.find_classes("App\\EventSubscriber\\OrderSubscriberProxy").is_empty());
    }

    #[test]
    fn test_load_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let result = PhpWorkspace::load(&missing, &SymfactConfig::default());
        assert!(matches!(result, Err(SymfactError::Io { .. })));
    }

    #[test]
    fn test_upsert_and_remove_rebuild_indexes() {
        let mut workspace = super::super::workspace_from(&[("src/A.php", "<?php class A {}")]);
        assert_eq!(workspace.class_count(), 1);

        let replacement = crate::PhpSource::parse("src/A.php", "<?php class A {} class B {}").unwrap();
        workspace.upsert_source(replacement);
        assert_eq!(workspace.sources().len(), 1);
        assert_eq!(workspace.class_count(), 2);

        assert!(workspace.remove_source(Path::new("src/A.php")));
        assert!(!workspace.remove_source(Path::new("src/A.php")));
        assert_eq!(workspace.class_count(), 0);
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SymfactConfig::from_toml_str(
            r#"
[events]
listener_tag = "app.event_listener"

[templates]
max_depth = 3

[[templates.roots]]
path = "bundles/admin/views"
namespace = "Admin"
"#,
        )
        .unwrap();

        let defaults = SymfactConfig::default();
        assert_eq!(config.events.listener_tag, "app.event_listener");
        assert_eq!(config.events.subscriber_interface, defaults.events.subscriber_interface);
        assert_eq!(config.templates.max_depth, 3);
        assert_eq!(config.templates.extensions, defaults.templates.extensions);
        assert_eq!(config.templates.roots.len(), 1);
        assert_eq!(config.templates.roots[0].namespace.as_deref(), Some("Admin"));
        assert_eq!(config.query_builder, defaults.query_builder);
        assert_eq!(config.workspace, defaults.workspace);
    }

    #[test]
    fn test_empty_and_invalid_toml() {
        assert_eq!(SymfactConfig::from_toml_str("").unwrap(), SymfactConfig::default());
        assert!(matches!(
            SymfactConfig::from_toml_str("[templates]\nmax_depth = \"deep\""),
            Err(SymfactError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(
            SymfactConfig::load_from_root(temp_dir.path()).unwrap(),
            SymfactConfig::default()
        );

        let mut config = SymfactConfig::default();
        config.workspace.exclude_dirs.push("vendor".to_string());
        config.query_builder.join_methods = vec!["join".to_string()];
        config.save(&temp_dir.path().join(CONFIG_FILE_NAME)).unwrap();

        assert_eq!(SymfactConfig::load_from_root(temp_dir.path()).unwrap(), config);
    }
}

#[cfg(test)]
mod project_facade_tests {
    use super::*;

    #[test]
    fn test_subscribed_events_cached_per_epoch() {
        let temp_dir = project_dir();
        let root = temp_dir.path();
        let mut project = SymfonyProject::load(root, SymfactConfig::default()).unwrap();

        let first = project.subscribed_events();
        let second = project.subscribed_events();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].event_name, "order.placed");

        project
            .update_php_source(
                &root.join("src/EventSubscriber/OrderSubscriber.php"),
                &SUBSCRIBER.replace("'order.placed' => 'onPlaced'", "'order.paid' => ['onPaid', 10]"),
            )
            .unwrap();
        assert_eq!(project.epoch(), 1);

        let third = project.subscribed_events();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].event_name, "order.paid");
        assert_eq!(third[0].handler_method_name.as_deref(), Some("onPaid"));
        assert_eq!(project.workspace().sources().len(), 2);
    }

    #[test]
    fn test_event_targets_and_names_with_services() {
        let temp_dir = project_dir();
        let root = temp_dir.path();
        let services = ServiceDefinitions::from_json_str(
            r#"{"services": {"app.mailer": {
                "class": "App\\EventSubscriber\\OrderSubscriber",
                "tags": [{"name": "kernel.event_listener", "event": "order.shipped"}]
            }}}"#,
        )
        .unwrap();
        let project = SymfonyProject::load(root, SymfactConfig::default())
            .unwrap()
            .with_services(services);

        let targets = project.event_targets("order.placed");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].fqn, "App\\EventSubscriber\\OrderSubscriber");
        assert_eq!(targets[0].path, root.join("src/EventSubscriber/OrderSubscriber.php"));
        assert_eq!(project.event_targets("order.shipped"), targets);

        let names: Vec<(String, String)> = project
            .event_names()
            .into_iter()
            .map(|h| (h.name, h.type_text))
            .collect();
        assert_eq!(
            names,
            vec![
                ("order.placed".to_string(), "EventSubscriber".to_string()),
                ("order.shipped".to_string(), "kernel.event_listener".to_string()),
            ]
        );
    }

    #[test]
    fn test_builder_state_for_loaded_file() {
        let temp_dir = project_dir();
        let root = temp_dir.path();
        let project = SymfonyProject::load(root, SymfactConfig::default()).unwrap();
        let path = root.join("src/Repository/OrderRepository.php");

        // `$qb->andWhere(...)` on line 9
        let state = project
            .builder_state_at(&path, 9, 14, &NoEntityMetadata)
            .unwrap();
        assert!(state.parameters.contains("paid"));
        assert_eq!(state.roots["o"], "App\\Entity\\Order");

        assert!(project
            .builder_state_at(&root.join("src/Missing.php"), 1, 0, &NoEntityMetadata)
            .is_none());
    }

    #[test]
    fn test_templates_follow_updates() {
        let temp_dir = project_dir();
        let root = temp_dir.path();
        let mut project = SymfonyProject::load(root, SymfactConfig::default()).unwrap();
        let base = root.join("templates/base.html.twig");
        let show = root.join("templates/order/show.html.twig");

        assert_eq!(project.templates().len(), 2);
        assert_eq!(
            project.template_walker().related(&base, TemplateEdgeKind::Extends),
            vec![show.clone()]
        );

        project.update_template(&show, "{% include 'base.html.twig' %}");
        assert_eq!(project.epoch(), 1);
        let walker = project.template_walker();
        assert!(walker.related(&base, TemplateEdgeKind::Extends).is_empty());
        assert_eq!(walker.related(&base, TemplateEdgeKind::Include), vec![show]);
    }
}
