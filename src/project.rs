//! A loaded Symfony project: configuration, parsed PHP sources, service
//! definitions and the template index, with subscribed events cached per
//! modification epoch.

use crate::cache::{FactCache, ModificationTracker};
use crate::config::SymfactConfig;
use crate::error::Result;
use crate::events::{
    ClassTarget, EventNameHint, ServiceDefinitions, SubscribedEvent, collect_event_names,
    collect_event_targets, collect_subscribed_events,
};
use crate::extractors::base::PhpSource;
use crate::querybuilder::metadata::EntityMetadata;
use crate::querybuilder::{BuilderState, builder_state_at};
use crate::templates::{TemplateFileMap, TemplateWalker, TwigTemplateIndex};
use crate::workspace::PhpWorkspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const SUBSCRIBED_EVENTS_KEY: &str = "subscribed-events";

pub struct SymfonyProject {
    root: PathBuf,
    config: SymfactConfig,
    workspace: PhpWorkspace,
    services: ServiceDefinitions,
    templates: TwigTemplateIndex,
    tracker: ModificationTracker,
    events: FactCache<&'static str, Vec<SubscribedEvent>>,
}

impl SymfonyProject {
    pub fn load(root: &Path, config: SymfactConfig) -> Result<Self> {
        let workspace = PhpWorkspace::load(root, &config)?;
        let file_map = TemplateFileMap::from_roots(root, &config.templates);
        let templates = TwigTemplateIndex::from_file_map(&file_map);
        info!(
            "Project {} loaded: {} PHP sources, {} templates",
            root.display(),
            workspace.sources().len(),
            templates.len()
        );

        Ok(Self::from_parts(root, config, workspace, templates))
    }

    pub fn from_parts(
        root: &Path,
        config: SymfactConfig,
        workspace: PhpWorkspace,
        templates: TwigTemplateIndex,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            workspace,
            services: ServiceDefinitions::default(),
            templates,
            tracker: ModificationTracker::new(),
            events: FactCache::new(),
        }
    }

    pub fn with_services(mut self, services: ServiceDefinitions) -> Self {
        self.services = services;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SymfactConfig {
        &self.config
    }

    pub fn workspace(&self) -> &PhpWorkspace {
        &self.workspace
    }

    pub fn templates(&self) -> &TwigTemplateIndex {
        &self.templates
    }

    pub fn epoch(&self) -> u64 {
        self.tracker.epoch()
    }

    fn modified(&self) {
        let epoch = self.tracker.bump();
        self.events.invalidate(epoch);
        debug!("Project modified, epoch {}", epoch);
    }

    /// Replace (or add) a PHP source
    pub fn update_php_source(&mut self, path: &Path, content: &str) -> Result<()> {
        let source = PhpSource::parse(path, content)?;
        self.workspace.upsert_source(source);
        self.modified();
        Ok(())
    }

    /// Replace (or add) a template's content
    pub fn update_template(&mut self, path: &Path, content: &str) {
        self.templates.index_template(path, content);
        self.modified();
    }

    pub fn subscribed_events(&self) -> Arc<Vec<SubscribedEvent>> {
        self.events
            .get_or_compute(SUBSCRIBED_EVENTS_KEY, self.tracker.epoch(), || {
                collect_subscribed_events(&self.workspace, &self.config.events)
            })
    }

    pub fn event_targets(&self, event_name: &str) -> Vec<ClassTarget> {
        let events = self.subscribed_events();
        collect_event_targets(
            &self.workspace,
            &self.config.events,
            &events,
            event_name,
            &self.services,
            self.workspace.annotations(),
        )
    }

    pub fn event_names(&self) -> Vec<EventNameHint> {
        let events = self.subscribed_events();
        collect_event_names(
            &self.config.events,
            &events,
            &self.services,
            self.workspace.annotations(),
        )
    }

    /// Builder state for the call at a position of a loaded file
    pub fn builder_state_at(
        &self,
        path: &Path,
        line: usize,
        column: usize,
        metadata: &dyn EntityMetadata,
    ) -> Option<BuilderState> {
        let source = self.workspace.source(path)?;
        builder_state_at(source, line, column, metadata, &self.config.query_builder)
    }

    /// Template queries over the configured roots. The name map is built on
    /// first use and kept for the walker's lifetime.
    pub fn template_walker(&self) -> TemplateWalker<'_> {
        let root = self.root.as_path();
        let config = &self.config.templates;
        TemplateWalker::new(
            &self.templates,
            move || TemplateFileMap::from_roots(root, config),
            config.max_depth,
        )
    }
}
