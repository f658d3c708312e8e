//! Analyzer configuration.
//!
//! Loaded from a `symfact.toml` next to the analyzed project. Every section
//! falls back to Symfony's conventional names, so an empty file (or no file at
//! all) gives a working setup.

use crate::error::{Result, SymfactError};
use crate::templates::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "symfact.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymfactConfig {
    pub events: EventConfig,
    pub query_builder: QueryBuilderConfig,
    pub templates: TemplateConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Contract a subscriber implements, fully qualified without leading `\`
    pub subscriber_interface: String,
    /// Static method returning the event map
    pub subscribed_events_method: String,
    /// Service tag for declaratively configured listeners
    pub listener_tag: String,
    /// Namespace fragments that mark a class as a test fixture
    pub test_namespace_markers: Vec<String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            subscriber_interface: "Symfony\\Component\\EventDispatcher\\EventSubscriberInterface"
                .to_string(),
            subscribed_events_method: "getSubscribedEvents".to_string(),
            listener_tag: "kernel.event_listener".to_string(),
            test_namespace_markers: vec!["\\Test\\".to_string(), "\\Tests\\".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryBuilderConfig {
    pub join_methods: Vec<String>,
    pub where_methods: Vec<String>,
}

impl Default for QueryBuilderConfig {
    fn default() -> Self {
        Self {
            join_methods: ["join", "innerJoin", "leftJoin", "rightJoin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            where_methods: ["where", "andWhere", "orWhere", "having", "andHaving", "orHaving"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub max_depth: usize,
    pub extensions: Vec<String>,
    pub roots: Vec<TemplateRoot>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            extensions: vec!["twig".to_string()],
            roots: vec![TemplateRoot {
                path: PathBuf::from("templates"),
                namespace: None,
            }],
        }
    }
}

/// A directory templates are addressed from, e.g. `templates/` or a bundle's
/// `Resources/views` registered under `@Acme`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRoot {
    pub path: PathBuf,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: [".git", "node_modules", "var"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SymfactConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Configuration file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SymfactError::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load `symfact.toml` from a project root.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        Self::load(&root.join(CONFIG_FILE_NAME))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| SymfactError::io(path, e))?;
        debug!("Saved configuration to: {}", path.display());
        Ok(())
    }
}
