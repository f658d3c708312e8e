// symfact - Symfony semantic fact extraction library
//!
//! symfact reads the PHP and Twig sources of a Symfony application and
//! recovers facts that static types do not show: which subscriber handles
//! which event, what state a Doctrine query builder is in at a given call, and
//! how templates extend, include and import each other.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod extractors;
pub mod project;
pub mod querybuilder;
pub mod templates;
pub mod workspace;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use cache::{FactCache, ModificationTracker};
pub use config::SymfactConfig;
pub use error::{Result, SymfactError};
pub use events::{SubscribedEvent, collect_subscribed_events};
pub use extractors::{PhpIndex, PhpSource};
pub use project::SymfonyProject;
pub use querybuilder::{BuilderState, collect_builder_state};
pub use templates::{TemplateEdgeKind, TemplateFileMap, collect_related_templates};
pub use workspace::PhpWorkspace;
