//! Declaratively configured listeners.
//!
//! Services tagged `kernel.event_listener` (or whatever tag is configured)
//! carry the event they listen to as a tag attribute. The container dump is
//! consumed as a JSON document:
//!
//! ```json
//! {
//!   "services": {
//!     "app.audit_listener": {
//!       "class": "App\\EventListener\\AuditListener",
//!       "tags": [{ "name": "kernel.event_listener", "event": "order.placed" }]
//!     }
//!   }
//! }
//! ```

use crate::error::{Result, SymfactError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Attributes of one tag occurrence on one service
#[derive(Debug, Clone, PartialEq)]
pub struct TagAttributes {
    pub service_id: String,
    pub attributes: BTreeMap<String, String>,
}

impl TagAttributes {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Visitor over declaratively tagged services
pub trait ListenerTagSource {
    /// Call `visitor` once per occurrence of `tag`
    fn visit_tag(&self, tag: &str, visitor: &mut dyn FnMut(&TagAttributes));

    /// Class behind a service id
    fn resolve_service_class(&self, service_id: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceTag {
    pub name: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub tags: Vec<ServiceTag>,
}

/// Service definitions loaded from a container dump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinitions {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
}

impl ServiceDefinitions {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SymfactError::io(path, e))?;
        let definitions = Self::from_json_str(&content)?;
        debug!(
            "Loaded {} service definitions from {}",
            definitions.services.len(),
            path.display()
        );
        Ok(definitions)
    }
}

/// Scalar tag attributes as strings; nested values are not attributes
fn attribute_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ListenerTagSource for ServiceDefinitions {
    fn visit_tag(&self, tag: &str, visitor: &mut dyn FnMut(&TagAttributes)) {
        for (service_id, definition) in &self.services {
            for service_tag in definition.tags.iter().filter(|t| t.name == tag) {
                let attributes = service_tag
                    .attributes
                    .iter()
                    .filter_map(|(key, value)| Some((key.clone(), attribute_text(value)?)))
                    .collect();
                visitor(&TagAttributes {
                    service_id: service_id.clone(),
                    attributes,
                });
            }
        }
    }

    fn resolve_service_class(&self, service_id: &str) -> Option<String> {
        if let Some(class) = self
            .services
            .get(service_id)
            .and_then(|definition| definition.class.as_deref())
        {
            return Some(class.trim_start_matches('\\').to_string());
        }
        // services registered under their class name need no `class` key
        service_id
            .contains('\\')
            .then(|| service_id.trim_start_matches('\\').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_tag_and_resolve_class() {
        let definitions = ServiceDefinitions::from_json_str(
            r#"{
                "services": {
                    "app.audit": {
                        "class": "\\App\\Listener\\Audit",
                        "tags": [
                            {"name": "kernel.event_listener", "event": "order.placed", "priority": 10},
                            {"name": "monolog.logger", "channel": "audit"}
                        ]
                    },
                    "App\\Listener\\Mailer": {
                        "tags": [{"name": "kernel.event_listener", "event": "user.created"}]
                    }
                }
            }"#,
        )
        .unwrap();

        let mut seen = Vec::new();
        definitions.visit_tag("kernel.event_listener", &mut |attributes| {
            seen.push((
                attributes.service_id.clone(),
                attributes.attribute("event").map(str::to_string),
                attributes.attribute("priority").map(str::to_string),
            ));
        });

        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            ("App\\Listener\\Mailer".to_string(), Some("user.created".to_string()), None)
        );
        assert_eq!(seen[1].1.as_deref(), Some("order.placed"));
        assert_eq!(seen[1].2.as_deref(), Some("10"));

        assert_eq!(
            definitions.resolve_service_class("app.audit").as_deref(),
            Some("App\\Listener\\Audit")
        );
        assert_eq!(
            definitions.resolve_service_class("App\\Listener\\Mailer").as_deref(),
            Some("App\\Listener\\Mailer")
        );
        assert_eq!(definitions.resolve_service_class("unknown"), None);
    }
}
