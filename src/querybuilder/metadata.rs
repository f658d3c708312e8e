//! Entity metadata consumed by the replayer.
//!
//! Mapping information (field types, association targets) comes from outside
//! the PHP sources. `EntityCatalog` reads it from a JSON document:
//!
//! ```json
//! {
//!   "entities": {
//!     "App\\Entity\\Order": {
//!       "id": { "type_name": "integer" },
//!       "customer": {
//!         "type_name": "App\\Entity\\Customer",
//!         "relation_target": "App\\Entity\\Customer",
//!         "relation_kind": "ManyToOne"
//!       }
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

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<String>,
    /// `OneToMany`, `ManyToOne`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_kind: Option<String>,
}

impl FieldInfo {
    pub fn of_type(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ..Self::default()
        }
    }

    pub fn relation(target: &str, kind: &str) -> Self {
        Self {
            type_name: target.to_string(),
            relation_target: Some(target.to_string()),
            relation_kind: Some(kind.to_string()),
        }
    }
}

pub trait EntityMetadata {
    /// Mapped fields of an entity by field name; empty when unknown
    fn fields(&self, entity: &str) -> BTreeMap<String, FieldInfo>;

    fn field(&self, entity: &str, name: &str) -> Option<FieldInfo> {
        self.fields(entity).remove(name)
    }
}

/// Metadata source that knows no entity
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntityMetadata;

impl EntityMetadata for NoEntityMetadata {
    fn fields(&self, _entity: &str) -> BTreeMap<String, FieldInfo> {
        BTreeMap::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCatalog {
    #[serde(default)]
    pub entities: BTreeMap<String, BTreeMap<String, FieldInfo>>,
}

impl EntityCatalog {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut catalog: Self = serde_json::from_str(content)?;
        // entity names are looked up without the leading separator
        catalog.entities = std::mem::take(&mut catalog.entities)
            .into_iter()
            .map(|(name, fields)| (name.trim_start_matches('\\').to_string(), fields))
            .collect();
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SymfactError::io(path, e))?;
        let catalog = Self::from_json_str(&content)?;
        debug!("Loaded metadata for {} entities from {}", catalog.entities.len(), path.display());
        Ok(catalog)
    }

    pub fn insert_field(&mut self, entity: &str, name: &str, field: FieldInfo) {
        self.entities
            .entry(entity.trim_start_matches('\\').to_string())
            .or_default()
            .insert(name.to_string(), field);
    }
}

impl EntityMetadata for EntityCatalog {
    fn fields(&self, entity: &str) -> BTreeMap<String, FieldInfo> {
        self.entities
            .get(entity.trim_start_matches('\\'))
            .cloned()
            .unwrap_or_default()
    }

    fn field(&self, entity: &str, name: &str) -> Option<FieldInfo> {
        self.entities
            .get(entity.trim_start_matches('\\'))?
            .get(name)
            .cloned()
    }
}
