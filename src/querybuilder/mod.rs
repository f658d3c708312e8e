//! Doctrine query builder state.
//!
//! [`collect_builder_state`] resolves the fluent chain a call belongs to (see
//! [`chain`]) and replays it into a [`BuilderState`]: the aliases in play, the
//! relations reachable from each alias, selected expressions and bound
//! parameters. The candidate views flatten that state for completion-like
//! consumers.

pub mod chain;
pub mod metadata;
pub mod replay;
pub mod scope;

use crate::config::QueryBuilderConfig;
use crate::extractors::base::{PhpNodeKind, PhpSource, enclosing};
use crate::extractors::php::namespaces::NameSections;
use chain::resolve_chain;
use metadata::{EntityMetadata, FieldInfo};
use replay::Replayer;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub field_name: String,
    pub target_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyAlias {
    /// Alias the entry belongs to (`o` for both `o` and `o.customer`)
    pub alias: String,
    pub field_name: Option<String>,
    pub field: Option<FieldInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuilderState {
    pub parameters: BTreeSet<String>,
    /// Owning alias -> relations in declaration order. Each relation is listed
    /// once per alias: joining the same path again, or joining a relation the
    /// entity metadata already contributed, does not add a second entry.
    pub relations: BTreeMap<String, Vec<Relation>>,
    /// `alias` and `alias.field` entries; later declarations overwrite
    pub property_aliases: BTreeMap<String, PropertyAlias>,
    pub selects: BTreeSet<String>,
    /// Alias -> entity it stands for
    pub roots: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinCandidate {
    /// `alias.field`
    pub path: String,
    pub target_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyCandidate {
    pub name: String,
    pub type_name: Option<String>,
    pub relation_kind: Option<String>,
    pub relation_target: Option<String>,
    /// The owning alias is selected
    pub selected: bool,
}

impl BuilderState {
    /// Append unless an equal relation is already recorded for `alias`
    pub fn add_relation(&mut self, alias: &str, relation: Relation) {
        let relations = self.relations.entry(alias.to_string()).or_default();
        if !relations.contains(&relation) {
            relations.push(relation);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
            && self.relations.is_empty()
            && self.property_aliases.is_empty()
            && self.selects.is_empty()
    }

    pub fn parameter_candidates(&self) -> Vec<String> {
        self.parameters.iter().cloned().collect()
    }

    pub fn join_candidates(&self) -> Vec<JoinCandidate> {
        self.relations
            .iter()
            .flat_map(|(alias, relations)| {
                relations.iter().map(move |relation| JoinCandidate {
                    path: format!("{}.{}", alias, relation.field_name),
                    target_entity: relation.target_entity.clone(),
                })
            })
            .collect()
    }

    pub fn property_candidates(&self) -> Vec<PropertyCandidate> {
        self.property_aliases
            .iter()
            .map(|(name, property)| {
                let field = property.field.as_ref();
                PropertyCandidate {
                    name: name.clone(),
                    type_name: field.map(|f| f.type_name.clone()),
                    relation_kind: field.and_then(|f| f.relation_kind.clone()),
                    relation_target: field.and_then(|f| f.relation_target.clone()),
                    selected: self.selects.contains(&property.alias),
                }
            })
            .collect()
    }
}

/// Replay the builder chain `start` belongs to
pub fn collect_builder_state(
    source: &PhpSource,
    start: Node<'_>,
    metadata: &dyn EntityMetadata,
    config: &QueryBuilderConfig,
) -> BuilderState {
    let names = NameSections::build(source).at(start.start_byte());
    let current_class = enclosing(start, |n| PhpNodeKind::of(n) == PhpNodeKind::ClassLike)
        .and_then(|class| class.child_by_field_name("name"))
        .map(|name| names.qualify(source.text(&name)));

    let calls = resolve_chain(source, start);
    debug!(
        "Replaying {} builder calls from line {}",
        calls.len(),
        start.start_position().row + 1
    );
    Replayer::new(source, metadata, config, names, current_class).replay(calls)
}

/// Builder state for the call at a 1-based line and 0-based column
pub fn builder_state_at(
    source: &PhpSource,
    line: usize,
    column: usize,
    metadata: &dyn EntityMetadata,
    config: &QueryBuilderConfig,
) -> Option<BuilderState> {
    let node = source.node_at(line, column)?;
    let call = enclosing(node, |n| PhpNodeKind::of(n).is_method_call())?;
    Some(collect_builder_state(source, call, metadata, config))
}
