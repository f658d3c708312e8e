// Builder state replay
//
// Calls are applied in source order of their method names. Every handler is
// tolerant: arguments that are not literals are ignored and unknown methods
// are skipped, so replaying never fails.

use super::chain::MethodCall;
use super::metadata::{EntityMetadata, FieldInfo};
use super::{BuilderState, PropertyAlias, Relation};
use crate::config::QueryBuilderConfig;
use crate::extractors::base::{
    PhpNodeKind, PhpSource, array_elements, array_entry, descendants_of_kind,
    string_literal_value,
};
use crate::extractors::php::class_reference;
use crate::extractors::php::namespaces::NameContext;
use regex::Regex;
use std::sync::LazyLock;
use tree_sitter::Node;

/// `:name` parameter placeholders in DQL fragments (not `::`)
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^:\w]):([A-Za-z_]\w*)").unwrap());

pub struct Replayer<'a> {
    source: &'a PhpSource,
    metadata: &'a dyn EntityMetadata,
    config: &'a QueryBuilderConfig,
    names: NameContext,
    current_class: Option<String>,
    state: BuilderState,
}

fn contains_method(methods: &[String], name: &str) -> bool {
    methods.iter().any(|m| m.eq_ignore_ascii_case(name))
}

impl<'a> Replayer<'a> {
    pub fn new(
        source: &'a PhpSource,
        metadata: &'a dyn EntityMetadata,
        config: &'a QueryBuilderConfig,
        names: NameContext,
        current_class: Option<String>,
    ) -> Self {
        Self {
            source,
            metadata,
            config,
            names,
            current_class,
            state: BuilderState::default(),
        }
    }

    pub fn replay(mut self, mut calls: Vec<MethodCall<'_>>) -> BuilderState {
        calls.sort_by_key(MethodCall::position);
        for call in &calls {
            self.apply(call);
        }
        self.state
    }

    fn apply(&mut self, call: &MethodCall<'_>) {
        let name = call.name.to_ascii_lowercase();
        match name.as_str() {
            "select" | "addselect" => self.select(call),
            "from" | "update" | "delete" => self.from(call),
            "setparameter" => self.set_parameter(call),
            "setparameters" => self.set_parameters(call),
            "createquerybuilder" => self.create_query_builder(call),
            _ if contains_method(&self.config.join_methods, &name) => self.join(call),
            _ if contains_method(&self.config.where_methods, &name) => self.placeholders(call),
            _ => {}
        }
    }

    fn string_argument(&self, call: &MethodCall<'_>, position: usize) -> Option<String> {
        call.arguments
            .get(position)
            .and_then(|arg| string_literal_value(self.source, arg))
            .filter(|value| !value.trim().is_empty())
    }

    /// `'App\Entity\Order'`, `Order::class` or an alias like `'App:Order'`
    fn entity_argument(&self, node: &Node) -> Option<String> {
        if let Some(literal) = string_literal_value(self.source, node) {
            let literal = literal.trim().trim_start_matches('\\');
            return (!literal.is_empty()).then(|| literal.to_string());
        }
        class_reference(self.source, node, &self.names, self.current_class.as_deref())
    }

    fn select(&mut self, call: &MethodCall<'_>) {
        for argument in &call.arguments {
            if let Some(text) = string_literal_value(self.source, argument) {
                self.add_selects(&text);
            } else if PhpNodeKind::of(argument) == PhpNodeKind::ArrayLiteral {
                for element in array_elements(argument) {
                    if let Some(text) = array_entry(&element)
                        .1
                        .and_then(|value| string_literal_value(self.source, &value))
                    {
                        self.add_selects(&text);
                    }
                }
            }
        }
    }

    fn add_selects(&mut self, text: &str) {
        self.state.selects.extend(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }

    fn from(&mut self, call: &MethodCall<'_>) {
        let Some(entity) = call.arguments.first().and_then(|n| self.entity_argument(n)) else {
            return;
        };
        let Some(alias) = self.string_argument(call, 1) else {
            return;
        };
        let field = FieldInfo::of_type(&entity);
        self.register_root(&alias, &entity, None, Some(field));
    }

    /// Make `alias` stand for `entity`: the alias entry is overwritten and the
    /// entity's mapped fields become `alias.field` entries.
    fn register_root(
        &mut self,
        alias: &str,
        entity: &str,
        field_name: Option<String>,
        field: Option<FieldInfo>,
    ) {
        let prefix = format!("{}.", alias);
        self.state
            .property_aliases
            .retain(|key, _| !key.starts_with(&prefix));
        self.state.property_aliases.insert(
            alias.to_string(),
            PropertyAlias {
                alias: alias.to_string(),
                field_name,
                field,
            },
        );
        self.state.roots.insert(alias.to_string(), entity.to_string());

        for (name, info) in self.metadata.fields(entity) {
            if let Some(target) = &info.relation_target {
                self.state.add_relation(
                    alias,
                    Relation {
                        field_name: name.clone(),
                        target_entity: Some(target.clone()),
                    },
                );
            }
            self.state.property_aliases.insert(
                format!("{}.{}", alias, name),
                PropertyAlias {
                    alias: alias.to_string(),
                    field_name: Some(name),
                    field: Some(info),
                },
            );
        }
    }

    fn join(&mut self, call: &MethodCall<'_>) {
        let Some(path_node) = call.arguments.first() else {
            return;
        };
        let Some(alias) = self.string_argument(call, 1) else {
            return;
        };

        let path = string_literal_value(self.source, path_node);
        let Some((owner, field_name)) = path.as_deref().and_then(|p| p.split_once('.')) else {
            // arbitrary join: `->join(Customer::class, 'c', 'WITH', ...)`
            if let Some(entity) = self.entity_argument(path_node) {
                let field = FieldInfo::of_type(&entity);
                self.register_root(&alias, &entity, None, Some(field));
            }
            return;
        };
        let (owner, field_name) = (owner.trim().to_string(), field_name.trim().to_string());

        let field = self
            .state
            .roots
            .get(&owner)
            .and_then(|entity| self.metadata.field(entity, &field_name));
        let target = field.as_ref().and_then(|f| f.relation_target.clone());

        self.state.add_relation(
            &owner,
            Relation {
                field_name: field_name.clone(),
                target_entity: target.clone(),
            },
        );

        match target {
            Some(target) => self.register_root(&alias, &target, Some(field_name), field),
            None => {
                self.state.property_aliases.insert(
                    alias.clone(),
                    PropertyAlias {
                        alias,
                        field_name: Some(field_name),
                        field,
                    },
                );
            }
        }
    }

    fn set_parameter(&mut self, call: &MethodCall<'_>) {
        let Some(argument) = call.arguments.first() else {
            return;
        };
        let name = match string_literal_value(self.source, argument) {
            Some(name) => name,
            // positional `?1` parameters
            None if argument.kind() == "integer" => self.source.text(argument).to_string(),
            None => return,
        };
        self.add_parameter(&name);
    }

    fn set_parameters(&mut self, call: &MethodCall<'_>) {
        let Some(array) = call
            .arguments
            .first()
            .filter(|a| PhpNodeKind::of(a) == PhpNodeKind::ArrayLiteral)
        else {
            return;
        };
        for element in array_elements(array) {
            if let Some(key) = array_entry(&element)
                .0
                .and_then(|key| string_literal_value(self.source, &key))
            {
                self.add_parameter(&key);
            }
        }
    }

    fn add_parameter(&mut self, name: &str) {
        let name = name.trim().trim_start_matches(':');
        if !name.is_empty() {
            self.state.parameters.insert(name.to_string());
        }
    }

    /// Parameters referenced by `where('o.paid = :paid')` and friends,
    /// including nested `expr()` calls
    fn placeholders(&mut self, call: &MethodCall<'_>) {
        let mut found = Vec::new();
        for argument in &call.arguments {
            for string in descendants_of_kind(*argument, PhpNodeKind::StringLiteral) {
                found.extend(
                    PLACEHOLDER_RE
                        .captures_iter(self.source.text(&string))
                        .filter_map(|c| c.get(1))
                        .map(|m| m.as_str().to_string()),
                );
            }
        }
        for name in found {
            self.add_parameter(&name);
        }
    }

    /// `$repository->createQueryBuilder('o')` names the root alias; the entity
    /// is the repository's and not known here
    fn create_query_builder(&mut self, call: &MethodCall<'_>) {
        let Some(alias) = self.string_argument(call, 0) else {
            return;
        };
        self.state
            .property_aliases
            .entry(alias.clone())
            .or_insert(PropertyAlias {
                alias,
                field_name: None,
                field: None,
            });
    }
}
