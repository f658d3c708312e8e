// src/workspace/mod.rs
//! PHP workspace: every parsed source of a project plus the class, constant
//! and annotation indexes built from them.
//!
//! The workspace is the in-memory implementation of [`PhpIndex`]. Loading walks
//! the project directory and parses files in parallel (one tree-sitter parser
//! per rayon worker); the indexes are rebuilt whenever a source is replaced.

use crate::config::SymfactConfig;
use crate::error::{Result, SymfactError};
use crate::events::EventAnnotationTable;
use crate::extractors::base::{PhpNodeKind, PhpSource, new_php_parser};
use crate::extractors::php::constants::{ConstantTable, StringConstantResolver};
use crate::extractors::php::{ClassHandle, ClassKind, DeclaredClass, PhpIndex, declared_classes};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tree_sitter::Node;
use walkdir::WalkDir;

pub const PHP_EXTENSION: &str = "php";

#[derive(Debug, Clone)]
struct ClassEntry {
    declared: DeclaredClass,
    source: usize,
}

#[derive(Debug, Default)]
pub struct PhpWorkspace {
    sources: Vec<PhpSource>,
    classes: Vec<ClassEntry>,
    /// lowercased FQN -> indexes into `classes`
    by_fqn: HashMap<String, Vec<usize>>,
    constants: ConstantTable,
    annotations: EventAnnotationTable,
    test_namespace_markers: Vec<String>,
}

/// Files with `extension` under `root`, skipping excluded directory names
pub fn collect_files(root: &Path, extension: &str, exclude_dirs: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !exclude_dirs
                    .iter()
                    .any(|excluded| entry.file_name().to_string_lossy() == excluded.as_str())
        })
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == extension))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

impl PhpWorkspace {
    pub fn new(test_namespace_markers: Vec<String>) -> Self {
        Self {
            test_namespace_markers,
            ..Self::default()
        }
    }

    pub fn from_sources(sources: Vec<PhpSource>, test_namespace_markers: Vec<String>) -> Self {
        let mut workspace = Self::new(test_namespace_markers);
        workspace.sources = sources;
        workspace.rebuild_indexes();
        workspace
    }

    /// Parse every PHP file below `root`
    pub fn load(root: &Path, config: &SymfactConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(SymfactError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "project root is not a directory"),
            ));
        }
        // fail early on a broken grammar instead of once per file
        new_php_parser()?;

        let files = collect_files(root, PHP_EXTENSION, &config.workspace.exclude_dirs);
        debug!("Found {} PHP files under {}", files.len(), root.display());

        let sources: Vec<PhpSource> = files
            .par_iter()
            .map_init(
                || new_php_parser().ok(),
                |parser, path| {
                    let parser = parser.as_mut()?;
                    let content = match fs::read_to_string(path) {
                        Ok(content) => content,
                        Err(e) => {
                            warn!("Skipping {}: {}", path.display(), e);
                            return None;
                        }
                    };
                    match PhpSource::parse_with(parser, path.clone(), content) {
                        Ok(source) => Some(source),
                        Err(e) => {
                            warn!("Skipping {}: {}", path.display(), e);
                            None
                        }
                    }
                },
            )
            .flatten()
            .collect();

        let workspace = Self::from_sources(sources, config.events.test_namespace_markers.clone());
        info!(
            "Loaded {} PHP files ({} classes, {} constants) from {}",
            workspace.sources.len(),
            workspace.classes.len(),
            workspace.constants.len(),
            root.display()
        );
        Ok(workspace)
    }

    /// Add a source or replace the one with the same path
    pub fn upsert_source(&mut self, source: PhpSource) {
        match self.sources.iter().position(|s| s.path() == source.path()) {
            Some(existing) => self.sources[existing] = source,
            None => self.sources.push(source),
        }
        self.rebuild_indexes();
    }

    pub fn remove_source(&mut self, path: &Path) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.path() != path);
        let removed = self.sources.len() != before;
        if removed {
            self.rebuild_indexes();
        }
        removed
    }

    fn rebuild_indexes(&mut self) {
        self.classes.clear();
        self.by_fqn.clear();
        self.constants = ConstantTable::new();
        self.annotations = EventAnnotationTable::new();

        for (index, source) in self.sources.iter().enumerate() {
            for declared in declared_classes(source) {
                self.by_fqn
                    .entry(declared.fqn.to_ascii_lowercase())
                    .or_default()
                    .push(self.classes.len());
                self.classes.push(ClassEntry {
                    declared,
                    source: index,
                });
            }
            self.constants.index_source(source);
            self.annotations.index_source(source);
        }
    }

    pub fn sources(&self) -> &[PhpSource] {
        &self.sources
    }

    pub fn source(&self, path: &Path) -> Option<&PhpSource> {
        self.sources.iter().find(|s| s.path() == path)
    }

    pub fn constant_table(&self) -> &ConstantTable {
        &self.constants
    }

    pub fn annotations(&self) -> &EventAnnotationTable {
        &self.annotations
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn entries(&self, fqn: &str) -> impl Iterator<Item = &ClassEntry> {
        self.by_fqn
            .get(&fqn.trim_start_matches('\\').to_ascii_lowercase())
            .into_iter()
            .flatten()
            .map(|&i| &self.classes[i])
    }

    fn handle(&self, entry: &ClassEntry) -> Option<ClassHandle<'_>> {
        let source = &self.sources[entry.source];
        let node = class_node(source, entry)?;
        Some(ClassHandle {
            source,
            node,
            fqn: entry.declared.fqn.clone(),
        })
    }

    /// Whether `entry` reaches `target` through `extends`/`implements`
    fn is_subtype_of(&self, entry: &ClassEntry, target: &str, visited: &mut HashSet<String>) -> bool {
        let supertypes = entry.declared.parents.iter().chain(&entry.declared.interfaces);
        for supertype in supertypes {
            if supertype.eq_ignore_ascii_case(target) {
                return true;
            }
            if !visited.insert(supertype.to_ascii_lowercase()) {
                continue;
            }
            let parents: Vec<&ClassEntry> = self.entries(supertype).collect();
            if parents.iter().any(|p| self.is_subtype_of(p, target, visited)) {
                return true;
            }
        }
        false
    }

    fn ancestors_match(&self, entry: &ClassEntry, predicate: &dyn Fn(&str) -> bool) -> bool {
        let mut pending: Vec<&str> = entry.declared.parents.iter().map(String::as_str).collect();
        let mut visited = HashSet::new();
        while let Some(parent) = pending.pop() {
            if !visited.insert(parent.to_ascii_lowercase()) {
                continue;
            }
            if predicate(parent) {
                return true;
            }
            for next in self.entries(parent) {
                pending.extend(next.declared.parents.iter().map(String::as_str));
            }
        }
        false
    }
}

/// Re-locate a declaration node from its recorded byte range
fn class_node<'a>(source: &'a PhpSource, entry: &ClassEntry) -> Option<Node<'a>> {
    let range = &entry.declared.byte_range;
    let mut node = source.root().descendant_for_byte_range(range.start, range.end)?;
    loop {
        if PhpNodeKind::of(&node) == PhpNodeKind::ClassLike && node.byte_range() == *range {
            return Some(node);
        }
        node = node.parent()?;
    }
}

impl PhpIndex for PhpWorkspace {
    fn subscriber_implementors(&self, contract: &str) -> Vec<ClassHandle<'_>> {
        let contract = contract.trim_start_matches('\\');
        self.classes
            .iter()
            .filter(|entry| entry.declared.kind == ClassKind::Class)
            .filter(|entry| self.is_subtype_of(entry, contract, &mut HashSet::new()))
            .filter_map(|entry| self.handle(entry))
            .collect()
    }

    fn is_test_class(&self, class: &ClassHandle<'_>) -> bool {
        let qualified = format!("\\{}", class.fqn);
        if self
            .test_namespace_markers
            .iter()
            .any(|marker| qualified.contains(marker.as_str()))
        {
            return true;
        }

        if !class.short_name().ends_with("Test") {
            return false;
        }
        self.entries(&class.fqn)
            .filter(|entry| {
                entry.declared.byte_range.start == class.offset()
                    && self.sources[entry.source].path() == class.source.path()
            })
            .any(|entry| self.ancestors_match(entry, &|parent| parent.ends_with("TestCase")))
    }

    fn find_classes(&self, fqn: &str) -> Vec<ClassHandle<'_>> {
        self.entries(fqn).filter_map(|entry| self.handle(entry)).collect()
    }

    fn constants(&self) -> &dyn StringConstantResolver {
        &self.constants
    }
}
