//! Template relation graph.
//!
//! A template is addressed by logical names (`base.html.twig`,
//! `@Admin/layout.html.twig`); one file can be registered under several names
//! and one name can resolve to several files (overrides). Edges come from an
//! index that answers "which files reference this name" for one edge kind, so
//! the direction of a traversal is decided by the index queried: walking
//! `Extends` from a layout yields the templates built on top of it.

pub mod twig;

use crate::config::TemplateConfig;
use crate::workspace::collect_files;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use twig::{TemplateBlock, TemplateBlockIndex};

pub use twig::TwigTemplateIndex;

pub const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateEdgeKind {
    Extends,
    Include,
    MacroImport,
}

/// Cross-file edge lookup: files that reference `name` through `kind`
pub trait TemplateEdgeIndex {
    fn files_referencing(&self, kind: TemplateEdgeKind, name: &str) -> Vec<PathBuf>;
}

/// Logical template name -> files, with the reverse lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFileMap {
    by_name: BTreeMap<String, Vec<PathBuf>>,
    by_file: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl TemplateFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, file: &Path) {
        let files = self.by_name.entry(name.to_string()).or_default();
        if !files.iter().any(|f| f == file) {
            files.push(file.to_path_buf());
        }
        self.by_file
            .entry(file.to_path_buf())
            .or_default()
            .insert(name.to_string());
    }

    /// Files registered under `name`; the first one is the primary file
    pub fn files(&self, name: &str) -> &[PathBuf] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names_for(&self, file: &Path) -> Vec<String> {
        self.by_file
            .get(file)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all_files(&self) -> Vec<PathBuf> {
        self.by_file.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Register every template below the configured roots. Names are the
    /// path relative to the root with `/` separators, prefixed `@Namespace/`
    /// for namespaced roots.
    pub fn from_roots(project_root: &Path, config: &TemplateConfig) -> Self {
        let mut map = Self::new();
        for root in &config.roots {
            let directory = project_root.join(&root.path);
            if !directory.is_dir() {
                debug!("Template root {} does not exist", directory.display());
                continue;
            }
            for extension in &config.extensions {
                for file in collect_files(&directory, extension, &[]) {
                    let Ok(relative) = file.strip_prefix(&directory) else {
                        continue;
                    };
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    let name = match &root.namespace {
                        Some(namespace) => {
                            format!("@{}/{}", namespace.trim_start_matches('@'), relative)
                        }
                        None => relative,
                    };
                    map.insert(&name, &file);
                }
            }
        }
        debug!("Registered {} template names", map.len());
        map
    }
}

fn walk_related(
    file: &Path,
    files: &TemplateFileMap,
    edges: &dyn TemplateEdgeIndex,
    kind: TemplateEdgeKind,
    depth: usize,
    remaining: &mut HashMap<PathBuf, usize>,
    related: &mut Vec<PathBuf>,
) {
    if depth == 0 {
        return;
    }
    let next_depth = depth - 1;
    for name in files.names_for(file) {
        for next in edges.files_referencing(kind, &name) {
            match remaining.get(&next) {
                // already expanded with at least as much depth left
                Some(&seen) if seen >= next_depth => continue,
                Some(_) => {}
                None => related.push(next.clone()),
            }
            remaining.insert(next.clone(), next_depth);
            walk_related(&next, files, edges, kind, next_depth, remaining, related);
        }
    }
}

/// Files related to `start` through `kind` edges, at most `max_depth` hops
/// away. Each file appears once and `start` itself is never included.
///
/// A file reached again over a shorter path is expanded again, so the result
/// does not depend on the order edges are returned in.
pub fn collect_related_templates(
    start: &Path,
    files: &TemplateFileMap,
    edges: &dyn TemplateEdgeIndex,
    kind: TemplateEdgeKind,
    max_depth: usize,
) -> Vec<PathBuf> {
    let mut remaining = HashMap::from([(start.to_path_buf(), max_depth)]);
    let mut related = Vec::new();
    walk_related(start, files, edges, kind, max_depth, &mut remaining, &mut related);
    related
}

/// A block definition in a related template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockTarget {
    pub file: PathBuf,
    pub block: TemplateBlock,
}

type FileMapLoader<'a> = Box<dyn Fn() -> TemplateFileMap + Send + Sync + 'a>;

/// Template queries sharing a lazily built name -> file map.
///
/// The map is computed on first use and kept until [`TemplateWalker::reset`].
pub struct TemplateWalker<'a> {
    edges: &'a dyn TemplateEdgeIndex,
    loader: FileMapLoader<'a>,
    file_map: RwLock<Option<Arc<TemplateFileMap>>>,
    max_depth: usize,
}

impl<'a> TemplateWalker<'a> {
    pub fn new(
        edges: &'a dyn TemplateEdgeIndex,
        loader: impl Fn() -> TemplateFileMap + Send + Sync + 'a,
        max_depth: usize,
    ) -> Self {
        Self {
            edges,
            loader: Box::new(loader),
            file_map: RwLock::new(None),
            max_depth,
        }
    }

    pub fn file_map(&self) -> Arc<TemplateFileMap> {
        if let Some(map) = self
            .file_map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(map);
        }

        let mut slot = self.file_map.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert_with(|| Arc::new((self.loader)())))
    }

    /// Drop the memoized name map; the next query rebuilds it
    pub fn reset(&self) {
        *self.file_map.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn related(&self, start: &Path, kind: TemplateEdgeKind) -> Vec<PathBuf> {
        self.related_within(start, kind, self.max_depth)
    }

    pub fn related_within(&self, start: &Path, kind: TemplateEdgeKind, max_depth: usize) -> Vec<PathBuf> {
        let files = self.file_map();
        collect_related_templates(start, &files, self.edges, kind, max_depth)
    }

    /// Other files registered under one of `start`'s names
    pub fn collect_template_overwrites(&self, start: &Path) -> Vec<PathBuf> {
        let files = self.file_map();
        let mut overwrites: Vec<PathBuf> = Vec::new();
        for name in files.names_for(start) {
            for file in files.files(&name) {
                if file != start && !overwrites.contains(file) {
                    overwrites.push(file.clone());
                }
            }
        }
        overwrites
    }

    /// Definitions of `block` in templates extending `start`, transitively
    pub fn collect_block_implementations(
        &self,
        start: &Path,
        block: &str,
        blocks: &dyn TemplateBlockIndex,
    ) -> Vec<BlockTarget> {
        self.related(start, TemplateEdgeKind::Extends)
            .into_iter()
            .flat_map(|file| {
                blocks
                    .blocks(&file)
                    .into_iter()
                    .filter(|b| b.name == block)
                    .map(move |b| BlockTarget {
                        file: file.clone(),
                        block: b,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
