// Twig cross-file declarations
//
// Twig files are not parsed into a tree. Only the tags that link templates
// together are scanned: `extends`, `include`/`embed` (tag and function),
// `from ... import`, `import ... as`, plus `block` definitions.

use super::{TemplateEdgeIndex, TemplateEdgeKind, TemplateFileMap};
use crate::error::{Result, SymfactError};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());
static EXTENDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%-?\s*extends\s+(.+?)\s*-?%\}").unwrap());
static INCLUDE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|embed)\s+(\[[^\]]*\]|'[^']+'|"[^"]+")"#).unwrap()
});
static INCLUDE_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{-?\s*include\s*\(\s*(\[[^\]]*\]|'[^']+'|"[^"]+")"#).unwrap()
});
static FROM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*from\s+['"]([^'"]+)['"]\s+import\b"#).unwrap()
});
static IMPORT_AS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*import\s+['"]([^'"]+)['"]\s+as\b"#).unwrap()
});
static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*block\s+(\w+)").unwrap());

/// A `{% block name %}` definition
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TemplateBlock {
    pub name: String,
    /// 1-based line of the tag
    pub line: usize,
}

/// Blocks defined by a template
pub trait TemplateBlockIndex {
    fn blocks(&self, file: &Path) -> Vec<TemplateBlock>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ScannedTemplate {
    edges: Vec<(TemplateEdgeKind, String)>,
    blocks: Vec<TemplateBlock>,
}

fn scan(content: &str) -> ScannedTemplate {
    let mut scanned = ScannedTemplate::default();
    let mut push_quoted = |kind: TemplateEdgeKind, text: &str| {
        for name in QUOTED_RE.captures_iter(text).filter_map(|c| c.get(1)) {
            scanned.edges.push((kind, name.as_str().to_string()));
        }
    };

    for captures in EXTENDS_RE.captures_iter(content) {
        if let Some(target) = captures.get(1) {
            push_quoted(TemplateEdgeKind::Extends, target.as_str());
        }
    }
    for regex in [&*INCLUDE_TAG_RE, &*INCLUDE_FUNCTION_RE] {
        for captures in regex.captures_iter(content) {
            if let Some(target) = captures.get(1) {
                push_quoted(TemplateEdgeKind::Include, target.as_str());
            }
        }
    }
    for regex in [&*FROM_IMPORT_RE, &*IMPORT_AS_RE] {
        for captures in regex.captures_iter(content) {
            if let Some(target) = captures.get(1) {
                scanned
                    .edges
                    .push((TemplateEdgeKind::MacroImport, target.as_str().to_string()));
            }
        }
    }

    for captures in BLOCK_RE.captures_iter(content) {
        let (Some(tag), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        scanned.blocks.push(TemplateBlock {
            name: name.as_str().to_string(),
            line: content[..tag.start()].matches('\n').count() + 1,
        });
    }
    scanned
}

/// Reverse edge index over scanned templates: (kind, target name) -> files
#[derive(Debug, Clone, Default)]
pub struct TwigTemplateIndex {
    templates: HashMap<PathBuf, ScannedTemplate>,
    referencing: BTreeMap<(TemplateEdgeKind, String), BTreeSet<PathBuf>>,
}

impl TwigTemplateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) one template from its content
    pub fn index_template(&mut self, file: &Path, content: &str) {
        self.remove_template(file);

        let scanned = scan(content);
        for (kind, name) in &scanned.edges {
            self.referencing
                .entry((*kind, name.clone()))
                .or_default()
                .insert(file.to_path_buf());
        }
        debug!(
            "Indexed {} ({} edges, {} blocks)",
            file.display(),
            scanned.edges.len(),
            scanned.blocks.len()
        );
        self.templates.insert(file.to_path_buf(), scanned);
    }

    pub fn remove_template(&mut self, file: &Path) {
        if let Some(previous) = self.templates.remove(file) {
            for (kind, name) in previous.edges {
                if let Some(files) = self.referencing.get_mut(&(kind, name)) {
                    files.remove(file);
                }
            }
        }
    }

    pub fn index_file(&mut self, file: &Path) -> Result<()> {
        let content = fs::read_to_string(file).map_err(|e| SymfactError::io(file, e))?;
        self.index_template(file, &content);
        Ok(())
    }

    /// Index every file registered in the name map
    pub fn from_file_map(files: &TemplateFileMap) -> Self {
        let mut index = Self::new();
        for file in files.all_files() {
            if let Err(e) = index.index_file(&file) {
                warn!("Skipping template {}: {}", file.display(), e);
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateEdgeIndex for TwigTemplateIndex {
    fn files_referencing(&self, kind: TemplateEdgeKind, name: &str) -> Vec<PathBuf> {
        self.referencing
            .get(&(kind, name.to_string()))
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl TemplateBlockIndex for TwigTemplateIndex {
    fn blocks(&self, file: &Path) -> Vec<TemplateBlock> {
        self.templates
            .get(file)
            .map(|t| t.blocks.clone())
            .unwrap_or_default()
    }
}
