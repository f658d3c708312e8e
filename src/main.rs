/// symfact: Symfony semantic facts from the command line
///
/// Every command prints JSON on stdout; logs go to stderr (`RUST_LOG`
/// overrides the default `symfact=info`).
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use symfact::config::SymfactConfig;
use symfact::events::ServiceDefinitions;
use symfact::querybuilder::metadata::{EntityCatalog, EntityMetadata, NoEntityMetadata};
use symfact::querybuilder::{JoinCandidate, PropertyCandidate, builder_state_at};
use symfact::templates::{BlockTarget, TemplateEdgeKind};
use symfact::{BuilderState, PhpSource, SymfonyProject};

#[derive(Parser)]
#[command(name = "symfact")]
#[command(about = "Extract event, query builder and template facts from Symfony projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to <DIR>/symfact.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List subscribed events, or the classes handling one event
    Events {
        /// Project root
        dir: PathBuf,

        /// Resolve handler classes for this event name
        #[arg(short, long)]
        event: Option<String>,

        /// Container dump (JSON) with tagged listener services
        #[arg(short, long)]
        services: Option<PathBuf>,
    },

    /// List every known event name with its origin
    EventNames {
        /// Project root
        dir: PathBuf,

        /// Container dump (JSON) with tagged listener services
        #[arg(short, long)]
        services: Option<PathBuf>,
    },

    /// Show the query builder state at a call
    QueryBuilder {
        /// PHP file
        file: PathBuf,

        /// 1-based line of the call
        #[arg(short, long)]
        line: usize,

        /// 0-based column inside the call
        #[arg(short = 'C', long, default_value_t = 0)]
        column: usize,

        /// Entity metadata catalog (JSON)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
    },

    /// Show templates related to a template file
    Templates {
        /// Project root
        dir: PathBuf,

        /// Template file
        file: PathBuf,

        /// Edge kind to follow
        #[arg(short, long, value_enum, default_value = "extends")]
        kind: EdgeKindArg,

        /// Maximum traversal depth (defaults to the configured one)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Find implementations of this block in extending templates
        #[arg(short, long)]
        block: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EdgeKindArg {
    Extends,
    Include,
    MacroImport,
}

impl From<EdgeKindArg> for TemplateEdgeKind {
    fn from(kind: EdgeKindArg) -> Self {
        match kind {
            EdgeKindArg::Extends => TemplateEdgeKind::Extends,
            EdgeKindArg::Include => TemplateEdgeKind::Include,
            EdgeKindArg::MacroImport => TemplateEdgeKind::MacroImport,
        }
    }
}

#[derive(Serialize)]
struct QueryBuilderOutput {
    state: BuilderState,
    parameters: Vec<String>,
    joins: Vec<JoinCandidate>,
    properties: Vec<PropertyCandidate>,
}

#[derive(Serialize)]
struct TemplatesOutput {
    kind: TemplateEdgeKind,
    related: Vec<PathBuf>,
    overwrites: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<BlockTarget>>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("symfact=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false),
        )
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Events {
            dir,
            event,
            services,
        } => {
            let project = load_project(&dir, cli.config.as_deref(), services.as_deref())?;
            match event {
                Some(event) => print_json(&project.event_targets(&event))?,
                None => print_json(&*project.subscribed_events())?,
            }
        }
        Commands::EventNames { dir, services } => {
            let project = load_project(&dir, cli.config.as_deref(), services.as_deref())?;
            print_json(&project.event_names())?;
        }
        Commands::QueryBuilder {
            file,
            line,
            column,
            metadata,
        } => {
            let config = match cli.config.as_deref() {
                Some(path) => SymfactConfig::load(path)?,
                None => SymfactConfig::default(),
            };
            let catalog = metadata
                .as_deref()
                .map(EntityCatalog::load)
                .transpose()
                .context("Failed to load entity metadata")?;
            let metadata: &dyn EntityMetadata = match &catalog {
                Some(catalog) => catalog,
                None => &NoEntityMetadata,
            };

            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let source = PhpSource::parse(&file, content)?;
            let state = builder_state_at(&source, line, column, metadata, &config.query_builder)
                .with_context(|| format!("No method call at {}:{}:{}", file.display(), line, column))?;

            print_json(&QueryBuilderOutput {
                parameters: state.parameter_candidates(),
                joins: state.join_candidates(),
                properties: state.property_candidates(),
                state,
            })?;
        }
        Commands::Templates {
            dir,
            file,
            kind,
            depth,
            block,
        } => {
            let project = load_project(&dir, cli.config.as_deref(), None)?;
            let file = fs::canonicalize(&file)
                .with_context(|| format!("Template {} not found", file.display()))?;
            let walker = project.template_walker();
            let kind = TemplateEdgeKind::from(kind);
            let depth = depth.unwrap_or(project.config().templates.max_depth);

            print_json(&TemplatesOutput {
                kind,
                related: walker.related_within(&file, kind, depth),
                overwrites: walker.collect_template_overwrites(&file),
                blocks: block
                    .map(|block| walker.collect_block_implementations(&file, &block, project.templates())),
            })?;
        }
    }

    Ok(())
}

fn load_project(dir: &Path, config: Option<&Path>, services: Option<&Path>) -> Result<SymfonyProject> {
    let root = fs::canonicalize(dir).with_context(|| format!("Project root {} not found", dir.display()))?;
    let config = match config {
        Some(path) => SymfactConfig::load(path)?,
        None => SymfactConfig::load_from_root(&root)?,
    };
    debug!("Using configuration: {:?}", config);

    let mut project = SymfonyProject::load(&root, config)?;
    if let Some(services) = services {
        let definitions = ServiceDefinitions::load(services).context("Failed to load service definitions")?;
        project = project.with_services(definitions);
    }
    Ok(project)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
