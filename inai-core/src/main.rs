use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use inai_core::{
    init_logging, EditorSession, FileNode, GenerationClient, GenerationRequest, HostConfig,
    IngestEnd, IngestOutcome, IngestionAdapter, NodeKind, ProjectHandle, ProjectStore,
    RequestTracker,
};
use inai_preview::{HeadlessSurface, RenderScheduler};
use tracing::info;

/// Replay chunk size, small enough to split lines the way a network would.
const REPLAY_CHUNK: usize = 512;

#[derive(Parser)]
#[command(name = "inai")]
#[command(version, about = "Live preview host for generated pages", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "INAI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded generation stream into a fresh project and print the tree
    Ingest {
        /// File of `data: `-prefixed event lines
        stream: PathBuf,
    },

    /// Replay a stream and write the rendered preview document
    Preview {
        stream: PathBuf,

        /// Where to write the assembled document
        #[arg(short, long)]
        out: PathBuf,

        /// Also write index.html, styles.css and script.js into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Call the generation service and ingest its answer
    Generate {
        #[arg(short, long)]
        prompt: String,

        /// Where to write the assembled document
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HostConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
        config.validate()?;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Ingest { stream } => {
            let (project, outcome) = replay(&config, &stream).await?;
            print_outcome(&outcome);
            print_tree(&project);
        }
        Commands::Preview {
            stream,
            out,
            export,
        } => {
            let (project, outcome) = replay(&config, &stream).await?;
            print_outcome(&outcome);
            write_preview(&config, project, &out, export.as_deref()).await?;
        }
        Commands::Generate { prompt, out } => {
            let project = ProjectHandle::new(ProjectStore::new(config.store.max_depth));
            let adapter = IngestionAdapter::new(project.clone(), RequestTracker::new())
                .with_line_prefix(config.generation.line_prefix.clone());
            let client = GenerationClient::new(&config.generation)?;
            let request = adapter.tracker().begin();
            let body = client
                .stream(&GenerationRequest::new(prompt))
                .await
                .with_context(|| format!("Generation request to {} failed", client.endpoint()))?;
            let outcome = adapter.ingest(request, body).await?;
            print_outcome(&outcome);
            print_tree(&project);
            if let Some(out) = out {
                write_preview(&config, project, &out, None).await?;
            }
        }
    }
    Ok(())
}

async fn replay(config: &HostConfig, path: &Path) -> Result<(ProjectHandle, IngestOutcome)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let chunks: Vec<std::io::Result<Vec<u8>>> =
        bytes.chunks(REPLAY_CHUNK).map(|c| Ok(c.to_vec())).collect();

    let project = ProjectHandle::new(ProjectStore::new(config.store.max_depth));
    let adapter = IngestionAdapter::new(project.clone(), RequestTracker::new())
        .with_line_prefix(config.generation.line_prefix.clone());
    let request = adapter.tracker().begin();
    let outcome = adapter
        .ingest(request, tokio_stream::iter(chunks))
        .await
        .with_context(|| format!("Replaying {} failed", path.display()))?;
    Ok((project, outcome))
}

/// Renders the current page through a headless surface and writes what it loaded.
async fn write_preview(
    config: &HostConfig,
    project: ProjectHandle,
    out: &Path,
    export: Option<&Path>,
) -> Result<()> {
    let (surface, _outbox) = HeadlessSurface::new();
    let scheduler = RenderScheduler::spawn(surface.clone(), config.render.debounce());
    let mut session = EditorSession::new(project, scheduler, RequestTracker::new(), config);
    session.refresh()?;
    session.flush().await?;

    if surface.load_count() == 0 {
        bail!("The project has no HTML page to preview");
    }
    tokio::fs::write(out, surface.source())
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!(
        "✓ preview of {} written to {}",
        session.page_path().unwrap_or_default(),
        out.display()
    );

    if let Some(dir) = export {
        let bundle = session.export().context("Nothing to export")?;
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        bundle.write_to(dir)?;
        println!("✓ exported to {}", dir.display());
    }
    session.shutdown().await;
    Ok(())
}

fn print_outcome(outcome: &IngestOutcome) {
    match outcome.end {
        IngestEnd::Complete => info!(files = outcome.written.len(), "stream complete"),
        IngestEnd::Incomplete => eprintln!("! stream ended without a completion event"),
        IngestEnd::Superseded => eprintln!("! stream was superseded"),
    }
    if outcome.skipped > 0 {
        eprintln!("! {} malformed entries skipped", outcome.skipped);
    }
}

fn print_tree(project: &ProjectHandle) {
    let state = project.snapshot();
    for child in state.root.children() {
        print_node(child, state.active_file_id, 0);
    }
}

fn print_node(node: &FileNode, active: Option<uuid::Uuid>, depth: usize) {
    let indent = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Folder { children, .. } => {
            println!("{}{}/", indent, node.name);
            for child in children {
                print_node(child, active, depth + 1);
            }
        }
        NodeKind::File { content, language } => {
            let marker = if active == Some(node.id) { "*" } else { " " };
            println!(
                "{}{}{} ({}, {} bytes)",
                indent,
                marker,
                node.name,
                language,
                content.len()
            );
        }
    }
}
