//! Stageforge CLI
//!
//! Command-line frontend for the stage exporter: loads a JSON stage
//! description, runs the binary exporter, and writes the buffer to disk.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use stageforge_export::{export, FormatVersion, ProgressCallback};
use stageforge_scene::{NodeKind, SceneNode, StageDescription};

/// Stageforge - stage scene graph to runtime binary stage exporter
#[derive(Parser)]
#[command(name = "stageforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a stage description to a binary stage file
    Export(ExportArgs),

    /// Summarize a stage description without exporting
    Info(InfoArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Path to the JSON stage description
    #[arg(short, long)]
    stage: PathBuf,

    /// Output path for the uncompressed binary stage
    #[arg(short, long)]
    output: PathBuf,

    /// Target format generation (1/2/deluxe)
    #[arg(short, long)]
    game_version: Option<String>,
}

#[derive(Args)]
struct InfoArgs {
    /// Path to the JSON stage description
    #[arg(short, long)]
    stage: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,stageforge={0},stageforge_export={0},stageforge_scene={0}",
            default_level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Export(args) => run_export(args),
        Commands::Info(args) => run_info(args),
    }
}

fn load_description(path: &PathBuf) -> Result<StageDescription> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading stage description {}", path.display()))?;
    let mut description: StageDescription = serde_json::from_str(&text)
        .with_context(|| format!("parsing stage description {}", path.display()))?;
    description.normalize();
    Ok(description)
}

fn run_export(args: ExportArgs) -> Result<()> {
    let version = match &args.game_version {
        Some(raw) => raw
            .parse::<FormatVersion>()
            .with_context(|| format!("invalid game version {raw:?}"))?,
        None => {
            warn!("no game version specified, defaulting to generation 2");
            FormatVersion::Two
        }
    };

    info!(stage = %args.stage.display(), "loading stage description");
    let description = load_description(&args.stage)?;

    let progress: ProgressCallback = Box::new(|done, total| {
        info!("{done} / {total} item groups partitioned");
    });

    info!(%version, "exporting stage");
    let buffer = export(
        &description.stage,
        &description.models,
        version,
        Some(&progress),
    )
    .context("exporting stage")?;

    fs::write(&args.output, &buffer)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        bytes = buffer.len(),
        "stage written"
    );
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let description = load_description(&args.stage)?;
    let stage = &description.stage;

    let mut counts = std::collections::BTreeMap::new();
    stage.root.visit(&mut |node: &SceneNode| {
        *counts.entry(node.kind.label()).or_insert(0usize) += 1;
    });

    println!("stage: {}", args.stage.display());
    println!("fallout plane: {}", stage.fallout_y);
    println!("collision groups: {}", stage.collision_groups().len());
    println!("models: {}", description.models.len());
    println!("nodes:");
    for (label, count) in counts {
        println!("  {label}: {count}");
    }

    let animated = stage
        .collision_groups()
        .iter()
        .filter(|(_, data)| data.animation.is_some())
        .count();
    if animated > 0 {
        println!("animated groups: {animated}");
    }

    match stage.start_node() {
        Some(node) => println!("start node: {}", node.name),
        None => println!("start node: MISSING (export will fail)"),
    }

    // Every kind that matters gets mentioned so misplaced nodes are visible
    let mut misplaced = Vec::new();
    for child in &stage.root.children {
        match &child.kind {
            NodeKind::Group(_)
            | NodeKind::BackgroundGroup
            | NodeKind::Start
            | NodeKind::Empty => {}
            NodeKind::Mesh(_)
            | NodeKind::MeshCollision { .. }
            | NodeKind::Goal { .. }
            | NodeKind::Bumper
            | NodeKind::Jamabar
            | NodeKind::Banana { .. }
            | NodeKind::Wormhole { .. } => misplaced.push(child),
        }
    }
    for node in misplaced {
        println!(
            "warning: {} {:?} sits at the root and will not be exported",
            node.kind.label(),
            node.name
        );
    }

    Ok(())
}
