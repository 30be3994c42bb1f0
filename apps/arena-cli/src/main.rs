mod script;

use anyhow::{Context, Result, bail};
use arena_common::PlayerInput;
use arena_kernel::{World, WorldEvent};
use arena_level::LevelDef;
use arena_persist::{INPUT_SCHEMA_VERSION, InputLog, SAVE_SCHEMA_VERSION, SaveStore};
use arena_render::{DebugTextRenderer, RenderView, Renderer};
use arena_tools::ArenaInspector;
use clap::{Parser, Subcommand};
use script::Script;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arena-cli", about = "Headless tools for the arena")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, schema versions and the built-in level
    Info,
    /// Run the simulation without a window
    Simulate {
        /// Ticks to simulate; defaults to the script length, or 600
        #[arg(short, long)]
        ticks: Option<u64>,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Level file; the built-in arena when omitted
        #[arg(long)]
        level: Option<PathBuf>,
        /// Input script (.yaml/.yml/.json)
        #[arg(long)]
        script: Option<PathBuf>,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check a level file for errors
    Validate { level: PathBuf },
    /// Write the built-in arena to a level file
    ExportLevel { path: PathBuf },
    /// Simulate, save, reload and check the reloaded state matches
    ReplayCheck {
        #[arg(short, long, default_value = "600")]
        ticks: u64,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        #[arg(long)]
        level: Option<PathBuf>,
        #[arg(long)]
        script: Option<PathBuf>,
        /// Save directory to use; a temporary one when omitted
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Verify a save directory and show what it holds
    InspectSave { dir: PathBuf },
}

fn load_level(path: Option<&Path>) -> Result<LevelDef> {
    match path {
        Some(path) => {
            LevelDef::load(path).with_context(|| format!("loading level {}", path.display()))
        }
        None => Ok(LevelDef::default_arena()),
    }
}

fn load_inputs(script: Option<&Path>, ticks: Option<u64>) -> Result<Vec<PlayerInput>> {
    let script = match script {
        Some(path) => {
            Script::load(path).with_context(|| format!("loading script {}", path.display()))?
        }
        None => Script::default(),
    };
    let ticks = match ticks {
        Some(ticks) => ticks,
        None => match script.total_ticks()? {
            0 => 600,
            n => n,
        },
    };
    script.expand(ticks)
}

fn print_events(world: &World, events: &[WorldEvent]) {
    for event in events {
        if !matches!(event, WorldEvent::Stepped { .. }) {
            println!("  {}", ArenaInspector::describe_event(world, event));
        }
    }
}

fn simulate(
    ticks: Option<u64>,
    seed: u64,
    level: Option<&Path>,
    script: Option<&Path>,
    json: bool,
) -> Result<()> {
    let level = load_level(level)?;
    let inputs = load_inputs(script, ticks)?;
    let mut world = level.build(seed)?;

    tracing::info!(level = %level.name, seed, ticks = inputs.len(), "simulating");
    for input in &inputs {
        world.step(input);
    }
    let events = world.drain_events();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ArenaInspector::summary(&world))?
        );
        return Ok(());
    }

    print!(
        "{}",
        DebugTextRenderer::new().render(&world, &RenderView::from_world(&world))
    );
    println!("Events:");
    print_events(&world, &events);
    println!("{}", ArenaInspector::summary(&world));
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let level = load_level(Some(path))?;
    level.validate()?;
    println!(
        "{}: OK ({} obstacles, {} NPCs, {} tasks)",
        level.name,
        level.obstacles.len(),
        level.npcs.len(),
        level.tasks.len()
    );
    Ok(())
}

fn replay_check(
    ticks: u64,
    seed: u64,
    level: Option<&Path>,
    script: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<()> {
    let level = load_level(level)?;
    let inputs = load_inputs(script, Some(ticks))?;
    let initial = level.build(seed)?;

    let scratch;
    let dir = match data_dir {
        Some(dir) => dir,
        None => {
            scratch = tempfile::tempdir()?;
            scratch.path()
        }
    };
    let mut store = SaveStore::open(dir)?;

    // Snapshot halfway, then record the rest as input.
    let half = inputs.len() / 2;
    let mut live = initial.clone();
    for input in &inputs[..half] {
        live.step(input);
    }
    store.take_snapshot(&live)?;

    let mut log = InputLog::new();
    for input in &inputs[half..] {
        live.step(input);
        log.push(live.tick(), *input)?;
    }
    store.append_inputs(log.frames())?;
    store.verify_integrity()?;

    let reopened = SaveStore::open(dir)?;
    let loaded = reopened.load_latest()?;
    let replayed = World::replay(&initial, &inputs);

    println!("live:     tick={} hash={:016x}", live.tick(), live.state_hash());
    println!("loaded:   tick={} hash={:016x}", loaded.tick(), loaded.state_hash());
    println!("replayed: tick={} hash={:016x}", replayed.tick(), replayed.state_hash());

    if loaded.state_hash() != live.state_hash() || replayed.state_hash() != live.state_hash() {
        bail!("state mismatch after reload");
    }
    println!("Match: OK");
    Ok(())
}

fn inspect_save(dir: &Path) -> Result<()> {
    let store = SaveStore::open(dir)?;
    let meta = store.meta();
    println!("Save at {}", store.root().display());
    println!(
        "  schema: save v{}, input v{}",
        meta.save_schema_version, meta.input_schema_version
    );
    println!(
        "  {} snapshots, {} input segments",
        meta.snapshot_count, meta.input_segment_count
    );
    for entry in store.entries() {
        println!(
            "  {:?} {} tick={} sha256={}",
            entry.kind,
            entry.filename,
            entry.tick,
            &entry.sha256[..entry.sha256.len().min(12)]
        );
    }

    store.verify_integrity()?;
    println!("Integrity: OK");

    if store.has_snapshot() {
        let world = store.load_latest()?;
        println!("{}", ArenaInspector::summary(&world));
        for task in ArenaInspector::task_list(&world) {
            println!("  {task}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("arena-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("save schema: v{SAVE_SCHEMA_VERSION}, input schema: v{INPUT_SCHEMA_VERSION}");
            let level = LevelDef::default_arena();
            let world = level.build(0)?;
            println!(
                "built-in level: {} ({} statics, {} NPCs, {} tasks, {} Hz)",
                level.name,
                world.statics().len(),
                world.npcs().len(),
                world.tasks().len(),
                world.config().tick_rate
            );
        }
        Commands::Simulate {
            ticks,
            seed,
            level,
            script,
            json,
        } => simulate(ticks, seed, level.as_deref(), script.as_deref(), json)?,
        Commands::Validate { level } => validate(&level)?,
        Commands::ExportLevel { path } => {
            LevelDef::default_arena().save(&path)?;
            println!("wrote {}", path.display());
        }
        Commands::ReplayCheck {
            ticks,
            seed,
            level,
            script,
            data_dir,
        } => replay_check(
            ticks,
            seed,
            level.as_deref(),
            script.as_deref(),
            data_dir.as_deref(),
        )?,
        Commands::InspectSave { dir } => inspect_save(&dir)?,
    }

    Ok(())
}
