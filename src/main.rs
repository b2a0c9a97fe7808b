mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use astral_app::{
    AreaBook, MissionCatalog, PowerPlan, PowerReport, ReplayBackend, ReplayScript,
    SqliteProgressStore, TrailblazePowerApp,
};
use astral_core::config::AppConfig;
use astral_core::event::{EventBus, OperationEvent};
use astral_core::traits::ProgressStore;
use astral_engine::{Context, RunControl};

#[derive(Parser)]
#[command(name = "astral", version, about = "Screen-driven game automation on an operation graph engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "astral.toml", env = "ASTRAL_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spend Trailblaze Power on the configured plan
    Run {
        /// Drive the engine from a recorded replay script
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Do not persist plan progress
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration, areas and every operation graph
    Validate,
    /// Show or reset persisted plan progress
    Progress {
        /// Plan entry id to reset
        #[arg(long)]
        reset: Option<String>,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("astral=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "astral", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { replay, dry_run } => run(config, &cli.config, replay, dry_run).await?,
        Commands::Validate => {
            let issues = validate::run_validate(&config, &cli.config);
            if issues > 0 {
                anyhow::bail!("{} issues found", issues);
            }
        }
        Commands::Progress { reset } => progress(&config, reset)?,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        Ok(AppConfig::load(path)?)
    } else {
        warn!(path = %path.display(), "No config file found, using defaults");
        Ok(AppConfig::default())
    }
}

/// A progress store for this run. Dry runs work on an in-memory copy.
fn open_store(config: &AppConfig, dry_run: bool) -> anyhow::Result<Box<dyn ProgressStore>> {
    let path = config.progress_db_path();
    if dry_run {
        info!("Dry run, progress will not be saved");
        return Ok(Box::new(dry_run_store(&path)?));
    }
    Ok(Box::new(SqliteProgressStore::open(&path)?))
}

/// In-memory store seeded from the database at `path`, if there is one.
/// Nothing is created on disk.
fn dry_run_store(path: &Path) -> anyhow::Result<SqliteProgressStore> {
    let scratch = SqliteProgressStore::in_memory()?;
    if !path.exists() {
        return Ok(scratch);
    }
    let persistent = SqliteProgressStore::open(path)?;
    for record in persistent.list()? {
        scratch.save(&record.plan_item_id, record.run_times)?;
    }
    Ok(scratch)
}

async fn run(
    config: AppConfig,
    config_path: &Path,
    replay: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let Some(replay) = replay else {
        anyhow::bail!("no live game backend is available; pass --replay <script.json>");
    };
    let script = ReplayScript::load(&replay)?;
    info!(path = %replay.display(), frames = script.frames.len(), "Loaded replay script");
    let backend = ReplayBackend::new(script);

    let areas = AreaBook::load_or_builtin(&config.areas_path(config_path))?;
    let catalog = MissionCatalog::new(config.missions.clone())?;
    let plan = PowerPlan::load(&config.plan, &catalog, open_store(&config, dry_run)?)?;

    let control = RunControl::new();
    let event_bus = Arc::new(EventBus::default());

    // Cooperative cancel on Ctrl-C
    let signal_control = control.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Cancelling run...");
        signal_control.cancel();
    });

    // Print top-level progress until the run is over
    let done = CancellationToken::new();
    let mut rx = event_bus.subscribe();
    let printer_done = done.clone();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = printer_done.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(OperationEvent::Started { operation, depth, .. }) if depth <= 1 => {
                        eprintln!("{}[{}]", "  ".repeat(depth), operation);
                    }
                    Ok(OperationEvent::Finished { operation, success, status, elapsed_ms, .. }) => {
                        let mark = if success { "ok" } else { "failed" };
                        eprintln!(
                            "  [{}: {}] {} ({} ms)",
                            operation,
                            mark,
                            status.unwrap_or_default(),
                            elapsed_ms
                        );
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Progress printer lagged");
                    }
                    Err(_) => break,
                },
            }
        }
    });

    let config = Arc::new(config);
    let run_control = control.clone();
    let run_events = event_bus.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut ctx = Context::builder()
            .capture(backend.clone())
            .ocr(backend.clone())
            .matcher(backend.clone())
            .controller(backend)
            .areas(areas)
            .control(run_control)
            .events(run_events)
            .config(config)
            .build();
        ctx.run(TrailblazePowerApp::new(plan))
    })
    .await?;

    done.cancel();
    printer.await.ok();

    let status = result.status.clone().unwrap_or_default();
    println!("Status: {}", status);
    if let Some(report) = result.data_as::<PowerReport>() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !result.success {
        anyhow::bail!("run failed: {}", status);
    }
    Ok(())
}

fn progress(config: &AppConfig, reset: Option<String>) -> anyhow::Result<()> {
    let store = SqliteProgressStore::open(&config.progress_db_path())?;

    if let Some(id) = reset {
        if store.reset(&id)? {
            println!("Reset progress of '{}'", id);
        } else {
            println!("No progress recorded for '{}'", id);
        }
        return Ok(());
    }

    let records = store.list()?;
    if config.plan.is_empty() && records.is_empty() {
        println!("No plan configured and no progress recorded.");
        return Ok(());
    }

    println!("  {:<24} {:<28} {:>9}  {}", "PLAN", "MISSION", "PROGRESS", "UPDATED");
    for item in &config.plan {
        let record = records.iter().find(|r| r.plan_item_id == item.key());
        let run_times = record.map(|r| r.run_times).unwrap_or(0);
        let updated = record.map(|r| r.updated_at.as_str()).unwrap_or("-");
        println!(
            "  {:<24} {:<28} {:>9}  {}",
            item.key(),
            item.mission_id,
            format!("{}/{}", run_times.min(item.plan_times), item.plan_times),
            updated
        );
    }

    // Progress of entries no longer in the plan
    for record in records
        .iter()
        .filter(|r| !config.plan.iter().any(|p| p.key() == r.plan_item_id))
    {
        println!(
            "  {:<24} {:<28} {:>9}  {}",
            record.plan_item_id, "(not in plan)", record.run_times, record.updated_at
        );
    }
    Ok(())
}
