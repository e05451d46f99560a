use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use worldspace_common::{Location, Owner, Ticks};
use worldspace_dispatch::{DispatchConfig, Dispatcher, detected_model};
use worldspace_host::{RegionConfig, SimEntity, SimHost};

#[derive(Parser)]
#[command(name = "worldspace-cli", about = "CLI tool for worldspace dispatch")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the threading model detected for a host
    Info {
        /// Probe a regionized host instead of a main-thread one
        #[arg(long)]
        regionized: bool,
    },
    /// Schedule a batch of work through the dispatcher and tick the host
    Demo {
        #[arg(short, long, value_enum, default_value = "main-thread")]
        model: ModelArg,
        /// Number of ticks to run
        #[arg(short, long, default_value = "10")]
        ticks: usize,
        /// JSON file with `dispatch` and `regions` sections
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    MainThread,
    Regionized,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    dispatch: DispatchConfig,
    regions: RegionConfig,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DemoConfig> {
    let Some(path) = path else {
        return Ok(DemoConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info { regionized } => {
            println!("worldspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("dispatch: {}", worldspace_dispatch::crate_info());
            println!("host: {}", worldspace_host::crate_info());

            let host = if regionized {
                SimHost::regionized(RegionConfig::default())?
            } else {
                SimHost::main_thread()
            };
            let dispatcher = Dispatcher::from_host(&host, DispatchConfig::default())?;
            println!("model: {}", dispatcher.model());
            if let Some(model) = detected_model() {
                println!("process model cached: {model}");
            }
        }
        Commands::Demo {
            model,
            ticks,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let host = match model {
                ModelArg::MainThread => SimHost::main_thread(),
                ModelArg::Regionized => SimHost::regionized(config.regions.clone())?,
            };
            run_demo(&host, config.dispatch, ticks)?;
        }
    }

    Ok(())
}

fn run_demo(host: &SimHost, config: DispatchConfig, ticks: usize) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_host(host, config)?;
    let owner = Owner::new("demo");
    println!("Dispatch demo: model={}, ticks={ticks}", dispatcher.model());

    let runs = Arc::new(AtomicUsize::new(0));
    let bump = {
        let runs = runs.clone();
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    };

    let now = dispatcher.run_now(&owner, bump.clone())?;
    let later = dispatcher.run_delayed(&owner, bump.clone(), Ticks(3))?;
    let timer = dispatcher.run_repeating(&owner, bump.clone(), Ticks(1), Ticks(2))?;
    let spawn = Location::new("overworld", glam::Vec3::new(200.0, 64.0, -40.0));
    let at = dispatcher.run_at_location(&owner, &spawn, bump.clone())?;

    let entity = match host.runtime() {
        Some(runtime) => runtime.spawn_entity(spawn.clone()),
        None => SimEntity::detached(spawn.clone()),
    };
    let follow = dispatcher.run_on_entity(&owner, &*entity, bump.clone())?;

    let background = dispatcher.run_async_or_wait(&owner, bump)?;
    let mut answer = dispatcher.call_and_await(&owner, || Ok(6 * 7))?;

    for (label, handle) in [
        ("run_now", &now),
        ("run_delayed", &later),
        ("run_repeating", &timer),
        ("run_at_location", &at),
        ("run_on_entity", &follow),
        ("run_async_or_wait", &background),
    ] {
        println!("  {label:<18} {handle:?}");
    }

    let ran = host.ticks(ticks);
    timer.cancel();
    tracing::debug!(ran, "demo ticks finished");

    match answer.try_take() {
        Some(Ok(value)) => println!("call_and_await -> {value}"),
        Some(Err(err)) => println!("call_and_await failed: {err}"),
        None => println!("call_and_await still pending"),
    }
    println!(
        "Finished: tick-tasks={ran}, closure-runs={}",
        runs.load(Ordering::SeqCst)
    );
    Ok(())
}
