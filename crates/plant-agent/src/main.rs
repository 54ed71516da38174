use anyhow::{Context, Result};
use application::Application;
use application::worker::{ContinuousWorker, from_fn};
use clap::Parser;
use dotenv::dotenv;
use infrastructure::{InMemoryEventArchive, InMemoryTagHistory, RuntimeConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding default.toml and the run-mode overrides
    #[arg(long, default_value = "crates/plant-agent/config")]
    config_dir: String,

    /// Run mode, selects {config_dir}/{run_mode}.toml when present
    #[arg(long, env = "RUN_MODE", default_value = "development")]
    run_mode: String,

    /// Registers a simulated tank filling worker
    #[arg(long)]
    simulate: bool,
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!(pid = std::process::id(), "Plant agent starting");
    info!(config_dir = %args.config_dir, run_mode = %args.run_mode, "Loading configuration");

    let config = RuntimeConfig::load(&args.config_dir, &args.run_mode)
        .with_context(|| format!("failed to load configuration from {}", args.config_dir))?;

    let archive = Arc::new(InMemoryEventArchive::new());
    let history = Arc::new(InMemoryTagHistory::new());
    let app = Application::from_config(config, archive.clone(), history).await?;

    if args.simulate {
        register_simulation(&app)?;
    }

    let scheduler = app.start().await?;
    let summary = app.summary().await;
    info!(
        alarms = summary.alarms.length,
        machines = summary.machines.len(),
        workers = summary.workers.len(),
        "Plant agent running"
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    scheduler.shutdown().await;

    for alarm in app.get_alarms().await {
        info!(alarm = %alarm.name, state = %alarm.state, "Final alarm state");
    }
    info!(
        events = archive.events().await.len(),
        alarm_records = archive.alarm_records().await.len(),
        "Archive totals"
    );
    info!("Good bye!");
    Ok(())
}

/// Raises the tank level while the inlet is open and drains it otherwise.
fn register_simulation(app: &Application) -> Result<()> {
    let job = from_fn(|tags| {
        let open = tags.read("inlet_valve")? == serde_json::Value::Bool(true);
        let level = tags.read("tank_level")?.as_f64().unwrap_or(0.0);
        let next = if open { level + 2.5 } else { (level - 1.0).max(0.0) };
        tags.write("tank_level", serde_json::json!(next))?;
        Ok(())
    });

    app.register(
        ContinuousWorker::builder(job)
            .name("tank_simulator")
            .period(Duration::from_millis(500)),
    )
    .context("failed to register tank simulator")?;
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("\nCRITICAL ERROR: {e:?}");
        std::process::exit(1);
    }
}
