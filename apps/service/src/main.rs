use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use probe::{
    ExecutionMode, Executor, Monitor, MonitorStatus, ResultFilter, ResultSink, ResultView,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod config;
mod database;
mod monitoring;
mod pool;
mod service;
mod storage;

use config::Config;
use monitoring::MonitoringScheduler;
use service::MonitorService;
use storage::FsObjectStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP uptime monitor service", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Account the command acts on
    #[arg(short, long, global = true, default_value = "local")]
    account: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Execute a monitor definition (JSON file) once without storing it
    Exec { file: PathBuf },
    /// Print the effective configuration
    Config,
    /// Manage monitors
    #[command(subcommand)]
    Monitor(MonitorCommand),
    /// List results of a monitor
    Results {
        monitor_id: String,
        #[arg(long, default_value = "summary")]
        view: ResultView,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show a single result with body and headers
    Result { result_id: String },
    /// Latency and status summary of one monitor, or of all monitors
    Stats {
        monitor_id: Option<String>,
        /// Only summarize the last N hours, optionally for some locations
        #[arg(long)]
        hours: Option<i64>,
        #[arg(long = "location")]
        locations: Vec<String>,
    },
    /// Show the activity log
    Activity {
        #[arg(long)]
        monitor_id: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum MonitorCommand {
    /// Create a monitor from a JSON file
    Add { file: PathBuf },
    List,
    Pause { monitor_id: String },
    Resume { monitor_id: String },
    Remove { monitor_id: String },
    /// Run a stored monitor now and keep its result
    Run { monitor_id: String },
    /// Replace the env of a monitor with KEY=VALUE pairs
    Env { monitor_id: String, pairs: Vec<String> },
    /// Replace the variables of a monitor with KEY=VALUE pairs
    Vars { monitor_id: String, pairs: Vec<String> },
}

struct Components {
    service: MonitorService,
    scheduler: MonitoringScheduler,
}

async fn components(config: &Config) -> Result<Components> {
    let repo = Arc::new(database::open(&config.database).await?);
    let objects = Arc::new(FsObjectStore::new(&config.storage.root));
    let sink = ResultSink::new(repo.clone(), objects, config.sink.options());
    let executor = Executor::system(config.executor.options()).context("failed to set up TLS")?;

    let scheduler = MonitoringScheduler::new(
        executor.clone(),
        sink.clone(),
        repo.clone(),
        Duration::from_secs(config.scheduler.refresh_secs.max(1)),
    );
    let service = MonitorService::new(repo, sink, executor);

    Ok(Components { service, scheduler })
}

fn read_monitor(file: &Path) -> Result<Monitor> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid monitor in {}", file.display()))
}

fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("expected KEY=VALUE, got `{pair}`"))
        })
        .collect()
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;
    let account = cli.account.as_str();

    match cli.command {
        Command::Config => println!("{config}"),
        Command::Exec { file } => {
            let mut monitor = read_monitor(&file)?;
            monitor.account_id = account.to_string();
            let executor = Executor::system(config.executor.options())?;
            let result = executor.execute(&monitor, ExecutionMode::OnDemand).await?;
            print_json(&result)?;
        }
        Command::Run => {
            let Components { scheduler, .. } = components(&config).await?;
            let cancel = CancellationToken::new();

            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, shutting down");
                }
                shutdown.cancel();
            });

            scheduler.run(cancel).await;
        }
        Command::Monitor(command) => {
            let Components { service, .. } = components(&config).await?;
            match command {
                MonitorCommand::Add { file } => {
                    print_json(&service.create(account, read_monitor(&file)?).await?)?
                }
                MonitorCommand::List => print_json(&service.list(account).await?)?,
                MonitorCommand::Pause { monitor_id } => print_json(
                    &service.set_status(account, &monitor_id, MonitorStatus::Paused).await?,
                )?,
                MonitorCommand::Resume { monitor_id } => print_json(
                    &service.set_status(account, &monitor_id, MonitorStatus::Active).await?,
                )?,
                MonitorCommand::Remove { monitor_id } => {
                    print_json(&service.delete(account, &monitor_id).await?)?
                }
                MonitorCommand::Run { monitor_id } => {
                    let (result, stored) = service.run_now(account, &monitor_id).await?;
                    if let Some(blob_error) = stored.blob_error {
                        eprintln!("body and headers not stored: {blob_error}");
                    }
                    print_json(&result)?
                }
                MonitorCommand::Env { monitor_id, pairs } => {
                    service.set_env(account, &monitor_id, &parse_pairs(&pairs)?).await?
                }
                MonitorCommand::Vars { monitor_id, pairs } => {
                    service.set_variables(account, &monitor_id, &parse_pairs(&pairs)?).await?
                }
            }
        }
        Command::Results { monitor_id, view, limit } => {
            let Components { service, .. } = components(&config).await?;
            let filter = ResultFilter::for_monitor(monitor_id).view(view).limit(limit);
            print_json(&service.query_results(account, &filter).await?)?;
        }
        Command::Result { result_id } => {
            let Components { service, .. } = components(&config).await?;
            print_json(&service.find_result(account, &result_id).await?)?;
        }
        Command::Stats { monitor_id, hours, locations } => {
            let Components { service, .. } = components(&config).await?;
            match (monitor_id, hours) {
                (None, _) => print_json(&service.all_stat_summaries(account).await?)?,
                (Some(monitor_id), None) => {
                    print_json(&service.stat_summary(account, &monitor_id).await?)?
                }
                (Some(monitor_id), Some(hours)) => {
                    let end = Utc::now();
                    let start = end - chrono::Duration::hours(hours);
                    let stats = service
                        .stats_by_period(account, &monitor_id, start, end, &locations)
                        .await?;
                    print_json(&stats)?
                }
            }
        }
        Command::Activity { monitor_id, limit } => {
            let Components { service, .. } = components(&config).await?;
            print_json(&service.activity(account, monitor_id.as_deref(), limit).await?)?;
        }
    }

    Ok(())
}
