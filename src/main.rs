//! task-publish
//!
//! Publishes the tasks of a markdown vault as a single web page and applies
//! edits made on that page back to the vault documents.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use task_publish::cli::{Cli, Command, RunArgs, SyncArgs, list::ListArgs, queue::QueueCommand};
use task_publish::config::{
    Config, ConfigLoader, ConfigPaths,
    watcher::{WatcherConfig, start_config_watcher},
};
use task_publish::format::{OutputFormat, format_sync_report_markdown, format_tasks};
use task_publish::intake;
use task_publish::logging::{self, LogTarget};
use task_publish::retry::RetryPolicy;
use task_publish::service::{Service, today};
use tracing::{info, warn};

/// Settings given on the command line, reapplied after every config reload.
#[derive(Debug, Clone, Default)]
struct Overrides {
    vault: Option<String>,
    intake: bool,
    port: Option<u16>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(ref vault) = self.vault {
            config.vault.root = vault.into();
        }
        if self.intake {
            config.intake.enabled = true;
        }
        if let Some(port) = self.port {
            config.intake.port = port;
        }
    }
}

/// Load every tier, apply command-line overrides and validate.
fn load_config(paths: ConfigPaths, overrides: &Overrides) -> Result<(Config, String)> {
    let mut loader = ConfigLoader::load_with_paths(paths)?;
    if let Some(path) = loader.config_path() {
        info!("Using config file {}", path.display());
    }
    overrides.apply(loader.config_mut());
    loader.config().validate()?;
    let template = loader.daily_template();
    info!(source = ?template.source, "Daily template resolved");
    Ok((loader.into_config(), template.content))
}

fn parse_format(raw: &str) -> Result<OutputFormat> {
    OutputFormat::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("unknown format '{}', expected json or markdown", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("TASK_PUBLISH_CONFIG_PATH", config_path);
        }
    }

    let mut overrides = Overrides {
        vault: cli.vault.clone(),
        ..Default::default()
    };
    if let Command::Run(ref args) = cli.command {
        overrides.intake = args.intake;
        overrides.port = args.port;
    }

    let paths = ConfigPaths::discover();
    let (config, template) = load_config(paths.clone(), &overrides)?;
    let service = Arc::new(Service::open(config, template));

    match cli.command {
        Command::Publish => run_publish(&service).await?,
        Command::Sync(args) => run_sync(&service, args).await?,
        Command::List(args) => run_list(&service, args).await?,
        Command::Queue(cmd) => run_queue(&service, cmd).await?,
        Command::Run(args) => run_daemon(service, args, paths, overrides).await?,
    }

    Ok(())
}

async fn run_publish(service: &Service) -> Result<()> {
    let report = service.publish().await?;
    println!(
        "Published {} tasks ({} bytes) to {}",
        report.tasks, report.bytes, report.target
    );
    Ok(())
}

async fn run_sync(service: &Service, args: SyncArgs) -> Result<()> {
    let format = parse_format(&args.format)?;
    let modified = if args.show_modified {
        Some(service.modified_since_last_sync().await?)
    } else {
        None
    };
    let report = service.sync().await?;

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&report)?;
            if let Some(modified) = modified {
                value["modifiedDocuments"] = serde_json::to_value(modified)?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Markdown => {
            print!("{}", format_sync_report_markdown(&report));
            if let Some(modified) = modified {
                println!("\n## Changed since previous sync\n");
                for path in modified {
                    println!("- {}", path);
                }
            }
        }
    }
    Ok(())
}

async fn run_list(service: &Service, args: ListArgs) -> Result<()> {
    let format = parse_format(&args.format)?;
    let query = args.query_text().context("reading query")?;
    let tasks = service.list(&query, today()).await?;
    println!("{}", format_tasks(&tasks, format));
    Ok(())
}

async fn run_queue(service: &Service, cmd: QueueCommand) -> Result<()> {
    let change = cmd.to_change(today())?;
    let kind = change.kind();
    service.enqueue(change).await?;
    println!(
        "Queued {} in {}",
        kind,
        service.changelog().path().display()
    );
    Ok(())
}

/// Long-running mode: scheduled syncs, config hot reload, optional intake.
async fn run_daemon(
    service: Arc<Service>,
    args: RunArgs,
    paths: ConfigPaths,
    overrides: Overrides,
) -> Result<()> {
    let config = service.config();
    info!("Starting task-publish v{}", env!("CARGO_PKG_VERSION"));
    info!("Vault: {}", config.vault.root.display());
    info!("Change log: {}", config.changelog_path().display());

    let schedule = tokio::spawn(Arc::clone(&service).run_schedule());

    if args.publish {
        match service.publish().await {
            Ok(report) => info!(tasks = report.tasks, "Published to {}", report.target),
            Err(e) => warn!(code = ?e.code(), "Initial publish failed: {}", e),
        }
    }

    start_config_file_watcher(&service, &paths, overrides);

    let intake_handle = if config.intake.enabled {
        let addr = config.intake.socket_addr()?;
        info!("Starting intake on {}", addr);
        if config.publish.page_secret.is_empty() {
            warn!("No page secret set; intake accepts edits from any client that can reach it");
        }
        Some(intake::start_server_with_retry(
            intake::IntakeServer::new(service.changelog(), &config.publish.page_secret),
            addr,
            RetryPolicy::from_publish(&config.publish),
        ))
    } else {
        info!("Intake disabled");
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if let Some(handle) = intake_handle {
        handle.shutdown();
    }
    schedule.abort();
    Ok(())
}

/// Watch the config directory and swap in a fresh snapshot on change.
///
/// If the watcher fails to start the service keeps running with the
/// configuration it started with.
fn start_config_file_watcher(service: &Arc<Service>, paths: &ConfigPaths, overrides: Overrides) {
    let Some(dir) = paths.watch_dir().map(|d| d.to_path_buf()) else {
        info!("No config directory to watch; hot-reload disabled");
        return;
    };

    match start_config_watcher(dir, WatcherConfig::default()) {
        Ok(mut handle) => {
            info!("Config file watcher started for hot-reload");
            let service = Arc::clone(service);
            let paths = paths.clone();

            tokio::spawn(async move {
                while let Some(event) = handle.wait_for_change().await {
                    if !event.requires_reload() {
                        continue;
                    }
                    info!("Config change detected: {:?}", event);
                    match load_config(paths.clone(), &overrides) {
                        Ok((config, template)) => service.reload(config, template),
                        Err(e) => warn!("Config reload failed: {}. Keeping current config.", e),
                    }
                }
                info!("Config file watcher stopped");
            });
        }
        Err(e) => {
            warn!(
                "Failed to start config file watcher: {}. Continuing without hot-reload.",
                e
            );
        }
    }
}
