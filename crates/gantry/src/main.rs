use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{debug, error};
use tracing_subscriber::EnvFilter;

use gantry_core::api::{
    PluginApi, RepositoryRequest, Request, Response, UninstallRequest, UpdateRequest,
};
use gantry_core::plugin_system::ListingStatus;
use gantry_core::{Application, ManagerConfig, Result};

/// Gantry: plugin lifecycle manager
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print the raw JSON response instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the install store
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (.json, .yaml or .toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List installed and loaded plugins
    List,
    /// Check a repository without installing it
    Validate {
        repository_url: String,
        #[arg(value_name = "REF")]
        git_ref: String,
    },
    /// Install (or overwrite) a plugin from a repository ref
    Install {
        repository_url: String,
        #[arg(value_name = "REF")]
        git_ref: String,
    },
    /// Remove an installed plugin
    Uninstall { name: String },
    /// Look for newer commits of every installed plugin
    CheckUpdates,
    /// Re-resolve one installed plugin, optionally switching ref
    Update {
        name: String,
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },
    /// Update every plugin whose last check found a newer commit
    UpdateAll,
}

impl PluginCommand {
    fn into_request(self) -> Request {
        match self {
            PluginCommand::List => Request::List,
            PluginCommand::Validate { repository_url, git_ref } => {
                Request::Validate(RepositoryRequest::new(repository_url, git_ref))
            }
            PluginCommand::Install { repository_url, git_ref } => {
                Request::Install(RepositoryRequest::new(repository_url, git_ref))
            }
            PluginCommand::Uninstall { name } => Request::Uninstall(UninstallRequest {
                distribution_name: name,
            }),
            PluginCommand::CheckUpdates => Request::CheckUpdates,
            PluginCommand::Update { name, git_ref } => Request::Update(UpdateRequest {
                distribution_name: name,
                git_ref,
            }),
            PluginCommand::UpdateAll => Request::UpdateAll,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

fn load_config(args: &CliArgs) -> Result<ManagerConfig> {
    let config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)?,
        None => ManagerConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn print_lines(lines: &[String], label: &str) {
    for line in lines {
        println!("  {}: {}", label, line);
    }
}

fn print_summary(response: &Response) {
    match response {
        Response::List(listing) => {
            let statuses = listing.statuses();
            if statuses.is_empty() {
                println!("No plugins installed.");
                return;
            }
            for (name, status) in statuses {
                let status = match status {
                    ListingStatus::Active => "active",
                    ListingStatus::PendingRestart => "pending restart",
                    ListingStatus::PendingRemoval => "pending removal",
                };
                match listing.installed.iter().find(|r| r.distribution_name == name) {
                    Some(record) => println!(
                        "  - {} [{}] {}@{} ({}), {}",
                        name,
                        status,
                        record.repository_url,
                        record.git_ref,
                        record.short_commit(),
                        record.update_available
                    ),
                    None => println!("  - {} [{}]", name, status),
                }
            }
        }
        Response::Validate(report) => {
            if report.ok {
                println!(
                    "Valid: {} at {}",
                    report.distribution_name.as_deref().unwrap_or("?"),
                    report.resolved_commit.as_deref().unwrap_or("?")
                );
                for (key, target) in &report.entry_points {
                    println!("  entry point {} = {}", key, target);
                }
            } else {
                println!("Invalid repository:");
            }
            print_lines(&report.errors, "error");
            print_lines(&report.warnings, "warning");
        }
        Response::Install(response) => {
            if response.ok {
                println!(
                    "Installed {} at {}. Restart the host to load it.",
                    response.distribution_name.as_deref().unwrap_or("?"),
                    response.resolved_commit.as_deref().unwrap_or("?")
                );
            } else {
                println!("Install failed:");
            }
            print_lines(&response.errors, "error");
            print_lines(&response.warnings, "warning");
        }
        Response::Uninstall(response) => {
            if response.ok {
                println!("Uninstalled. Restart the host to unload it.");
            } else {
                println!("Uninstall failed:");
            }
            print_lines(&response.errors, "error");
        }
        Response::CheckUpdates(report) => {
            if report.plugins.is_empty() {
                println!("No plugins installed.");
            }
            for info in &report.plugins {
                match (&info.error, info.update_available) {
                    (Some(reason), _) => println!("  - {}: check failed: {}", info.distribution_name, reason),
                    (None, true) => println!(
                        "  - {}: update available ({})",
                        info.distribution_name,
                        info.latest_commit.as_deref().unwrap_or("?")
                    ),
                    (None, false) => println!("  - {}: up to date", info.distribution_name),
                }
            }
        }
        Response::Update(response) => {
            if response.ok {
                println!(
                    "Updated {} -> {}. Restart the host to load it.",
                    response.previous_commit.as_deref().unwrap_or("?"),
                    response.resolved_commit.as_deref().unwrap_or("?")
                );
            } else {
                println!("Update failed:");
            }
            print_lines(&response.errors, "error");
            print_lines(&response.warnings, "warning");
        }
        Response::UpdateAll(summary) => {
            println!("Updated {}, failed {}.", summary.updated, summary.failed);
            for failure in &summary.failures {
                println!("  - {}: {}", failure.distribution_name, failure.errors.join("; "));
            }
            if summary.restart_required {
                println!("Restart the host to load the updates.");
            }
        }
    }
}

async fn run(args: CliArgs) -> Result<bool> {
    let config = load_config(&args)?;
    debug!("Using data directory {}", config.data_dir.display());

    let mut app = Application::new(config)?;
    app.initialize().await?;
    let api: PluginApi = app.api();

    let Commands::Plugin { command } = args.command;
    let response = api.handle(command.into_request()).await;
    app.shutdown().await?;
    let response = response?;

    if args.json {
        let value = response.to_json().map_err(|e| format!("could not encode response: {}", e))?;
        println!("{}", value);
    } else {
        print_summary(&response);
    }
    Ok(response.is_ok())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
