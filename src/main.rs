//! fileops - interruptible file-system maintenance with live progress.
//!
//! Usage:
//!   fileops clean [PATHS]...           Remove empty directories
//!   fileops chown [PATHS]...           Change ownership of a tree
//!   fileops kinds                      List available operations
//!   fileops --help                     Show help

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fileops_core::{EngineSettings, OperationConfig, OperationKind, OperationResult, ProgressInfo};
use fileops_engine::{Engine, OperationManager};
use fileops_fs::OsFileSystem;
use fileops_progress::ProgressTracker;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "FILEOPS_LOG";

#[derive(Parser)]
#[command(
    name = "fileops",
    version,
    about = "Interruptible file-system maintenance tasks",
    long_about = "fileops runs maintenance tasks such as empty-directory cleanup and \
                  ownership changes, reporting their progress as they run.\n\n\
                  Set FILEOPS_LOG (e.g. `debug`) to control log output."
)]
struct Cli {
    /// Engine settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Do not print progress updates
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format for the final result
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove empty directories, deepest first
    Clean {
        /// Root directories (never removed themselves)
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Directories to keep (glob on the name, or text anywhere in the path)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Hidden directory names that may be removed
        #[arg(short, long)]
        include: Vec<String>,

        /// Maximum depth to descend
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,
    },

    /// Change the owner of every selected entry
    Chown {
        /// Numeric owner as UID or UID:GID (defaults to the current user)
        #[arg(short, long)]
        user: Option<String>,

        /// Root paths
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Entries to skip (glob on the path or the name)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Only change entries whose name matches
        #[arg(short, long)]
        include: Vec<String>,

        /// Only change the roots and their direct children
        #[arg(long)]
        no_recursive: bool,
    },

    /// List the operations this build can run
    Kinds,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => EngineSettings::load(path)
            .wrap_err_with(|| format!("Failed to load settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to start runtime")?;
    runtime.block_on(run(cli, settings))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, settings: EngineSettings) -> Result<()> {
    let progress = Arc::new(ProgressTracker::from_settings(&settings));
    let engine = Arc::new(Engine::with_defaults(Arc::new(OsFileSystem::new()), Arc::clone(&progress)));

    let (kind, config) = match cli.command {
        Command::Kinds => {
            for kind in engine.supported_operations() {
                println!("{kind}");
            }
            return Ok(());
        }
        Command::Clean {
            paths,
            exclude,
            include,
            max_depth,
        } => {
            let config = OperationConfig {
                dry_run: cli.dry_run,
                include_patterns: include,
                exclude_patterns: exclude,
                max_depth,
                ..OperationConfig::new(paths)
            };
            (OperationKind::Cleanup, config)
        }
        Command::Chown {
            user,
            paths,
            exclude,
            include,
            no_recursive,
        } => {
            let mut config = OperationConfig {
                dry_run: cli.dry_run,
                recursive: !no_recursive,
                include_patterns: include,
                exclude_patterns: exclude,
                ..OperationConfig::new(paths)
            };
            if let Some(user) = user {
                config.custom_settings.insert("target_user".into(), user.into());
            }
            (OperationKind::Ownership, config)
        }
    };

    let manager = OperationManager::from_settings(Arc::clone(&engine), &settings);
    let token = CancellationToken::new();

    let reporter = {
        let progress = Arc::clone(&progress);
        let token = token.clone();
        let interval = settings.report_interval();
        tokio::spawn(async move { progress.start_auto_reporting(interval, token).await })
    };
    let printer = (!cli.quiet).then(|| tokio::spawn(print_progress(progress.subscribe_all())));
    let signals = tokio::spawn(cancel_on_signal(token.clone()));

    let id = manager
        .submit_operation(token.clone(), kind, config)
        .wrap_err_with(|| format!("Failed to start {kind}"))?;
    tracing::debug!(%id, "waiting for operation");
    let outcome = manager.wait(&id).await;

    token.cancel();
    progress.unsubscribe(fileops_progress::WILDCARD);
    let _ = reporter.await;
    let _ = signals.await;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = outcome.wrap_err_with(|| format!("{kind} operation {id} did not complete"))?;
    print_result(&result, cli.format)?;

    if !result.is_success() {
        bail!("{} ended as {}", result.id, result.status);
    }
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM. Returns once the token is cancelled.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = token.cancelled() => return,
        _ = ctrl_c => tracing::warn!("interrupted, cancelling"),
        _ = terminate => tracing::warn!("terminated, cancelling"),
    }
    token.cancel();
}

/// Print progress snapshots until the channel closes.
async fn print_progress(mut updates: tokio::sync::mpsc::Receiver<ProgressInfo>) {
    while let Some(info) = updates.recv().await {
        eprintln!("{}", format_progress(&info));
    }
}

fn format_progress(info: &ProgressInfo) -> String {
    let mut line = format!(
        "[{}] {} {:>5.1}% ({}/{} items",
        info.id,
        info.current_step,
        info.percentage(),
        info.items_processed,
        info.total_items,
    );
    if info.total_bytes > 0 {
        line.push_str(&format!(
            ", {} of {}",
            format_size(info.bytes_processed),
            format_size(info.total_bytes)
        ));
    }
    line.push(')');

    if info.speed > 0.0 {
        line.push_str(&format!(" {:.1}/s", info.speed));
    }
    if let Some(eta) = info.eta {
        line.push_str(&format!(" eta {}", format_eta(eta)));
    }
    if info.error_count > 0 {
        line.push_str(&format!(" {} errors", info.error_count));
    }
    line
}

fn print_result(result: &OperationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" {}", result.summary);
            println!(
                " {} items in {:.2}s",
                result.items_processed,
                result.duration.as_secs_f64()
            );
            println!("{}", "─".repeat(60));

            for path in &result.files_affected {
                println!("   {}", path.display());
            }
            if !result.errors.is_empty() {
                println!();
                println!(" {} error(s):", result.errors.len());
                for error in &result.errors {
                    println!("   {error}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
    }
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m{:02}s", secs / 60, secs % 60),
        _ => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
    }
}
