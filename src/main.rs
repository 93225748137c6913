use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use yc_image_cleaner::{
    accounts::discover_accounts,
    config::{
        CleanerConfig,
        env::{EnvSource, ProcessEnv},
    },
    observability,
    providers::yandex::YandexSessionFactory,
    retention::{RetentionRunner, log_report, start_retention_worker},
    routing::EndpointResolver,
};

/// CLI arguments for the image cleaner
#[derive(Parser, Debug)]
#[command(version, about = "Yandex Cloud compute image retention", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a TOML config file. Without one, defaults and environment
    /// variables are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log what would be deleted without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Load environment variables from this file instead of `./.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the cleanup once for every configured account and exit (default)
    Run,
    /// Run the cleanup repeatedly at `schedule.interval_secs`
    Daemon,
    /// Print the discovered accounts and configuration problems
    Accounts,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Before anything reads the environment
    let env_file = load_env_file(args.env_file.as_deref());

    let mut config = match CleanerConfig::load(args.config.as_deref(), &ProcessEnv) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if args.dry_run {
        config.retention.dry_run = true;
    }

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match env_file {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to load environment file");
            std::process::exit(1);
        }
    }

    match args.command {
        Some(Command::Accounts) => run_accounts(&config),
        Some(Command::Daemon) => run_daemon(config).await,
        Some(Command::Run) | None => run_once(config).await,
    }
}

/// Load `--env-file`, or `./.env` if present. A missing default file is not
/// an error.
fn load_env_file(explicit: Option<&std::path::Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match explicit {
        Some(path) => dotenvy::from_path(path).map(|()| Some(path.to_path_buf())),
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e),
        },
    }
}

fn build_runner(config: &CleanerConfig) -> RetentionRunner {
    let sessions = match YandexSessionFactory::new(&config.provider) {
        Ok(factory) => factory,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create HTTP client");
            std::process::exit(1);
        }
    };

    RetentionRunner::new(
        config.retention.clone(),
        EndpointResolver::new(config.endpoints.clone()),
        Arc::new(sessions),
    )
}

/// One scheduled invocation.
///
/// Exits non-zero only if no account was configured or every account aborted.
async fn run_once(config: CleanerConfig) {
    let runner = build_runner(&config);
    let discovery = discover_accounts(&ProcessEnv);

    let report = runner.run_once(discovery).await;
    log_report(&report);

    if report.has_failures() {
        std::process::exit(1);
    }
}

async fn run_daemon(config: CleanerConfig) {
    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    let runner = build_runner(&config);
    let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);

    tokio::select! {
        _ = start_retention_worker(runner, env, config.schedule.interval()) => {},
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, stopping");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print discovered accounts. Credentials are never printed.
fn run_accounts(config: &CleanerConfig) {
    let resolver = EndpointResolver::new(config.endpoints.clone());
    let discovery = discover_accounts(&ProcessEnv);

    for account in &discovery.accounts {
        let folders = match &account.folder_ids {
            Some(ids) => ids.iter().cloned().collect::<Vec<_>>().join(","),
            None => "*".to_string(),
        };
        let endpoints = match resolver.resolve(account) {
            Ok(resolved) if resolved.is_custom() => "custom",
            Ok(_) => "builtin",
            Err(_) => "invalid",
        };
        println!(
            "{}\tcloud={}\tsa={}\tfolders={}\tendpoints={}",
            account.label(),
            account.cloud_id,
            account.credentials.service_account_id,
            folders,
            endpoints
        );
    }

    for issue in &discovery.issues {
        println!("issue\t{}", issue);
    }

    if discovery.accounts.is_empty() {
        std::process::exit(1);
    }
}
