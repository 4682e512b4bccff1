//! qa-sync - test tracking synchronization
//!
//! Pulls the test issues of every configured project from the tracker,
//! enriches them and stores them in the QA database. Errors collected
//! during the run are reported at the end.

use anyhow::{Context, Result};
use clap::Parser;
use qa_sync::db::{self, directory};
use qa_sync::{
    BatchOrchestrator, ErrorReport, JiraClient, LogNotifier, Notifier, SmtpNotifier, SqliteStore,
    SyncRun,
};
use qa_sync_common::config::{resolve_config_path, AppConfig};
use qa_sync_common::logging::{clear_logs, init_tracing, recent_log_files};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Days of log files attached to an error report
const ATTACHED_LOG_DAYS: u32 = 1;

/// Command-line arguments for qa-sync
#[derive(Parser, Debug)]
#[command(name = "qa-sync")]
#[command(about = "Synchronize tracker test issues into the QA database")]
#[command(version)]
struct Args {
    /// Config file (falls back to QA_SYNC_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project key to sync; repeat for several (default: all configured)
    #[arg(short, long = "project")]
    projects: Vec<String>,

    /// Maximum issues fetched per project (default: tracker.search_limit)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Skip the end-of-run error report
    #[arg(long)]
    no_notify: bool,

    /// Enrich and store into an in-memory database only
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(&config.logging)?;

    info!(
        "Starting qa-sync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config: {}", config_path.display());

    let today = chrono::Local::now().date_naive();
    if let Some(dir) = &config.logging.directory {
        match clear_logs(dir, config.logging.retention_days, today) {
            Ok(removed) if !removed.is_empty() => info!("Removed {} expired log files", removed.len()),
            Ok(_) => {}
            Err(e) => warn!("Log cleanup failed: {}", e),
        }
    }

    let credentials = config.tracker.credentials()?;
    let client = JiraClient::new(
        &credentials,
        Duration::from_secs(config.tracker.request_timeout_secs),
        config.tracker.requests_per_second,
    )
    .context("Failed to build tracker client")?;

    let mut run = SyncRun::new();

    let pool = if args.dry_run {
        info!("Dry run: storing into an in-memory database");
        db::init_in_memory_pool().await?
    } else {
        info!("Database: {}", config.database.path.display());
        let pool = db::open_database_pool(&config.database.path).await?;
        let missing = db::prepare_schema(&pool, &mut run.ledger).await?;
        if !missing.is_empty() {
            error!("Tables {:?} not present, created them", missing);
        }
        pool
    };

    directory::populate_testers(&pool, &config.testers).await?;
    directory::populate_projects(&pool, &config).await?;
    let store = SqliteStore::new(pool);

    let project_keys = if args.projects.is_empty() {
        config.project_keys()
    } else {
        args.projects.clone()
    };
    let limit = args.limit.unwrap_or(config.tracker.search_limit);

    info!(run = %run.run_id, "Syncing {} projects", project_keys.len());

    let outcome = match BatchOrchestrator::connect(&client).await {
        Ok(orchestrator) => {
            orchestrator
                .sync_all(&mut run, &config, &store, &project_keys, limit)
                .await
        }
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(summaries) => {
            for summary in summaries {
                info!(
                    project = %summary.project_key,
                    fetched = summary.fetched,
                    stored = summary.stored,
                    "Project synced"
                );
            }
        }
        Err(e) => error!("Sync aborted: {}", e),
    }

    if !args.no_notify {
        let attachments = match &config.logging.directory {
            Some(dir) => recent_log_files(dir, ATTACHED_LOG_DAYS, today).unwrap_or_else(|e| {
                warn!("Could not collect log files: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut report = ErrorReport::from_ledger(&run.ledger, attachments);
        if let Err(e) = &outcome {
            report = report.with_fatal(e);
        }
        if !report.is_empty() {
            let notifier = select_notifier(&config);
            if let Err(e) = notifier.notify(&report).await {
                error!("Error report delivery failed: {}", e);
                LogNotifier.notify(&report).await?;
            }
        }
    }

    outcome?;
    info!(run = %run.run_id, errors = run.ledger.total_codes(), "Sync complete");
    Ok(())
}

/// SMTP when `[mail]` is configured, the log otherwise
fn select_notifier(config: &AppConfig) -> Box<dyn Notifier> {
    if !config.mail.is_configured() {
        return Box::new(LogNotifier);
    }

    match config.mail.settings().and_then(|s| SmtpNotifier::from_settings(&s)) {
        Ok(notifier) => Box::new(notifier),
        Err(e) => {
            error!("Mail notifier unavailable, reporting to log: {}", e);
            Box::new(LogNotifier)
        }
    }
}
