//! CLI command implementations.

use crate::SyncArgs;
use canopy_core::config::require;
use canopy_core::{RootsFile, Settings, SyncMode};
use canopy_drive::{DriveClient, DriveConfig, ListingService};
use canopy_feed::{sync_feed, SupabaseConfig, SupabaseStore, TelegramConfig, TelegramFeed};
use canopy_ledger::{
    fetch_access_token, FirestoreLedger, Ledger, RealtimeLedger, ServiceAccount, SledLedger,
    FIRESTORE_BASE_URL,
};
use canopy_sync::{CancellationToken, Orchestrator, SyncRun, TopicOutcome};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const CONFIG_FILE: &str = "canopy.json";

/// Write a starter roots file.
pub fn init(path: &Path) -> Result<()> {
    let file = if path.is_dir() {
        path.join(CONFIG_FILE)
    } else {
        path.to_path_buf()
    };

    if file.exists() {
        println!("{} Already initialized ({})", "✓".green(), file.display());
        return Ok(());
    }

    RootsFile::template().save(&file)?;

    println!("{} Wrote {}", "✓".green(), file.display());
    println!("  Fill in folder ids, then run {}", "canopy check".cyan());

    Ok(())
}

/// Builds run settings from the roots file and flags.
fn load_settings(args: &SyncArgs) -> Result<Settings> {
    let roots = RootsFile::load(&args.config)?;
    let lookback = Duration::from_secs(args.lookback_hours.saturating_mul(3600));
    let settings = Settings::new(args.mode, lookback, roots.roots)
        .with_request_timeout(Duration::from_secs(args.timeout_secs));
    settings.validate()?;
    Ok(settings)
}

/// Where records go for this invocation.
enum Target {
    Local(PathBuf),
    Remote {
        db_url: String,
        account: ServiceAccount,
    },
}

/// Everything needed for a run, checked without touching the network.
struct Plan {
    settings: Settings,
    api_key: String,
    target: Target,
}

fn plan(args: &SyncArgs) -> Result<Plan> {
    let settings = load_settings(args)?;
    let api_key = require("GOOGLE_API_KEY", args.api_key.as_deref())?;

    let target = match &args.local {
        Some(dir) => Target::Local(dir.clone()),
        None => {
            let db_url = require("FIREBASE_DB_URL", args.db_url.as_deref())?;
            let blob = require("FIREBASE_SERVICE_ACCOUNT", args.service_account.as_deref())?;
            Target::Remote {
                db_url,
                account: ServiceAccount::from_json(&blob)?,
            }
        }
    };

    Ok(Plan {
        settings,
        api_key,
        target,
    })
}

async fn open_ledgers(target: &Target, timeout: Duration) -> Result<Vec<Arc<dyn Ledger>>> {
    match target {
        Target::Local(dir) => {
            let db = sled::open(dir)?;
            let ledgers: Vec<Arc<dyn Ledger>> = vec![
                Arc::new(SledLedger::from_db(&db, "realtime")?),
                Arc::new(SledLedger::from_db(&db, "documents")?),
            ];
            Ok(ledgers)
        }
        Target::Remote { db_url, account } => {
            let http = reqwest::Client::new();
            let token = fetch_access_token(&http, account, timeout).await?;
            let ledgers: Vec<Arc<dyn Ledger>> = vec![
                Arc::new(RealtimeLedger::new(
                    http.clone(),
                    db_url,
                    Some(token.clone()),
                    timeout,
                )?),
                Arc::new(FirestoreLedger::new(
                    http,
                    FIRESTORE_BASE_URL,
                    &account.project_id,
                    Some(token),
                    timeout,
                )?),
            ];
            Ok(ledgers)
        }
    }
}

/// Run one sync pass.
pub async fn sync(args: &SyncArgs) -> Result<()> {
    let plan = plan(args)?;
    let timeout = plan.settings.request_timeout;

    println!(
        "{} {} sync over {} roots",
        "Starting".cyan(),
        plan.settings.mode,
        plan.settings.roots.len()
    );

    let drive: Arc<dyn ListingService> = Arc::new(DriveClient::new(
        DriveConfig::new(plan.api_key.as_str()).with_timeout(timeout),
    )?);
    let ledgers = open_ledgers(&plan.target, timeout).await?;

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone())?;

    let run = Orchestrator::new(plan.settings, drive, ledgers)
        .with_cancellation(cancel)
        .run()
        .await;

    print_summary(&run);
    Ok(())
}

/// Cancels `cancel` on Ctrl-C, or on SIGTERM from a scheduler.
fn cancel_on_shutdown(cancel: CancellationToken) -> std::io::Result<()> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        #[cfg(not(unix))]
        let _ = tokio::signal::ctrl_c().await;

        warn!("Shutdown requested, stopping after the current root");
        cancel.cancel();
    });
    Ok(())
}

fn print_summary(run: &SyncRun) {
    println!();
    for report in &run.topics {
        match &report.outcome {
            TopicOutcome::Synced {
                found,
                new,
                skipped_folders,
                ledger_failures,
                placeholders,
            } => {
                let mut notes = Vec::new();
                if *placeholders > 0 {
                    notes.push("placeholder".to_string());
                }
                if *skipped_folders > 0 {
                    notes.push(format!("{} folders skipped", skipped_folders));
                }
                if *ledger_failures > 0 {
                    notes.push(format!("{} write failures", ledger_failures));
                }
                let mark = if *skipped_folders > 0 || *ledger_failures > 0 {
                    "⚠".yellow()
                } else {
                    "✓".green()
                };
                println!(
                    "  {} {} {} new of {} {}",
                    mark,
                    report.topic.cyan(),
                    new,
                    found,
                    if notes.is_empty() {
                        String::new()
                    } else {
                        format!("({})", notes.join(", "))
                    }
                    .dimmed()
                );
            }
            TopicOutcome::NoSource => {
                println!("  {} {} {}", "-".dimmed(), report.topic, "no source".dimmed());
            }
            TopicOutcome::Failed { reason } => {
                println!("  {} {} {}", "✗".red(), report.topic.red(), reason);
            }
        }
    }

    println!(
        "\n{} {} new records in {:.1}s",
        "✓".green(),
        run.total_new.to_string().cyan(),
        run.elapsed.as_secs_f64()
    );
    if run.failed_count() > 0 {
        println!("{} {} roots failed", "⚠".yellow(), run.failed_count());
    }
    if run.interrupted {
        println!("{} Interrupted before every root was processed", "⚠".yellow());
    }
}

/// Validate configuration and list the roots.
pub fn check(args: &SyncArgs) -> Result<()> {
    let plan = plan(args)?;
    let settings = &plan.settings;

    println!("{} {} is valid", "✓".green(), args.config.display());
    println!("  Mode: {}", settings.mode.to_string().cyan());
    if settings.mode == SyncMode::Incremental {
        println!("  Lookback: {}h", settings.lookback.as_secs() / 3600);
    }
    match &plan.target {
        Target::Local(dir) => println!("  Ledgers: local ({})", dir.display()),
        Target::Remote { account, .. } => {
            println!("  Ledgers: realtime + documents ({})", account.project_id)
        }
    }

    println!("\n{} roots:", settings.roots.len());
    for root in &settings.roots {
        if root.has_source() {
            println!("  {} {}", root.topic.cyan(), root.folder.dimmed());
        } else {
            println!("  {} {}", root.topic, "no source".yellow());
        }
    }

    Ok(())
}

/// Run one feed pass.
pub async fn feed(
    bot_token: Option<&str>,
    channel: Option<&str>,
    supabase_url: Option<&str>,
    supabase_key: Option<&str>,
) -> Result<()> {
    let bot_token = require("TELEGRAM_BOT_TOKEN", bot_token)?;
    let channel = require("TELEGRAM_CHANNEL", channel)?;
    let supabase_url = require("SUPABASE_URL", supabase_url)?;
    let supabase_key = require("SUPABASE_KEY", supabase_key)?;

    let http = reqwest::Client::new();
    let source = TelegramFeed::new(http.clone(), TelegramConfig::new(bot_token, channel))?;
    let store = SupabaseStore::new(http, SupabaseConfig::new(supabase_url, supabase_key))?;

    let run = sync_feed(&source, &store, &store).await?;

    println!(
        "{} Stored {} messages ({} skipped), cursor {} -> {}",
        "✓".green(),
        run.stored.to_string().cyan(),
        run.skipped,
        run.cursor_before,
        run.cursor_after
    );
    if let Some(reason) = run.stopped_by {
        println!("{} Stopped early: {}", "⚠".yellow(), reason);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: PathBuf) -> SyncArgs {
        SyncArgs {
            config,
            mode: SyncMode::Full,
            lookback_hours: 48,
            timeout_secs: 15,
            local: None,
            api_key: Some("key".into()),
            service_account: None,
            db_url: None,
        }
    }

    #[test]
    fn test_init_writes_template_once() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let file = dir.path().join(CONFIG_FILE);
        let roots = RootsFile::load(&file).unwrap();
        assert_eq!(roots.roots.len(), 2);

        std::fs::write(&file, r#"{"roots":[]}"#).unwrap();
        init(dir.path()).unwrap();
        assert_eq!(RootsFile::load(&file).unwrap().roots.len(), 0);
    }

    #[test]
    fn test_local_plan_needs_no_database_credentials() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let mut args = args(dir.path().join(CONFIG_FILE));
        args.local = Some(dir.path().join("ledger"));

        let plan = plan(&args).unwrap();
        assert!(matches!(plan.target, Target::Local(_)));
        assert_eq!(plan.settings.roots.len(), 2);
    }

    #[test]
    fn test_remote_plan_requires_database_url() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let err = plan(&args(dir.path().join(CONFIG_FILE))).err().unwrap();
        assert!(err.to_string().contains("FIREBASE_DB_URL"));
    }

    #[test]
    fn test_missing_api_key_fails_before_anything_else() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let mut args = args(dir.path().join(CONFIG_FILE));
        args.api_key = Some("   ".into());
        let err = plan(&args).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_timeout_flag_reaches_settings() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let mut args = args(dir.path().join(CONFIG_FILE));
        args.local = Some(dir.path().join("ledger"));
        args.timeout_secs = 40;
        let plan = plan(&args).unwrap();
        assert_eq!(plan.settings.request_timeout, Duration::from_secs(40));

        args.timeout_secs = 0;
        assert!(plan_err(&args).contains("request_timeout"));
    }

    fn plan_err(args: &SyncArgs) -> String {
        match plan(args) {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_cancels_run() {
        let cancel = CancellationToken::new();
        cancel_on_shutdown(cancel.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_local_ledgers_use_two_trees() {
        let dir = tempdir().unwrap();
        let ledgers = open_ledgers(&Target::Local(dir.path().join("db")), Duration::from_secs(1))
            .await
            .unwrap();

        let names: Vec<_> = ledgers.iter().map(|l| l.name().to_string()).collect();
        assert_eq!(names, vec!["realtime", "documents"]);
    }
}
