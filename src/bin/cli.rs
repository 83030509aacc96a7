use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearing_sync as lib;
use lib::api::DocumentStore;
use lib::config::Config;
use lib::models::Credentials;
use lib::player::HeadlessPlayer;
use lib::resume::ResumePoint;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hearing-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config file and exit
    ConfigValidate,
    /// Manage the locally stored credentials
    Credentials {
        #[command(subcommand)]
        sub: CredentialCommands,
    },
    /// Check that the document store and the catalog are reachable
    TestConnections,
    /// Load state and catalog, and show where playback would resume
    Resume,
    /// Show the most recent playback history events
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Save credentials to the local settings store
    Set {
        #[arg(long)]
        drive_token: String,
        #[arg(long)]
        repo_token: String,
        #[arg(long)]
        folder_id: String,
    },
    /// Show which credential fields are set
    Show,
}

fn resolve_config_path(explicit: &Option<PathBuf>) -> PathBuf {
    if let Some(p) = explicit {
        return p.clone();
    }
    if let Some(dir) = dirs::config_dir() {
        let p = dir.join("hearing-sync").join("config.toml");
        if p.exists() {
            return p;
        }
    }
    PathBuf::from("config/example-config.toml")
}

fn load_credentials(cfg: &Config) -> Result<Credentials> {
    let conn = lib::db::open_or_create(&cfg.db_path)
        .with_context(|| format!("opening settings store {}", cfg.db_path.display()))?;
    Ok(lib::db::load_credentials(&conn)?.unwrap_or_default())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let resolved_config_path = resolve_config_path(&cli.config);

    if let Commands::ConfigValidate = cli.command {
        match Config::from_path(&resolved_config_path) {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // log -> tracing bridge; stderr plus a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    std::fs::create_dir_all(&cfg.log_dir)
        .with_context(|| format!("creating log dir {}", cfg.log_dir.display()))?;
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&cfg.log_dir, "hearing-sync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber_global::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    match cli.command {
        Commands::ConfigValidate => {}
        Commands::Credentials { sub } => match sub {
            CredentialCommands::Set { drive_token, repo_token, folder_id } => {
                let conn = lib::db::open_or_create(&cfg.db_path)?;
                let creds = Credentials::new(drive_token, repo_token, folder_id);
                lib::db::save_credentials(&conn, &creds)?;
                println!("Credentials saved to {} (stored unencrypted).", cfg.db_path.display());
            }
            CredentialCommands::Show => {
                let creds = load_credentials(&cfg)?;
                let mark = |s: &str| if s.trim().is_empty() { "missing" } else { "set" };
                println!("googleDriveToken: {}", mark(&creds.drive_token));
                println!("githubToken:      {}", mark(&creds.repo_token));
                println!("driveFolderId:    {}", mark(&creds.folder_id));
            }
        },
        Commands::TestConnections => {
            let creds = load_credentials(&cfg)?;
            let coordinator = lib::SyncCoordinator::from_config(&cfg);
            let report = coordinator.probe(&creds).await?;
            let show = |ok: bool| if ok { "Connected" } else { "Failed" };
            println!("Google Drive: {}", show(report.catalog));
            println!("GitHub: {}", show(report.document_store));
        }
        Commands::Resume => {
            let creds = load_credentials(&cfg)?;
            let coordinator = lib::SyncCoordinator::from_config(&cfg);
            let player = Arc::new(HeadlessPlayer::new());
            let session = coordinator.initialize(&creds, player.clone()).await?;
            let status = coordinator.status();
            println!(
                "Document store: {} | Catalog: {} ({} items)",
                status.get(lib::status::Service::DocumentStore),
                status.get(lib::status::Service::Catalog),
                session.catalog().len()
            );
            match session.resume_point() {
                ResumePoint::Matched { index, offset_seconds } => {
                    let label = session.catalog().get(index).map(|i| i.label()).unwrap_or_default();
                    println!("Resume: {} at {:.1}s (item {})", label, offset_seconds, index + 1);
                }
                ResumePoint::StartFromBeginning => {
                    let label = session.current_item().map(|i| i.label()).unwrap_or_default();
                    println!("Previous file not found; starting from the beginning: {}", label);
                }
                ResumePoint::NoItemAvailable => println!("No audio files found"),
            }
            if let Some(loc) = player.loaded_locator() {
                println!("Source: {}", loc);
            }
            session.shutdown().await;
        }
        Commands::History { limit } => {
            let creds = load_credentials(&cfg)?;
            if creds.repo_token.trim().is_empty() {
                anyhow::bail!("githubToken is not set; run `credentials set` first");
            }
            let store = lib::api::github::GithubDocumentStore::from_config(&cfg, &creds.repo_token)?;
            print_history(&store, limit).await?;
        }
    }

    Ok(())
}

async fn print_history(store: &dyn DocumentStore, limit: usize) -> Result<()> {
    let (doc, rev) = match store.read().await {
        Ok(v) => v,
        Err(lib::SyncError::NotFound) => {
            println!("No playback history yet.");
            return Ok(());
        }
        Err(e) => return Err(e).context("reading shared document"),
    };
    println!(
        "Current: {} at {:.1}s (updated {}, revision {})",
        doc.current_file_label, doc.current_offset_seconds, doc.last_updated, rev
    );
    let skip = doc.history.len().saturating_sub(limit);
    for ev in doc.history.iter().skip(skip) {
        println!("- {} | {:5} | {:8.1}s | {}", ev.occurred_at, ev.action.to_string(), ev.offset_seconds, ev.file_label);
    }
    Ok(())
}
