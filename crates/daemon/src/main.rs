use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Timelike, Utc};
use muv_content_daemon::config::{self, Config};
use muv_content_daemon::{build_router, AppState};
use muv_content_repair::{HtmlRepair, RepairConfig, RpcRepairer, DEFAULT_TIMEOUT};
use muv_content_storage::ContentRepository;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (cfg, mode) = parse_args()?;

    let root = env::var("MUV_CONTENT_ROOT")
        .ok()
        .or_else(|| cfg.storage.root.clone())
        .unwrap_or_else(|| "./data".to_owned());

    let listen = env::var("MUV_CONTENT_LISTEN")
        .ok()
        .or_else(|| cfg.server.listen.clone())
        .unwrap_or_else(|| "127.0.0.1:8088".to_owned());

    let database_url = env::var("DATABASE_URL")
        .ok()
        .or_else(|| cfg.storage.database_url.clone());

    let repo = ContentRepository::init(PathBuf::from(&root), database_url.as_deref()).await?;

    match mode.as_deref() {
        Some("run-once") => run_once(repo, &cfg).await,
        Some("normalize-slugs") => normalize_slugs(repo).await,
        None | Some("serve") => run_service(repo, &listen, &cfg).await,
        Some(other) => bail!("unknown mode: {other}"),
    }
}

/// Parse CLI args, returning the loaded config and optional subcommand.
fn parse_args() -> Result<(Config, Option<String>)> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut mode: Option<String> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() {
                    bail!("--config requires a path argument");
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            other => {
                mode = Some(other.to_owned());
            }
        }
        i += 1;
    }

    let cfg = match config_path {
        Some(path) => {
            info!(?path, "loading config file");
            config::load_config(&path)?
        }
        None => Config::default(),
    };

    Ok((cfg, mode))
}

fn repairer(cfg: &Config) -> Result<Option<Arc<dyn HtmlRepair>>> {
    let Some(endpoint) = env::var("MUV_REPAIR_ENDPOINT")
        .ok()
        .or_else(|| cfg.repair.endpoint.clone())
    else {
        info!("no repair endpoint configured, using local cleanup only");
        return Ok(None);
    };

    let repairer: Arc<dyn HtmlRepair> = Arc::new(RpcRepairer::new(RepairConfig {
        endpoint,
        api_key: env::var("MUV_REPAIR_API_KEY")
            .ok()
            .or_else(|| cfg.repair.api_key.clone()),
        timeout: cfg
            .repair
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })?);
    Ok(Some(repairer))
}

async fn run_once(repo: ContentRepository, cfg: &Config) -> Result<()> {
    let repairer = repairer(cfg)?;
    let report = repo
        .restore(&cfg.restore.options(), repairer.as_deref())
        .await?;
    println!("{}", render(&report, "restore report")?);
    Ok(())
}

async fn normalize_slugs(repo: ContentRepository) -> Result<()> {
    let report = repo.normalize_slugs().await?;
    info!(checked = report.checked, updated = report.updated.len(), "slug normalization finished");
    println!("{}", render(&report, "slug report")?);
    Ok(())
}

/// Pretty JSON for the reports the one-shot modes print on stdout.
fn render<T: Serialize>(report: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(report).with_context(|| format!("serialize {what}"))
}

async fn run_service(repo: ContentRepository, listen: &str, cfg: &Config) -> Result<()> {
    let retention_days = config::resolve_retention_days(
        env::var("MUV_CONTENT_RETENTION_DAYS").ok().as_deref(),
        &cfg.storage,
    )?;

    let state = AppState {
        repo: repo.clone(),
        repairer: repairer(cfg)?,
        restore_defaults: cfg.restore.options(),
        restore_gate: Arc::new(Mutex::new(())),
        retention_days,
        api_token: env::var("MUV_CONTENT_API_TOKEN")
            .ok()
            .or_else(|| cfg.security.api_token.clone()),
    };

    tokio::spawn(retention_loop(repo, retention_days));

    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address: {listen}"))?;
    let app = build_router(state);

    info!(%addr, "starting content service");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn retention_loop(repo: ContentRepository, retention_days: i64) {
    loop {
        let now = Utc::now();
        let secs_to_next_hour = 3600 - (now.minute() * 60 + now.second()) as u64;
        sleep(Duration::from_secs(secs_to_next_hour.max(1))).await;

        match repo.prune_backups_older_than_days(retention_days).await {
            Ok(removed) if removed > 0 => {
                info!(removed, retention_days, "retention pruning removed old backups")
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, retention_days, "retention pruning failed"),
        }
    }
}
