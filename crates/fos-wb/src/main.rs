//! fOS-WB: Zero-Bloat Web Browser
//!
//! Content filter front end. Loads the filter engines, keeps remote lists
//! fresh in the background and answers block/allow for URLs read from
//! stdin, one per line.

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::AppConfig;
use fos_adblock::{BypassScripts, FilterCache, RequestFilter, Verdict};
use fos_network::{FilterUpdateManager, HttpClient, RefreshJob};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "fos-wb")]
#[command(about = "fOS-WB content filter")]
struct Cli {
    /// Config file (default: <config dir>/fos-wb/adblock.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip remote filter list updates
    #[arg(long)]
    no_update: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read URLs from stdin and print a verdict for each (default)
    Check,
    /// Load the filters and print engine status as JSON
    Status,
    /// Print the anti-detection scripts injected into pages
    Scripts,
    /// Refresh remote filter lists once and exit
    Update,
}

type Manager = Arc<FilterUpdateManager<HttpClient>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, verdicts to stdout
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Check);

    if let Command::Scripts = command {
        // The generic script already embeds the object spoofing
        println!("{}", BypassScripts::get().generic);
        return Ok(());
    }

    let manager = if config.updates.enabled && !cli.no_update {
        match FilterUpdateManager::new(config.updates.clone(), HttpClient::with_defaults()) {
            Ok(manager) => Some(Arc::new(manager)),
            Err(e) => {
                warn!("Remote filter updates unavailable: {}", e);
                None
            }
        }
    } else {
        info!("Remote filter updates disabled");
        None
    };

    match command {
        Command::Update => update_once(manager).await,
        Command::Status => {
            let filter = build_filter(&config, manager.as_ref());
            filter.preload().await;
            println!("{}", serde_json::to_string_pretty(&filter.status_report())?);
            Ok(())
        }
        Command::Check | Command::Scripts => {
            let filter = build_filter(&config, manager.as_ref());
            filter.preload().await;
            check_stdin(filter, manager).await
        }
    }
}

fn build_filter(config: &AppConfig, manager: Option<&Manager>) -> Arc<RequestFilter> {
    let cache = manager.map(|m| Arc::clone(m) as Arc<dyn FilterCache>);
    RequestFilter::from_config(&config.adblock, cache)
}

async fn update_once(manager: Option<Manager>) -> Result<()> {
    let Some(manager) = manager else {
        anyhow::bail!("Remote filter updates are disabled");
    };

    let summary = manager.refresh().await;
    info!(
        "Refresh finished: {} healthy, {} failed, {} changed",
        summary.healthy, summary.failed, summary.changed
    );
    if !summary.succeeded() {
        anyhow::bail!("{} filter sources failed to refresh", summary.failed);
    }
    Ok(())
}

async fn check_stdin(filter: Arc<RequestFilter>, manager: Option<Manager>) -> Result<()> {
    let (stop, shutdown) = watch::channel(false);
    let job = manager.map(|manager| {
        let filter = Arc::clone(&filter);
        RefreshJob::new(manager).spawn(shutdown, move || {
            let filter = Arc::clone(&filter);
            async move { filter.reload().await }
        })
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let url = line.trim();
        if url.is_empty() {
            continue;
        }
        let out = match filter.check(url) {
            Verdict::Allow => format!("ALLOW\t{}\n", url),
            Verdict::Block(reason) => format!("BLOCK\t{}\t{}\n", url, reason),
        };
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    let _ = stop.send(true);
    if let Some(job) = job {
        if let Err(e) = job.await {
            warn!("Refresh job ended abnormally: {}", e);
        }
    }
    filter.status_report().log_summary();
    info!("fOS-WB shutting down");
    Ok(())
}
