use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use lode_core::config::{self, LoaderConfig};
use lode_core::loader::Loader;
use lode_core::transport::HttpTransport;

/// Top-level CLI for the lode asset batch loader.
#[derive(Debug, Parser)]
#[command(name = "lode")]
#[command(about = "lode: bounded-concurrency asset batch loader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a batch of URLs through the loader.
    Get {
        /// URLs to fetch (absolute, or relative to --base-url).
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory to write payloads into.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Cap on simultaneous downloads (overrides config).
        #[arg(long)]
        jobs: Option<usize>,

        /// Prefix prepended to relative URLs (overrides config).
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Show the active configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                out,
                jobs,
                base_url,
            } => run_get(cfg, urls, out, jobs, base_url).await,
            CliCommand::Config => {
                println!("{:#?}", cfg);
                Ok(())
            }
        }
    }
}

async fn run_get(
    mut cfg: LoaderConfig,
    urls: Vec<String>,
    out: Option<PathBuf>,
    jobs: Option<usize>,
    base_url: Option<String>,
) -> Result<()> {
    if let Some(jobs) = jobs {
        cfg.max_parallel_downloads = jobs.max(1);
    }
    if let Some(base) = base_url {
        cfg.base_url = base;
    }

    let out_dir = out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let mut loader = Loader::new(Arc::new(HttpTransport::default()), cfg);
    let mut handles = Vec::new();
    for url in &urls {
        let key = file_name_for(url);
        handles.push(loader.register(&key, url)?);
    }

    let mut rx = loader.subscribe_progress();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let p = *rx.borrow();
            if p.total == 0 {
                continue;
            }
            eprintln!("loaded {}/{} ({:.0}%)", p.settled(), p.total, p.fraction() * 100.0);
            if p.settled() == p.total {
                break;
            }
        }
    });

    let summary = loader.start().await?;
    let _ = printer.await;

    for handle in handles {
        match handle.await {
            Ok(file) => {
                let data = file.data.unwrap_or_default();
                let path = out_dir.join(&file.key);
                std::fs::write(&path, &data)
                    .with_context(|| format!("write {}", path.display()))?;
                tracing::info!(key = %file.key, bytes = data.len(), "saved");
                println!("{}  {} bytes", path.display(), data.len());
            }
            Err(failure) => eprintln!("failed: {}", failure),
        }
    }

    if summary.failed > 0 {
        anyhow::bail!("{} of {} downloads failed", summary.failed, summary.total);
    }
    Ok(())
}

/// Derives a local filename from a URL: last path segment, query/fragment
/// stripped, sanitized for the filesystem.
fn file_name_for(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let candidate = trimmed.rsplit('/').next().unwrap_or("");
    let cleaned: String = candidate
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        "download.bin".to_string()
    } else {
        cleaned
    }
}
