// src/fetch/mod.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use crate::{
    cache,
    config::{Config, FetchConfig, SourceFile},
};

pub mod freshness;
pub mod window;

pub use freshness::needs_fetch;
pub use window::{run_windows, FetchReport};

/// A source file judged stale, queued for one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub source: SourceFile,
}

/// Refreshes the local copies of the configured vendor files.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    sources: Vec<SourceFile>,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("building HTTP client")?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            config: config.fetch.clone(),
            sources: config.source_files()?,
        })
    }

    /// Tasks for every file the freshness gate rejects, in configured order.
    /// With `force` every file is queued.
    pub fn plan(&self, force: bool) -> Vec<FetchTask> {
        self.sources
            .iter()
            .filter(|source| {
                let stale = force || needs_fetch(&source.local_path, self.config.expire_hour);
                if !stale {
                    let cached_at = cache::modified(&source.local_path)
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                        .unwrap_or_default();
                    debug!(file = %source.id, %cached_at, "cache fresh, skipping");
                }
                stale
            })
            .map(|source| FetchTask {
                source: source.clone(),
            })
            .collect()
    }

    /// Download every stale file. Individual download failures are logged by
    /// the scheduler and never returned; only setup errors are.
    #[instrument(level = "info", skip(self))]
    pub async fn start(&self, force: bool) -> Result<FetchReport> {
        fs::create_dir_all(&self.config.cache_dir)
            .await
            .with_context(|| format!("creating {}", self.config.cache_dir.display()))?;

        let tasks = self.plan(force);
        info!(
            stale = tasks.len(),
            total = self.sources.len(),
            max_threads = self.config.max_threads,
            "planned fetch"
        );

        let limit = Duration::from_secs(self.config.timeout_secs);
        let report = run_windows(tasks, self.config.max_threads, limit, |task| {
            download(self.client.clone(), task.source.url)
        })
        .await;

        Ok(report)
    }
}

async fn download(client: Client, url: Url) -> Result<Vec<u8>> {
    let body = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    Ok(body.to_vec())
}
