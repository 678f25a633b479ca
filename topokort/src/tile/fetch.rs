//! Resilient two-pass tile fetching.
//!
//! The first pass loads every tile of a mosaic with bounded concurrency and
//! collects failures instead of aborting. The second pass retries only the
//! failed subset at lower concurrency. Tiles still missing afterwards are
//! painted [`FAILED_TILE_COLOR`] and counted against the page's failure
//! ratio.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use image::RgbaImage;
use tracing::{debug, error, info, instrument, warn};

use super::mosaic::Mosaic;
use super::retry::{with_retry, RetryPolicy};
use super::TileError;
use crate::cache::{TileCache, TileLoadError};
use crate::config::FetchPolicy;
use crate::provider::{Auth, HttpClient};

/// Placeholder colour for tiles that could not be fetched (`#e0e0e0`).
pub const FAILED_TILE_COLOR: [u8; 3] = [0xe0, 0xe0, 0xe0];

/// One tile to load and where it goes in the mosaic grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileTask {
    pub url: String,
    pub x: u32,
    pub y: u32,
}

/// Outcome of fetching one mosaic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub total: usize,
    pub first_pass_failed: usize,
    pub recovered: usize,
    pub failed: usize,
}

impl FetchReport {
    pub fn merge(&mut self, other: FetchReport) {
        self.total += other.total;
        self.first_pass_failed += other.first_pass_failed;
        self.recovered += other.recovered;
        self.failed += other.failed;
    }
}

/// Loads tiles through the session cache with retries.
pub struct TileFetcher<'a, C> {
    client: &'a Arc<C>,
    cache: &'a TileCache,
    policy: &'a FetchPolicy,
}

impl<'a, C: HttpClient + 'static> TileFetcher<'a, C> {
    pub fn new(client: &'a Arc<C>, cache: &'a TileCache, policy: &'a FetchPolicy) -> Self {
        Self { client, cache, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        self.policy
    }

    pub fn client(&self) -> &C {
        self.client
    }

    /// Loads one image through the cache, retrying transient failures and
    /// invalidating the cache entry before each retry.
    pub async fn load(&self, url: &str, auth: &Auth, retry: &RetryPolicy) -> Result<Arc<RgbaImage>, TileLoadError> {
        let request_url = auth.apply_to_url(url);
        let request_url = request_url.as_str();
        with_retry(retry, "tile", move |attempt| {
            if attempt > 0 {
                self.cache.invalidate(request_url);
            }
            self.load_cached(request_url, auth)
        })
        .await
    }

    async fn load_cached(&self, request_url: &str, auth: &Auth) -> Result<Arc<RgbaImage>, TileLoadError> {
        let client = Arc::clone(self.client);
        let url = request_url.to_string();
        let basic = auth.basic().cloned();
        let retry = RetryPolicy::for_requests(self.policy);
        self.cache
            .get_or_fetch(request_url, move || async move {
                let body = with_retry(&retry, "request", |_| client.get(&url, basic.as_ref())).await?;
                decode(&url, &body).map(Arc::new)
            })
            .await
    }

    /// Runs one pass over `tasks`, returning the failures.
    async fn pass(
        &self,
        tasks: Vec<TileTask>,
        concurrency: usize,
        auth: &Auth,
        mosaic: &mut Mosaic,
    ) -> Vec<(TileTask, TileLoadError)> {
        let retry = RetryPolicy::for_passes(self.policy);
        let retry = &retry;
        let mut results = stream::iter(tasks)
            .map(|task| async move {
                let result = self.load(&task.url, auth, retry).await;
                (task, result)
            })
            .buffer_unordered(concurrency.max(1));

        let mut failures = Vec::new();
        while let Some((task, result)) = results.next().await {
            match result {
                Ok(tile) => mosaic.place(task.x, task.y, &tile),
                Err(e) => failures.push((task, e)),
            }
        }
        failures
    }

    /// Fetches `tasks` into `mosaic`, filling tiles that fail both passes.
    ///
    /// Returns [`TileError::Fatal`] when the failure ratio exceeds the
    /// policy threshold.
    #[instrument(skip_all, fields(source = label, tiles = tasks.len()))]
    pub async fn fetch_mosaic(
        &self,
        label: &str,
        tasks: Vec<TileTask>,
        auth: &Auth,
        mosaic: &mut Mosaic,
    ) -> Result<FetchReport, TileError> {
        let total = tasks.len();
        let first_failures = self.pass(tasks, self.policy.concurrency, auth, mosaic).await;
        for (task, e) in &first_failures {
            warn!(url = %task.url, error = %e, "First-pass tile failure");
        }

        let first_pass_failed = first_failures.len();
        let final_failures = if first_failures.is_empty() {
            Vec::new()
        } else {
            let retry_tasks = first_failures.into_iter().map(|(task, _)| task).collect();
            self.pass(retry_tasks, self.policy.retry_concurrency, auth, mosaic).await
        };

        for (task, e) in &final_failures {
            warn!(url = %task.url, error = %e, "Tile failed after retries");
            mosaic.fill(task.x, task.y, FAILED_TILE_COLOR);
        }

        let report = FetchReport {
            total,
            first_pass_failed,
            recovered: first_pass_failed - final_failures.len(),
            failed: final_failures.len(),
        };
        if report.recovered > 0 {
            info!(recovered = report.recovered, first_pass_failed, "Recovered initially failed tiles");
        }
        if report.failed > 0 {
            error!(failed = report.failed, total, "Tiles failed");
        }
        if let Some(err @ TileError::Fatal { .. }) =
            TileError::classify(report.failed, total, self.policy.fatal_failure_ratio)
        {
            return Err(err);
        }

        debug!(total, failed = report.failed, "Mosaic fetch complete");
        Ok(report)
    }
}

fn decode(url: &str, body: &Bytes) -> Result<RgbaImage, TileLoadError> {
    image::load_from_memory(body)
        .map(|img| img.to_rgba8())
        .map_err(|e| TileLoadError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}
