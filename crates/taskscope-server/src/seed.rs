//! Cache seeding
//!
//! Walks a list of registry models, most-run first, and requests each
//! classification from a running service so later reads are cache hits.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// A model listed in the seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedModel {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub run_count: u64,
}

/// Seeding parameters
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Base URL of the service
    pub target: String,

    /// Pause after every response that was not a cache hit
    pub delay: Duration,
}

/// What a seeding run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub requested: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Read a JSON array of models
pub fn load_models(path: &Path) -> anyhow::Result<Vec<SeedModel>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// The `max` most-run models, highest run count first
pub fn most_run(mut models: Vec<SeedModel>, max: usize) -> Vec<SeedModel> {
    models.sort_by(|a, b| b.run_count.cmp(&a.run_count));
    models.truncate(max);
    models
}

/// Request each model's classification in order
///
/// Stops at the first non-success response.
pub async fn run_seed(
    client: &reqwest::Client,
    models: &[SeedModel],
    options: &SeedOptions,
) -> anyhow::Result<SeedReport> {
    let base = options.target.trim_end_matches('/');
    let mut report = SeedReport::default();

    for model in models {
        let url = format!("{}/api/models/{}/{}", base, model.owner, model.name);
        info!("{}", url);

        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting {}", url))?;

        let status = response.status();
        if !status.is_success() {
            error!("Seeding stopped at {}: {}", url, status);
            anyhow::bail!("{} returned {}", url, status);
        }

        report.requested += 1;
        let cached = response
            .headers()
            .get("x-cache")
            .and_then(|v| v.to_str().ok())
            == Some("HIT");

        if cached {
            report.hits += 1;
        } else {
            report.misses += 1;
            tokio::time::sleep(options.delay).await;
        }
    }

    info!(
        "Seeded {} models ({} already cached)",
        report.requested, report.hits
    );
    Ok(report)
}
