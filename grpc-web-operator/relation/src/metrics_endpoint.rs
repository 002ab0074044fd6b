//! The metrics-endpoint interface: this application tells a Prometheus
//! scraper which port and path to scrape on each of its units.

use crate::{Bag, Key, RelationStore};
use serde::{Deserialize, Serialize};

pub const SCRAPE_JOBS: &str = "scrape_jobs";
pub const SCRAPE_METADATA: &str = "scrape_metadata";

/// The path Envoy serves Prometheus metrics on, under its admin listener.
pub const ENVOY_METRICS_PATH: &str = "/stats/prometheus";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub metrics_path: String,
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// `host:port` pairs. A `*` host stands for every unit of the
    /// application.
    pub targets: Vec<String>,
}

/// Identifies the scraped application in the scraper's labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub model: String,
    pub application: String,
}

// === impl ScrapeJob ===

impl ScrapeJob {
    /// Scrapes `path` on `port` of every unit.
    pub fn all_units(port: u16, path: impl Into<String>) -> Self {
        Self {
            metrics_path: path.into(),
            static_configs: vec![StaticConfig {
                targets: vec![format!("*:{port}")],
            }],
        }
    }
}

/// The bags to write so that every scraper related on `endpoint` sees `jobs`.
/// Nothing is written when no scraper is related.
pub fn publish<S>(
    store: &S,
    endpoint: &str,
    jobs: &[ScrapeJob],
    metadata: &ScrapeMetadata,
) -> Result<Vec<(Key, Bag)>, serde_json::Error>
where
    S: RelationStore + ?Sized,
{
    let relations = store.relations(endpoint);
    if relations.is_empty() {
        return Ok(vec![]);
    }

    let bag = Bag::from([
        (SCRAPE_JOBS.to_string(), serde_json::to_string(jobs)?),
        (SCRAPE_METADATA.to_string(), serde_json::to_string(metadata)?),
    ]);
    Ok(relations
        .into_iter()
        .map(|relation| (relation.key.clone(), bag.clone()))
        .collect())
}
