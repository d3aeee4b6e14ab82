use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::HackerNewsConfig;
use crate::error::{AppError, Result};
use crate::models::RawEventCandidate;

use super::{from_epoch, http_client, Connector};

const SOURCE_NAME: &str = "hackernews";

/// The fields the prefilter needs. The stored payload stays the verbatim JSON.
#[derive(Debug, Deserialize)]
struct HnItem {
    id: u64,
    #[serde(default)]
    time: i64,
    text: Option<String>,
    score: Option<i64>,
    parent: Option<u64>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

/// Ask HN stories: people describing their own problems.
pub struct HackerNewsConnector {
    client: Client,
    config: HackerNewsConfig,
}

impl HackerNewsConnector {
    pub fn new(config: HackerNewsConfig) -> Result<Self> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_story_ids(&self) -> Result<Vec<u64>> {
        let response = self.client.get(self.url("askstories.json")).send().await?;

        if !response.status().is_success() {
            return Err(AppError::upstream(
                SOURCE_NAME,
                format!("askstories returned HTTP {}", response.status()),
            ));
        }

        Ok(response.json().await?)
    }

    /// `None` when the item does not exist (HN returns `null`).
    async fn fetch_item(&self, id: u64) -> Result<Option<Value>> {
        let response = self.client.get(self.url(&format!("item/{id}.json"))).send().await?;

        if !response.status().is_success() {
            return Err(AppError::upstream(
                SOURCE_NAME,
                format!("item {} returned HTTP {}", id, response.status()),
            ));
        }

        let item: Value = response.json().await?;
        Ok((!item.is_null()).then_some(item))
    }
}

#[async_trait]
impl Connector for HackerNewsConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_new_raw_events(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawEventCandidate>> {
        let ids = self.fetch_story_ids().await?;
        tracing::info!("Found {} Ask HN stories", ids.len());

        // Fetch items with bounded concurrency, keeping list order
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let items: Vec<Option<Value>> = stream::iter(ids.into_iter().take(self.config.story_limit))
            .map(|id| async move {
                let item = match self.fetch_item(id).await {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::warn!("Failed to fetch HN item {}: {}", id, e);
                        None
                    }
                };
                tokio::time::sleep(delay).await;
                item
            })
            .buffered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        // Drop missing items, then apply the prefilter
        let candidates: Vec<RawEventCandidate> = items
            .into_iter()
            .flatten()
            .filter_map(|item| candidate_from_item(item, self.config.min_score, since))
            .collect();

        tracing::info!("Fetched {} candidate HN stories", candidates.len());
        Ok(candidates)
    }
}

/// Applies the prefilter (has text, enough score, newer than `since`) and builds a candidate.
fn candidate_from_item(
    payload: Value,
    min_score: i64,
    since: Option<DateTime<Utc>>,
) -> Option<RawEventCandidate> {
    let item: HnItem = match serde_json::from_value(payload.clone()) {
        Ok(item) => item,
        Err(e) => {
            tracing::debug!("Skipping unparseable HN item: {}", e);
            return None;
        }
    };

    if item.deleted || item.dead {
        return None;
    }
    if item.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return None;
    }
    if item.score.unwrap_or(0) < min_score {
        return None;
    }

    let created_at = from_epoch(item.time)?;
    if since.is_some_and(|since| created_at <= since) {
        return None;
    }

    Some(RawEventCandidate {
        external_id: item.id.to_string(),
        external_parent_id: item.parent.map(|p| p.to_string()),
        source_url: format!("https://news.ycombinator.com/item?id={}", item.id),
        created_at_source: created_at,
        payload,
    })
}
