use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::{SiteConfig, StackExchangeConfig};
use crate::error::{AppError, Result};
use crate::models::RawEventCandidate;

use super::{from_epoch, http_client, Connector};

const SOURCE_NAME: &str = "stackexchange";

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    items: Vec<Value>,
    quota_remaining: Option<i64>,
    error_message: Option<String>,
}

/// Top-voted questions from a fixed list of life-problem sites.
pub struct StackExchangeConnector {
    client: Client,
    config: StackExchangeConfig,
}

impl StackExchangeConnector {
    pub fn new(config: StackExchangeConfig) -> Result<Self> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn questions_url(&self, site: &SiteConfig, since: Option<DateTime<Utc>>) -> Result<Url> {
        let mut params = vec![
            ("site", site.slug.clone()),
            ("pagesize", site.limit.to_string()),
            ("sort", "votes".to_string()),
            ("order", "desc".to_string()),
            ("filter", "withbody".to_string()),
        ];
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            params.push(("key", key.to_string()));
        }
        if let Some(since) = since {
            params.push(("fromdate", since.timestamp().to_string()));
        }

        let base = format!(
            "{}/{}/questions",
            self.config.base_url.trim_end_matches('/'),
            self.config.version
        );
        Url::parse_with_params(&base, &params)
            .map_err(|e| AppError::Config(format!("invalid StackExchange URL {base}: {e}")))
    }

    async fn fetch_site(
        &self,
        site: &SiteConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawEventCandidate>> {
        let url = self.questions_url(site, since)?;
        let response = self.client.get(url).send().await?;

        // Check the status before decoding: errors may not be JSON
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<QuestionsResponse>(&text)
                .ok()
                .and_then(|body| body.error_message)
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(AppError::upstream(
                SOURCE_NAME,
                format!("{} returned HTTP {}: {}", site.slug, status, detail),
            ));
        }

        let body: QuestionsResponse = response.json().await?;
        if let Some(message) = body.error_message {
            return Err(AppError::upstream(
                SOURCE_NAME,
                format!("{} returned an error: {}", site.slug, message),
            ));
        }

        if let Some(remaining) = body.quota_remaining {
            if remaining < self.config.quota_warning_threshold {
                tracing::warn!("StackExchange quota low: {} requests remaining", remaining);
            } else {
                tracing::debug!("StackExchange quota remaining: {}", remaining);
            }
        }

        let fetched = body.items.len();
        let candidates: Vec<RawEventCandidate> = body
            .items
            .into_iter()
            .filter_map(|question| candidate_from_question(question, &site.slug))
            .collect();

        tracing::info!(
            "Fetched {} questions from {} ({} kept)",
            fetched,
            site.name,
            candidates.len()
        );
        Ok(candidates)
    }
}

#[async_trait]
impl Connector for StackExchangeConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_new_raw_events(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawEventCandidate>> {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let mut candidates = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for (idx, site) in self.config.sites.iter().enumerate() {
            // Pace requests between sites
            if idx > 0 {
                tokio::time::sleep(delay).await;
            }

            // One failing site does not sink the others
            match self.fetch_site(site, since).await {
                Ok(mut found) => candidates.append(&mut found),
                Err(e) => {
                    tracing::warn!("Skipping StackExchange site {}: {}", site.slug, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures > 0 && failures == self.config.sites.len() {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(AppError::upstream(
                SOURCE_NAME,
                format!("all {failures} sites failed; last error: {reason}"),
            ));
        }

        Ok(candidates)
    }
}

/// Tags the payload with its site and builds a site-qualified candidate.
/// Questions without a body are dropped.
fn candidate_from_question(mut question: Value, site: &str) -> Option<RawEventCandidate> {
    let question_id = question.get("question_id").and_then(Value::as_i64)?;
    let created_at = question
        .get("creation_date")
        .and_then(Value::as_i64)
        .and_then(from_epoch)?;

    let has_body = question
        .get("body")
        .and_then(Value::as_str)
        .is_some_and(|b| !b.trim().is_empty());
    if !has_body {
        return None;
    }

    let source_url = question
        .get("link")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://{site}.stackexchange.com/q/{question_id}"));

    if let Value::Object(map) = &mut question {
        map.insert("_site".to_string(), Value::String(site.to_string()));
    }

    Some(RawEventCandidate {
        external_id: format!("{site}:{question_id}"),
        external_parent_id: None,
        payload: question,
        created_at_source: created_at,
        source_url,
    })
}
