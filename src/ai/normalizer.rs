//! LLM-driven normalization of raw events into structured problems.
//!
//! [`ProblemJudge`] owns the model call, retry/backoff and verdict validation.
//! The per-source normalizers only build prompts from their payload shape and
//! merge source metadata onto an accepted verdict.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{AppError, Result};
use crate::models::{NormalizedProblem, RawEventCandidate};

use super::client::LanguageModel;
use super::prompts::{
    hackernews_prompt, html_to_text, stackexchange_prompt, StackExchangePromptInput, SYSTEM_PROMPT,
};

pub const MAX_TITLE_CHARS: usize = 120;

/// Turns a raw candidate into a problem, or `None` when it is not one.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, candidate: &RawEventCandidate) -> Result<Option<NormalizedProblem>>;
}

/// The model's JSON answer. `reasoning` is for logs only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_problem: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Parses and validates a completion. Accepted problems always carry a title
/// and a description; the title is cut to [`MAX_TITLE_CHARS`].
pub fn parse_verdict(content: &str) -> Result<Verdict> {
    let mut verdict: Verdict = serde_json::from_str(content.trim())
        .map_err(|e| AppError::MalformedCompletion(e.to_string()))?;

    if verdict.is_problem {
        verdict.title = verdict.title.trim().chars().take(MAX_TITLE_CHARS).collect();
        verdict.description = verdict.description.trim().to_string();
        if verdict.title.is_empty() || verdict.description.is_empty() {
            return Err(AppError::MalformedCompletion(
                "problem verdict is missing title or description".into(),
            ));
        }
        verdict.tags = verdict
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    Ok(verdict)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Delay after a failed `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Shared model-call core used by every source normalizer.
pub struct ProblemJudge {
    llm: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    max_body_chars: usize,
}

impl ProblemJudge {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self {
            llm,
            retry: RetryPolicy::from_config(config),
            max_body_chars: config.max_body_chars,
        }
    }

    pub fn max_body_chars(&self) -> usize {
        self.max_body_chars
    }

    /// Asks the model for a verdict, retrying transient failures with exponential backoff.
    pub async fn judge(&self, external_id: &str, user_prompt: &str) -> Result<Option<Verdict>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match self.llm.complete(SYSTEM_PROMPT, user_prompt).await {
                Ok(content) => parse_verdict(&content),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(verdict) if verdict.is_problem => {
                    tracing::debug!("{} judged a problem: {}", external_id, verdict.reasoning);
                    return Ok(Some(verdict));
                }
                Ok(verdict) => {
                    tracing::debug!("{} is not a problem: {}", external_id, verdict.reasoning);
                    return Ok(None);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        "LLM attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        external_id,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(AppError::Normalization {
                        external_id: external_id.to_string(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn int_field(payload: &Value, key: &str) -> i64 {
    payload.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn accept(candidate: &RawEventCandidate, verdict: Verdict) -> NormalizedProblem {
    NormalizedProblem {
        title: verdict.title,
        description: verdict.description,
        source_url: candidate.source_url.clone(),
        created_at_source: candidate.created_at_source,
        author_handle: None,
        upvotes: 0,
        comments_count: 0,
        tags: verdict.tags,
        language: None,
    }
}

pub struct HackerNewsNormalizer {
    judge: ProblemJudge,
}

impl HackerNewsNormalizer {
    pub fn new(judge: ProblemJudge) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Normalizer for HackerNewsNormalizer {
    async fn normalize(&self, candidate: &RawEventCandidate) -> Result<Option<NormalizedProblem>> {
        let payload = &candidate.payload;
        let score = int_field(payload, "score");
        let descendants = int_field(payload, "descendants");
        let text = html_to_text(str_field(payload, "text").unwrap_or_default());

        let prompt = hackernews_prompt(
            str_field(payload, "title").unwrap_or_default(),
            &text,
            descendants,
            score,
            self.judge.max_body_chars(),
        );

        let Some(verdict) = self.judge.judge(&candidate.external_id, &prompt).await? else {
            return Ok(None);
        };

        Ok(Some(NormalizedProblem {
            author_handle: str_field(payload, "by").map(str::to_string),
            upvotes: score,
            comments_count: descendants,
            ..accept(candidate, verdict)
        }))
    }
}

pub struct StackExchangeNormalizer {
    judge: ProblemJudge,
}

impl StackExchangeNormalizer {
    pub fn new(judge: ProblemJudge) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Normalizer for StackExchangeNormalizer {
    async fn normalize(&self, candidate: &RawEventCandidate) -> Result<Option<NormalizedProblem>> {
        let payload = &candidate.payload;
        let score = int_field(payload, "score");
        let answers = int_field(payload, "answer_count");
        let body = html_to_text(str_field(payload, "body").unwrap_or_default());
        let tags: Vec<String> = payload
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let prompt = stackexchange_prompt(
            &StackExchangePromptInput {
                site: str_field(payload, "_site").unwrap_or("unknown"),
                title: str_field(payload, "title").unwrap_or_default(),
                body: &body,
                score,
                views: int_field(payload, "view_count"),
                answers,
                tags: &tags,
            },
            self.judge.max_body_chars(),
        );

        let Some(verdict) = self.judge.judge(&candidate.external_id, &prompt).await? else {
            return Ok(None);
        };

        let author = payload
            .get("owner")
            .and_then(|owner| str_field(owner, "display_name"))
            .map(str::to_string);

        Ok(Some(NormalizedProblem {
            author_handle: author,
            upvotes: score,
            comments_count: answers,
            ..accept(candidate, verdict)
        }))
    }
}
