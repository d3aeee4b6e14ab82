#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use probhub::ai::{LanguageModel, Normalizer};
use probhub::config::LlmConfig;
use probhub::connectors::Connector;
use probhub::db::Repository;
use probhub::error::{AppError, Result};
use probhub::models::{NormalizedProblem, RawEventCandidate};

/// A file-backed repository that lives as long as the returned directory.
pub async fn temp_repository() -> (TempDir, Arc<Repository>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probhub.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, Arc::new(repo))
}

pub fn fast_retries() -> LlmConfig {
    LlmConfig {
        max_retries: 3,
        retry_delay_ms: 1,
        ..Default::default()
    }
}

pub struct StubConnector {
    name: &'static str,
    candidates: Vec<RawEventCandidate>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubConnector {
    pub fn new(name: &'static str, candidates: Vec<RawEventCandidate>) -> Self {
        Self {
            name,
            candidates,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StubConnector {
    fn source_name(&self) -> &str {
        self.name
    }

    async fn fetch_new_raw_events(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawEventCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::upstream(self.name, "listing endpoint returned HTTP 503"));
        }
        Ok(self.candidates.clone())
    }
}

type Reply = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// A model whose answer is computed from the user prompt.
pub struct ScriptedModel {
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(reply: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(content: &str) -> Arc<Self> {
        let content = content.to_string();
        Self::new(move |_| Ok(content.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(user_prompt)
    }

    fn model_version(&self) -> &str {
        "scripted"
    }
}

/// Accepts every candidate, reading the problem fields straight from the payload.
pub struct PassthroughNormalizer;

#[async_trait]
impl Normalizer for PassthroughNormalizer {
    async fn normalize(&self, candidate: &RawEventCandidate) -> Result<Option<NormalizedProblem>> {
        let p = &candidate.payload;
        let tags = p["tags"]
            .as_array()
            .map(|tags| tags.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Ok(Some(NormalizedProblem {
            title: p["title"].as_str().unwrap_or_default().to_string(),
            description: p["body"].as_str().unwrap_or_default().to_string(),
            source_url: candidate.source_url.clone(),
            created_at_source: candidate.created_at_source,
            author_handle: None,
            upvotes: p["score"].as_i64().unwrap_or(0),
            comments_count: p["answer_count"].as_i64().unwrap_or(0),
            tags,
            language: None,
        }))
    }
}

pub fn problem_json(title: &str, tags: &[&str]) -> String {
    json!({
        "isProblem": true,
        "title": title,
        "description": format!("{title}. People keep running into this."),
        "tags": tags,
        "reasoning": "clear pain point"
    })
    .to_string()
}

pub fn not_a_problem_json() -> String {
    json!({"isProblem": false, "reasoning": "announcement"}).to_string()
}

pub fn hn_story(id: u64, title: &str, created_at: DateTime<Utc>) -> RawEventCandidate {
    RawEventCandidate {
        external_id: id.to_string(),
        external_parent_id: None,
        payload: json!({
            "id": id,
            "type": "story",
            "by": "someone",
            "time": created_at.timestamp(),
            "title": title,
            "text": format!("<p>{title}</p>"),
            "score": 10,
            "descendants": 4
        }),
        created_at_source: created_at,
        source_url: format!("https://news.ycombinator.com/item?id={id}"),
    }
}

pub fn se_question(
    site: &str,
    id: i64,
    title: &str,
    score: i64,
    answers: i64,
    created_at: DateTime<Utc>,
    tags: &[&str],
) -> RawEventCandidate {
    let payload: Value = json!({
        "question_id": id,
        "title": title,
        "body": format!("<p>{title}?</p>"),
        "score": score,
        "answer_count": answers,
        "view_count": 100,
        "creation_date": created_at.timestamp(),
        "tags": tags,
        "owner": {"display_name": "asker"},
        "_site": site
    });
    RawEventCandidate {
        external_id: format!("{site}:{id}"),
        external_parent_id: None,
        payload,
        created_at_source: created_at,
        source_url: format!("https://{site}.stackexchange.com/q/{id}"),
    }
}
