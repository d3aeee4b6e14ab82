use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured output of one normalization. Folded into a `Problem` row or dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProblem {
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub created_at_source: DateTime<Utc>,
    pub author_handle: Option<String>,
    pub upvotes: i64,
    pub comments_count: i64,
    pub tags: Vec<String>,
    pub language: Option<String>,
}

/// Insert payload for the `problems` table.
#[derive(Debug, Clone)]
pub struct NewProblem {
    pub source_id: i64,
    pub raw_event_id: i64,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub author_handle: Option<String>,
    pub created_at_source: DateTime<Utc>,
    pub language: String,
    pub upvotes: i64,
    pub comments_count: i64,
    pub score: f64,
}

impl NewProblem {
    pub fn from_normalized(
        source_id: i64,
        raw_event_id: i64,
        external_id: &str,
        normalized: &NormalizedProblem,
        score: f64,
    ) -> Self {
        Self {
            source_id,
            raw_event_id,
            external_id: external_id.to_string(),
            title: normalized.title.clone(),
            description: normalized.description.clone(),
            source_url: normalized.source_url.clone(),
            author_handle: normalized.author_handle.clone(),
            created_at_source: normalized.created_at_source,
            language: normalized
                .language
                .clone()
                .unwrap_or_else(|| "en".to_string()),
            upvotes: normalized.upvotes,
            comments_count: normalized.comments_count,
            score,
        }
    }

    /// Text matched by free-text listing queries.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemWithTags {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub source: String,
    pub source_url: String,
    pub created_at_source: DateTime<Utc>,
    pub upvotes: i64,
    pub comments_count: i64,
    pub score: f64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(flatten)]
    pub problem: ProblemWithTags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_event_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    New,
    Top,
    /// Live score: recency decay re-applied at query time.
    Trending,
}

#[derive(Debug, Clone, Default)]
pub struct ProblemQuery {
    pub q: Option<String>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub sort: SortMode,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemPage {
    pub items: Vec<ProblemWithTags>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
