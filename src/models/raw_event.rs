use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    #[default]
    Pending,
    Processed,
    Error,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Processed => "processed",
            IngestionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IngestionStatus::Pending),
            "processed" => Some(IngestionStatus::Processed),
            "error" => Some(IngestionStatus::Error),
            _ => None,
        }
    }
}

/// One item as returned by a connector, before it touches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEventCandidate {
    /// Platform-scoped id, e.g. `"12345"` for HN or `"money:12345"` for StackExchange.
    pub external_id: String,
    pub external_parent_id: Option<String>,
    /// Verbatim upstream JSON; schema-less by contract.
    pub payload: Value,
    pub created_at_source: DateTime<Utc>,
    pub source_url: String,
}

/// A persisted capture of one fetched external item.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub external_parent_id: Option<String>,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
    pub status: IngestionStatus,
    pub error: Option<String>,
}

impl RawEvent {
    pub fn is_processed(&self) -> bool {
        self.status == IngestionStatus::Processed
    }
}
