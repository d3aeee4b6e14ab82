use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Forum,
    Qa,
    CodeRepo,
    ReviewSite,
    Social,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Forum => "forum",
            SourceType::Qa => "qa",
            SourceType::CodeRepo => "code_repo",
            SourceType::ReviewSite => "review_site",
            SourceType::Social => "social",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forum" => Some(SourceType::Forum),
            "qa" => Some(SourceType::Qa),
            "code_repo" => Some(SourceType::CodeRepo),
            "review_site" => Some(SourceType::ReviewSite),
            "social" => Some(SourceType::Social),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Active,
    Paused,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Active => "active",
            SourceStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SourceStatus::Active),
            "paused" => Some(SourceStatus::Paused),
            _ => None,
        }
    }
}

/// A configured upstream platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn is_active(&self) -> bool {
        self.status == SourceStatus::Active
    }
}
