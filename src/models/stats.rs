use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one ingestion run over one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStats {
    pub source: String,
    pub fetched: usize,
    /// Raw events that reached `processed` during this run, problem or not.
    pub processed: usize,
    pub problems_created: usize,
    /// Normalized and judged not to be a problem.
    pub rejected: usize,
    /// Already processed by an earlier run.
    pub skipped: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
