mod hackernews;
mod stackexchange;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::error::Result;
use crate::models::RawEventCandidate;

pub use hackernews::HackerNewsConnector;
pub use stackexchange::StackExchangeConnector;

/// Fetches candidate items from one external platform.
///
/// Per-item failures are logged and skipped; only a failure to list candidates
/// at all is returned as an error.
#[async_trait]
pub trait Connector: Send + Sync {
    fn source_name(&self) -> &str;

    /// `since` is advisory. Without it a connector fetches a capped recent window.
    async fn fetch_new_raw_events(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawEventCandidate>>;
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("probhub/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

fn from_epoch(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
