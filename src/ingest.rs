//! One ingestion run: fetch, dedupe, persist raw, normalize, score, persist
//! the problem with tags, and mark the raw event.
//!
//! A failing candidate never stops the run. It is counted, its raw event is
//! marked `error`, and it is picked up again by the next run.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ai::Normalizer;
use crate::config::ScoringWeights;
use crate::connectors::Connector;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{IngestionStats, NewProblem, RawEventCandidate, Source};
use crate::scoring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Skipped,
    Rejected,
    Created,
    /// Accepted, but a problem for this external item already existed.
    Duplicate,
}

pub struct Orchestrator {
    repo: Arc<Repository>,
    weights: ScoringWeights,
}

impl Orchestrator {
    pub fn new(repo: Arc<Repository>, weights: ScoringWeights) -> Self {
        Self { repo, weights }
    }

    pub async fn run(
        &self,
        source_name: &str,
        connector: &dyn Connector,
        normalizer: &dyn Normalizer,
        since: Option<DateTime<Utc>>,
    ) -> Result<IngestionStats> {
        let started_at = Utc::now();

        // Resolve the source and refuse paused ones
        let source = self
            .repo
            .get_source_by_name(source_name)
            .await?
            .ok_or_else(|| AppError::SourceNotFound(source_name.to_string()))?;
        if !source.is_active() {
            return Err(AppError::SourcePaused(source_name.to_string()));
        }

        tracing::info!("Starting ingestion for {}", source.display_name);

        // A failed listing fails the whole run
        let candidates = connector.fetch_new_raw_events(since).await?;

        let mut stats = IngestionStats {
            source: source.name.clone(),
            fetched: candidates.len(),
            processed: 0,
            problems_created: 0,
            rejected: 0,
            skipped: 0,
            errors: 0,
            started_at,
            completed_at: started_at,
        };

        for candidate in &candidates {
            match self.process(&source, candidate, normalizer).await {
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Ok(outcome) => {
                    stats.processed += 1;
                    match outcome {
                        Outcome::Created => stats.problems_created += 1,
                        Outcome::Rejected => stats.rejected += 1,
                        _ => {}
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::error!("Failed to ingest {}: {}", candidate.external_id, e);
                    self.record_failure(source.id, candidate, &e).await;
                }
            }
        }

        stats.completed_at = Utc::now();

        // Bookkeeping only: the run's rows are already committed
        if let Err(e) = self
            .repo
            .update_source_last_run(source.id, stats.completed_at)
            .await
        {
            tracing::warn!("Could not record last run for {}: {}", source.name, e);
        }

        tracing::info!(
            "Ingestion for {} finished: {} fetched, {} processed, {} new problems, {} errors",
            source.name,
            stats.fetched,
            stats.processed,
            stats.problems_created,
            stats.errors
        );
        Ok(stats)
    }

    async fn process(
        &self,
        source: &Source,
        candidate: &RawEventCandidate,
        normalizer: &dyn Normalizer,
    ) -> Result<Outcome> {
        // Already processed by an earlier run
        if let Some(existing) = self.repo.find_raw_event(source.id, &candidate.external_id).await? {
            if existing.is_processed() {
                tracing::debug!("Skipping already processed {}", candidate.external_id);
                return Ok(Outcome::Skipped);
            }
        }

        // Pending and error rows are reused
        let raw_event = self.repo.insert_raw_event_if_absent(source.id, candidate).await?;

        let Some(normalized) = normalizer.normalize(candidate).await? else {
            self.repo.mark_processed(raw_event.id).await?;
            return Ok(Outcome::Rejected);
        };

        let score = scoring::score(
            normalized.upvotes,
            normalized.comments_count,
            normalized.created_at_source,
            Utc::now(),
            &self.weights,
        );
        let problem = NewProblem::from_normalized(
            source.id,
            raw_event.id,
            &candidate.external_id,
            &normalized,
            score,
        );

        let outcome = match self.repo.insert_problem_if_absent(problem).await? {
            Some(problem_id) => {
                // Tags are only linked to a freshly inserted problem
                for label in &normalized.tags {
                    if let Some(tag) = self.repo.resolve_tag(label).await? {
                        self.repo.link_tag(problem_id, tag.id).await?;
                    }
                }
                tracing::debug!("Created problem {} from {}", problem_id, candidate.external_id);
                Outcome::Created
            }
            None => Outcome::Duplicate,
        };

        self.repo.mark_processed(raw_event.id).await?;
        Ok(outcome)
    }

    async fn record_failure(&self, source_id: i64, candidate: &RawEventCandidate, error: &AppError) {
        let detail = error.to_string();
        if let Err(e) = self
            .repo
            .mark_error(source_id, &candidate.external_id, &detail)
            .await
        {
            tracing::warn!(
                "Could not mark {} as failed: {}",
                candidate.external_id,
                e
            );
        }
    }
}
