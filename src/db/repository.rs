use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::{json, Value};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    slugify, IngestionStatus, NewProblem, RawEvent, RawEventCandidate, SignalType, Source,
    SourceStatus, SourceType, Tag, TagType,
};

use super::schema::SCHEMA;

/// SQLite-backed store shared by the ingestion pipeline and the listing queries.
///
/// Every mutation is a single idempotent statement (insert-if-absent,
/// update-by-id or insert-on-conflict-do-nothing), so concurrent runs over the
/// same source cannot produce duplicate rows.
pub struct Repository {
    pub(super) conn: Connection,
}

struct SeedSource {
    name: &'static str,
    display_name: &'static str,
    source_type: SourceType,
    status: SourceStatus,
    api_base_url: &'static str,
    description: &'static str,
}

const SEED_SOURCES: &[SeedSource] = &[
    SeedSource {
        name: "hackernews",
        display_name: "Hacker News",
        source_type: SourceType::Forum,
        status: SourceStatus::Active,
        api_base_url: "https://hacker-news.firebaseio.com/v0",
        description: "Ask HN posts where people share problems and pain points",
    },
    SeedSource {
        name: "stackexchange",
        display_name: "StackExchange",
        source_type: SourceType::Qa,
        status: SourceStatus::Active,
        api_base_url: "https://api.stackexchange.com/2.3",
        description: "Real-world problems from 12 StackExchange sites covering personal finance, workplace, parenting, travel, and more",
    },
    SeedSource {
        name: "github",
        display_name: "GitHub Issues",
        source_type: SourceType::CodeRepo,
        status: SourceStatus::Paused,
        api_base_url: "https://api.github.com",
        description: "Feature requests and bug reports from popular repositories",
    },
];

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        let repo = Self { conn };
        repo.seed_sources().await?;
        Ok(repo)
    }

    // Source operations

    /// Upserts the built-in source catalog. Status is only set on first insert so
    /// an operator's pause survives reopening the database.
    pub async fn seed_sources(&self) -> Result<()> {
        let rows: Vec<_> = SEED_SOURCES
            .iter()
            .map(|s| {
                let metadata = json!({
                    "apiBaseUrl": s.api_base_url,
                    "description": s.description,
                });
                (
                    s.name,
                    s.display_name,
                    s.source_type.as_str(),
                    s.status.as_str(),
                    metadata.to_string(),
                )
            })
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (name, display_name, source_type, status, metadata) in rows {
                    tx.execute(
                        r#"INSERT INTO sources (name, display_name, type, status, metadata)
                           VALUES (?1, ?2, ?3, ?4, ?5)
                           ON CONFLICT(name) DO UPDATE SET
                               display_name = excluded.display_name,
                               type = excluded.type,
                               metadata = excluded.metadata,
                               updated_at = datetime('now')"#,
                        params![name, display_name, source_type, status, metadata],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_source_by_name(&self, name: &str) -> Result<Option<Source>> {
        let name = name.to_string();
        let source = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, display_name, type, status, metadata, last_run_at FROM sources WHERE name = ?1",
                )?;
                let source = stmt.query_row(params![name], source_from_row).optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    pub async fn set_source_status(&self, name: &str, status: SourceStatus) -> Result<bool> {
        let name = name.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE sources SET status = ?1, updated_at = datetime('now') WHERE name = ?2",
                    params![status.as_str(), name],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(changed)
    }

    pub async fn update_source_last_run(&self, source_id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = format_datetime(&at);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET last_run_at = ?1, updated_at = datetime('now') WHERE id = ?2",
                    params![at, source_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Raw event operations

    pub async fn find_raw_event(&self, source_id: i64, external_id: &str) -> Result<Option<RawEvent>> {
        let external_id = external_id.to_string();
        let event = self
            .conn
            .call(move |conn| Ok(select_raw_event(conn, source_id, &external_id)?))
            .await?;
        Ok(event)
    }

    /// Creates a `pending` raw event unless one already exists for
    /// `(source_id, external_id)`; either way returns the stored row.
    pub async fn insert_raw_event_if_absent(
        &self,
        source_id: i64,
        candidate: &RawEventCandidate,
    ) -> Result<RawEvent> {
        let external_id = candidate.external_id.clone();
        let parent_id = candidate.external_parent_id.clone();
        let payload = serde_json::to_string(&candidate.payload)?;
        let fetched_at = format_datetime(&Utc::now());

        let event = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO raw_events (source_id, external_id, external_parent_id, payload, fetched_at, ingestion_status)
                       VALUES (?1, ?2, ?3, ?4, ?5, 'pending')
                       ON CONFLICT(source_id, external_id) DO NOTHING"#,
                    params![source_id, external_id, parent_id, payload, fetched_at],
                )?;
                let event = select_raw_event(conn, source_id, &external_id)?
                    .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                Ok(event)
            })
            .await?;
        Ok(event)
    }

    pub async fn mark_processed(&self, raw_event_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE raw_events SET ingestion_status = 'processed', ingestion_error = NULL WHERE id = ?1",
                    params![raw_event_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Keyed by external id so it also works when the failure came before the row id was known.
    pub async fn mark_error(
        &self,
        source_id: i64,
        external_id: &str,
        detail: &str,
    ) -> Result<()> {
        let external_id = external_id.to_string();
        let detail = detail.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE raw_events SET ingestion_status = 'error', ingestion_error = ?1
                       WHERE source_id = ?2 AND external_id = ?3"#,
                    params![detail, source_id, external_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Problem operations

    /// Returns the new row id, or `None` when the external item already has a problem.
    pub async fn insert_problem_if_absent(&self, problem: NewProblem) -> Result<Option<i64>> {
        let fts = problem.search_text();
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO problems (source_id, raw_event_id, external_id, title, description, source_url,
                                             author_handle, created_at_source, language, upvotes, comments_count, score, fts)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                       ON CONFLICT(source_id, external_id) DO NOTHING"#,
                    params![
                        problem.source_id,
                        problem.raw_event_id,
                        problem.external_id,
                        problem.title,
                        problem.description,
                        problem.source_url,
                        problem.author_handle,
                        format_datetime(&problem.created_at_source),
                        problem.language,
                        problem.upvotes,
                        problem.comments_count,
                        problem.score,
                        fts,
                    ],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;
        Ok(id)
    }

    /// Finds or creates the tag for a proposed label. Blank labels resolve to `None`.
    pub async fn resolve_tag(&self, label: &str) -> Result<Option<Tag>> {
        let slug = slugify(label);
        if slug.is_empty() {
            return Ok(None);
        }
        let name = label.trim().to_string();

        let tag = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tags (slug, name, type) VALUES (?1, ?2, ?3) ON CONFLICT(slug) DO NOTHING",
                    params![slug, name, TagType::System.as_str()],
                )?;
                let tag = conn.query_row(
                    "SELECT id, slug, name, type FROM tags WHERE slug = ?1",
                    params![slug],
                    tag_from_row,
                )?;
                Ok(tag)
            })
            .await?;
        Ok(Some(tag))
    }

    pub async fn link_tag(&self, problem_id: i64, tag_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO problem_tags (problem_id, tag_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                    params![problem_id, tag_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Engagement signals

    pub async fn record_signal(
        &self,
        problem_id: i64,
        signal: SignalType,
        metadata: Option<Value>,
    ) -> Result<i64> {
        let metadata = metadata.map(|m| m.to_string());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO problem_signals (problem_id, type, metadata) VALUES (?1, ?2, ?3)",
                    params![problem_id, signal.as_str(), metadata],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn count_signals(&self, problem_id: i64) -> Result<u64> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM problem_signals WHERE problem_id = ?1",
                    params![problem_id],
                    |row| row.get(0),
                )?;
                Ok(count.max(0) as u64)
            })
            .await?;
        Ok(count)
    }
}

fn select_raw_event(
    conn: &rusqlite::Connection,
    source_id: i64,
    external_id: &str,
) -> rusqlite::Result<Option<RawEvent>> {
    conn.query_row(
        r#"SELECT id, source_id, external_id, external_parent_id, payload, fetched_at, ingestion_status, ingestion_error
           FROM raw_events WHERE source_id = ?1 AND external_id = ?2"#,
        params![source_id, external_id],
        raw_event_from_row,
    )
    .optional()
}

pub(super) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(super) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub(super) fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| conversion_error(idx, format!("invalid timestamp {raw:?}")))
}

fn optional_datetime_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("invalid timestamp {raw:?}"))),
        None => Ok(None),
    }
}

fn json_column(row: &Row, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn enum_column<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("unexpected value {raw:?}")))
}

pub(super) fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    let metadata = match row.get::<_, Option<String>>(5)? {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| conversion_error(5, e.to_string()))?),
        None => None,
    };
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        source_type: enum_column(row, 3, SourceType::parse)?,
        status: enum_column(row, 4, SourceStatus::parse)?,
        metadata,
        last_run_at: optional_datetime_column(row, 6)?,
    })
}

fn raw_event_from_row(row: &Row) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        source_id: row.get(1)?,
        external_id: row.get(2)?,
        external_parent_id: row.get(3)?,
        payload: json_column(row, 4)?,
        fetched_at: datetime_column(row, 5)?,
        status: enum_column(row, 6, IngestionStatus::parse)?,
        error: row.get(7)?,
    })
}

pub(super) fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        tag_type: enum_column(row, 3, TagType::parse)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(external_id: &str) -> RawEventCandidate {
        RawEventCandidate {
            external_id: external_id.to_string(),
            external_parent_id: None,
            payload: json!({ "title": "t", "score": 7 }),
            created_at_source: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
            source_url: format!("https://example.com/{external_id}"),
        }
    }

    fn new_problem(source_id: i64, raw_event_id: i64, external_id: &str) -> NewProblem {
        NewProblem {
            source_id,
            raw_event_id,
            external_id: external_id.to_string(),
            title: "Budgeting with irregular income".into(),
            description: "Freelancers struggle to plan monthly spending.".into(),
            source_url: "https://money.stackexchange.com/q/42".into(),
            author_handle: Some("jane".into()),
            created_at_source: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
            language: "en".into(),
            upvotes: 12,
            comments_count: 2,
            score: 1.61,
        }
    }

    #[tokio::test]
    async fn seeded_sources_are_present() {
        let repo = Repository::open_in_memory().await.unwrap();

        let hn = repo.get_source_by_name("hackernews").await.unwrap().unwrap();
        assert_eq!(hn.source_type, SourceType::Forum);
        assert!(hn.is_active());

        let gh = repo.get_source_by_name("github").await.unwrap().unwrap();
        assert_eq!(gh.status, SourceStatus::Paused);
        assert!(repo.get_source_by_name("reddit").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reseeding_keeps_operator_pause() {
        let repo = Repository::open_in_memory().await.unwrap();
        assert!(repo.set_source_status("hackernews", SourceStatus::Paused).await.unwrap());

        repo.seed_sources().await.unwrap();

        let hn = repo.get_source_by_name("hackernews").await.unwrap().unwrap();
        assert_eq!(hn.status, SourceStatus::Paused);
    }

    #[tokio::test]
    async fn raw_event_insert_is_idempotent() {
        let repo = Repository::open_in_memory().await.unwrap();
        let source = repo.get_source_by_name("stackexchange").await.unwrap().unwrap();

        let first = repo.insert_raw_event_if_absent(source.id, &candidate("money:1")).await.unwrap();
        assert_eq!(first.status, IngestionStatus::Pending);
        assert_eq!(first.payload["score"], 7);

        repo.mark_processed(first.id).await.unwrap();
        let second = repo.insert_raw_event_if_absent(source.id, &candidate("money:1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_processed());
    }

    #[tokio::test]
    async fn error_detail_is_recorded_and_cleared() {
        let repo = Repository::open_in_memory().await.unwrap();
        let source = repo.get_source_by_name("hackernews").await.unwrap().unwrap();
        let event = repo.insert_raw_event_if_absent(source.id, &candidate("77")).await.unwrap();

        repo.mark_error(source.id, "77", "boom").await.unwrap();
        let errored = repo.find_raw_event(source.id, "77").await.unwrap().unwrap();
        assert_eq!(errored.status, IngestionStatus::Error);
        assert_eq!(errored.error.as_deref(), Some("boom"));

        repo.mark_processed(event.id).await.unwrap();
        let done = repo.find_raw_event(source.id, "77").await.unwrap().unwrap();
        assert!(done.is_processed());
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn problem_insert_is_noop_on_conflict() {
        let repo = Repository::open_in_memory().await.unwrap();
        let source = repo.get_source_by_name("stackexchange").await.unwrap().unwrap();
        let event = repo.insert_raw_event_if_absent(source.id, &candidate("money:42")).await.unwrap();

        let first = repo.insert_problem_if_absent(new_problem(source.id, event.id, "money:42")).await.unwrap();
        let second = repo.insert_problem_if_absent(new_problem(source.id, event.id, "money:42")).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn tags_are_reused_by_slug() {
        let repo = Repository::open_in_memory().await.unwrap();

        let a = repo.resolve_tag("Home Improvement").await.unwrap().unwrap();
        let b = repo.resolve_tag("home   improvement").await.unwrap().unwrap();

        assert_eq!(a.slug, "home-improvement");
        assert_eq!(a.name, "Home Improvement");
        assert_eq!(a.tag_type, TagType::System);
        assert_eq!(a.id, b.id);
        assert!(repo.resolve_tag("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signals_are_appended() {
        let repo = Repository::open_in_memory().await.unwrap();
        let source = repo.get_source_by_name("stackexchange").await.unwrap().unwrap();
        let event = repo.insert_raw_event_if_absent(source.id, &candidate("money:9")).await.unwrap();
        let problem_id = repo
            .insert_problem_if_absent(new_problem(source.id, event.id, "money:9"))
            .await
            .unwrap()
            .unwrap();

        repo.record_signal(problem_id, SignalType::View, None).await.unwrap();
        repo.record_signal(problem_id, SignalType::Bookmark, Some(json!({ "from": "list" })))
            .await
            .unwrap();

        assert_eq!(repo.count_signals(problem_id).await.unwrap(), 2);
    }

    #[test]
    fn parses_both_timestamp_formats() {
        let a = parse_datetime("2026-01-11T12:34:56Z").unwrap();
        let b = parse_datetime("2026-01-11 12:34:56").unwrap();
        assert_eq!(a, b);
        assert_eq!(format_datetime(&a), "2026-01-11T12:34:56Z");
    }
}
