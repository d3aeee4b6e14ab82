//! Read-side queries backing the browse UI: paginated listing, detail lookup,
//! and the source/tag catalogs used to populate filters.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::config::{ListingConfig, ScoringWeights};
use crate::error::Result;
use crate::models::{
    slugify, ProblemDetail, ProblemPage, ProblemQuery, ProblemWithTags, SortMode, Source, Tag,
};
use crate::scoring;

use super::repository::{
    datetime_column, parse_datetime, source_from_row, tag_from_row, Repository,
};

const PROBLEM_COLUMNS: &str = r#"p.id, p.title, p.description, s.name, p.source_url, p.created_at_source,
    p.upvotes, p.comments_count, p.score, p.author_handle, p.language, p.raw_event_id"#;

impl Repository {
    pub async fn list_problems(
        &self,
        query: &ProblemQuery,
        limits: &ListingConfig,
        weights: &ScoringWeights,
    ) -> Result<ProblemPage> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size.max(1));
        let offset = (page as u64 - 1) * page_size as u64;

        let (where_clause, filter_params) = build_filter(query);
        let sort = query.sort;
        let weights = *weights;

        let (mut items, total) = self
            .conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM problems p JOIN sources s ON s.id = p.source_id {where_clause}"
                    ),
                    params_from_iter(filter_params.iter()),
                    |row| row.get(0),
                )?;

                let order = match sort {
                    SortMode::New => "p.created_at_source DESC, p.id DESC",
                    SortMode::Top => "p.score DESC, p.created_at_source DESC, p.id DESC",
                    SortMode::Trending => {
                        register_live_score(conn, weights, Utc::now())?;
                        "live_score(p.upvotes, p.comments_count, p.created_at_source) DESC, p.created_at_source DESC, p.id DESC"
                    }
                };
                let sql = format!(
                    "SELECT {PROBLEM_COLUMNS} FROM problems p JOIN sources s ON s.id = p.source_id {where_clause} ORDER BY {order} LIMIT {page_size} OFFSET {offset}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params_from_iter(filter_params.iter()), problem_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok((items, total.max(0) as u64))
            })
            .await?;

        self.attach_tags(&mut items).await?;

        Ok(ProblemPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn get_problem(&self, id: i64) -> Result<Option<ProblemDetail>> {
        let found = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {PROBLEM_COLUMNS} FROM problems p JOIN sources s ON s.id = p.source_id WHERE p.id = ?1"
                );
                let found = conn
                    .query_row(&sql, params![id], |row| {
                        Ok((problem_from_row(row)?, row.get::<_, Option<i64>>(11)?))
                    })
                    .optional()?;
                Ok(found)
            })
            .await?;

        let Some((problem, raw_event_id)) = found else {
            return Ok(None);
        };

        let mut items = vec![problem];
        self.attach_tags(&mut items).await?;
        let problem = items.remove(0);

        Ok(Some(ProblemDetail {
            problem,
            raw_event_id,
        }))
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, display_name, type, status, metadata, last_run_at FROM sources ORDER BY display_name",
                )?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, slug, name, type FROM tags ORDER BY name")?;
                let tags = stmt
                    .query_map([], tag_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    async fn attach_tags(&self, items: &mut [ProblemWithTags]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = items.iter().map(|p| p.id).collect();
        let mut by_problem: HashMap<i64, Vec<String>> = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    r#"SELECT pt.problem_id, t.slug FROM problem_tags pt
                       JOIN tags t ON t.id = pt.tag_id
                       WHERE pt.problem_id IN ({placeholders})
                       ORDER BY t.slug"#
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
                let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (problem_id, slug) = row?;
                    grouped.entry(problem_id).or_default().push(slug);
                }
                Ok(grouped)
            })
            .await?;

        for item in items.iter_mut() {
            item.tags = by_problem.remove(&item.id).unwrap_or_default();
        }
        Ok(())
    }
}

/// Builds the shared WHERE clause and its positional parameters.
fn build_filter(query: &ProblemQuery) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        conditions.push(r"(p.title LIKE ? ESCAPE '\' OR p.description LIKE ? ESCAPE '\')".to_string());
        values.push(SqlValue::Text(pattern.clone()));
        values.push(SqlValue::Text(pattern));
    }

    if let Some(source) = query.source.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("s.name = ?".to_string());
        values.push(SqlValue::Text(source.to_string()));
    }

    for tag in &query.tags {
        let slug = slugify(tag);
        if slug.is_empty() {
            continue;
        }
        conditions.push(
            r#"EXISTS (SELECT 1 FROM problem_tags pt JOIN tags t ON t.id = pt.tag_id
                       WHERE pt.problem_id = p.id AND t.slug = ?)"#
                .to_string(),
        );
        values.push(SqlValue::Text(slug));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Registers `live_score(upvotes, comments_count, created_at_source)`, the
/// ranking score as of `now`, so trending can order and page in SQL.
fn register_live_score(
    conn: &rusqlite::Connection,
    weights: ScoringWeights,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.create_scalar_function("live_score", 3, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let upvotes: i64 = ctx.get(0)?;
        let comments_count: i64 = ctx.get(1)?;
        let raw: String = ctx.get(2)?;
        let created_at = parse_datetime(&raw).ok_or_else(|| {
            rusqlite::Error::UserFunctionError(format!("invalid timestamp {raw:?}").into())
        })?;
        Ok(scoring::score(upvotes, comments_count, created_at, now, &weights))
    })
}

fn problem_from_row(row: &Row) -> rusqlite::Result<ProblemWithTags> {
    Ok(ProblemWithTags {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        source: row.get(3)?,
        source_url: row.get(4)?,
        created_at_source: datetime_column(row, 5)?,
        upvotes: row.get(6)?,
        comments_count: row.get(7)?,
        score: row.get(8)?,
        tags: Vec::new(),
        author_handle: row.get(9)?,
        language: row.get(10)?,
    })
}
