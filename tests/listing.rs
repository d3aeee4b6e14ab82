mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use probhub::config::{ListingConfig, ScoringWeights};
use probhub::db::Repository;
use probhub::ingest::Orchestrator;
use probhub::models::{ProblemQuery, SignalType, SortMode};

use common::*;

/// Three StackExchange problems and one HN problem with known engagement and age.
async fn seeded() -> (tempfile::TempDir, Arc<Repository>) {
    let (dir, repo) = temp_repository().await;
    let orchestrator = Orchestrator::new(repo.clone(), ScoringWeights::default());
    let now = Utc::now();

    let questions = vec![
        se_question("money", 1, "Budget for 50% rent", 40, 5, now - Duration::days(30), &["budgeting", "housing"]),
        se_question("money", 2, "Saving on groceries", 5, 1, now - Duration::hours(2), &["budgeting"]),
        se_question("workplace", 3, "Manager ignores overtime", 20, 8, now - Duration::days(1), &["work"]),
    ];
    let se = StubConnector::new("stackexchange", questions);
    orchestrator
        .run("stackexchange", &se, &PassthroughNormalizer, None)
        .await
        .unwrap();

    let mut story = se_question("hn", 4, "Ask HN: rent keeps rising", 3, 0, now - Duration::days(3), &["housing"]);
    story.external_id = "4".into();
    let hn = StubConnector::new("hackernews", vec![story]);
    orchestrator
        .run("hackernews", &hn, &PassthroughNormalizer, None)
        .await
        .unwrap();

    (dir, repo)
}

async fn titles(repo: &Repository, query: ProblemQuery) -> Vec<String> {
    repo.list_problems(&query, &ListingConfig::default(), &ScoringWeights::default())
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|p| p.title)
        .collect()
}

#[tokio::test]
async fn newest_first_by_default() {
    let (_dir, repo) = seeded().await;
    assert_eq!(
        titles(&repo, ProblemQuery::default()).await,
        vec![
            "Saving on groceries",
            "Manager ignores overtime",
            "Ask HN: rent keeps rising",
            "Budget for 50% rent",
        ]
    );
}

#[tokio::test]
async fn top_uses_stored_score_and_trending_decays() {
    let (_dir, repo) = seeded().await;

    let top = titles(
        &repo,
        ProblemQuery {
            sort: SortMode::Top,
            ..Default::default()
        },
    )
    .await;
    assert_eq!(top[0], "Manager ignores overtime");

    let trending = titles(
        &repo,
        ProblemQuery {
            sort: SortMode::Trending,
            ..Default::default()
        },
    )
    .await;
    // A month of decay pulls the most upvoted question below fresher ones.
    assert_eq!(
        trending,
        vec![
            "Manager ignores overtime",
            "Saving on groceries",
            "Budget for 50% rent",
            "Ask HN: rent keeps rising",
        ]
    );
}

#[tokio::test]
async fn search_escapes_like_wildcards() {
    let (_dir, repo) = seeded().await;

    let hits = titles(
        &repo,
        ProblemQuery {
            q: Some("50%".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(hits, vec!["Budget for 50% rent"]);

    let hits = titles(
        &repo,
        ProblemQuery {
            q: Some("RENT".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn source_and_tag_filters_combine() {
    let (_dir, repo) = seeded().await;

    let housing = titles(
        &repo,
        ProblemQuery {
            tags: vec!["Housing".into()],
            ..Default::default()
        },
    )
    .await;
    assert_eq!(housing.len(), 2);

    let both = titles(
        &repo,
        ProblemQuery {
            tags: vec!["housing".into(), "budgeting".into()],
            ..Default::default()
        },
    )
    .await;
    assert_eq!(both, vec!["Budget for 50% rent"]);

    let from_hn = titles(
        &repo,
        ProblemQuery {
            source: Some("hackernews".into()),
            tags: vec!["housing".into()],
            ..Default::default()
        },
    )
    .await;
    assert_eq!(from_hn, vec!["Ask HN: rent keeps rising"]);
}

#[tokio::test]
async fn pagination_is_clamped() {
    let (_dir, repo) = seeded().await;
    let limits = ListingConfig::default();
    let weights = ScoringWeights::default();

    let page = repo
        .list_problems(
            &ProblemQuery {
                page: Some(0),
                page_size: Some(10_000),
                ..Default::default()
            },
            &limits,
            &weights,
        )
        .await
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, limits.max_page_size);
    assert_eq!(page.total, 4);

    let page = repo
        .list_problems(
            &ProblemQuery {
                page: Some(2),
                page_size: Some(3),
                ..Default::default()
            },
            &limits,
            &weights,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "Budget for 50% rent");
}

#[tokio::test]
async fn trending_pages_follow_live_score() {
    let (_dir, repo) = seeded().await;

    let page = repo
        .list_problems(
            &ProblemQuery {
                sort: SortMode::Trending,
                page: Some(2),
                page_size: Some(2),
                ..Default::default()
            },
            &ListingConfig::default(),
            &ScoringWeights::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    let titles: Vec<&str> = page.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Budget for 50% rent", "Ask HN: rent keeps rising"]);
}

#[tokio::test]
async fn detail_carries_tags_and_signals_attach() {
    let (_dir, repo) = seeded().await;
    let first = repo
        .list_problems(&ProblemQuery::default(), &ListingConfig::default(), &ScoringWeights::default())
        .await
        .unwrap()
        .items
        .remove(0);

    let detail = repo.get_problem(first.id).await.unwrap().unwrap();
    assert_eq!(detail.problem.title, "Saving on groceries");
    assert_eq!(detail.problem.tags, vec!["budgeting"]);
    assert_eq!(detail.problem.source, "stackexchange");
    assert!(detail.raw_event_id.is_some());

    repo.record_signal(first.id, SignalType::View, None).await.unwrap();
    repo.record_signal(first.id, SignalType::Bookmark, Some(json!({"from": "cli"})))
        .await
        .unwrap();
    assert_eq!(repo.count_signals(first.id).await.unwrap(), 2);

    assert!(repo.get_problem(9_999).await.unwrap().is_none());
}

#[tokio::test]
async fn catalogs_are_sorted() {
    let (_dir, repo) = seeded().await;

    let sources: Vec<String> = repo
        .list_sources()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.display_name)
        .collect();
    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);
    assert_eq!(sources.len(), 3);

    let tags: Vec<String> = repo.list_tags().await.unwrap().into_iter().map(|t| t.slug).collect();
    assert_eq!(tags, vec!["budgeting", "housing", "work"]);
}
