//! Ranking score for normalized problems.
//!
//! Engagement terms are logarithmic so a single viral post cannot dominate;
//! age decays linearly with no hard cutoff. The result never drops below zero.

use chrono::{DateTime, Utc};

use crate::config::ScoringWeights;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn score(
    upvotes: i64,
    comments_count: i64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> f64 {
    let upvote_score = (1.0 + upvotes.max(0) as f64).ln() * weights.upvotes_multiplier;
    let comment_score = (1.0 + comments_count.max(0) as f64).ln() * weights.comments_multiplier;

    let age_days = (now - created_at).num_seconds() as f64 / SECONDS_PER_DAY;
    let decay = age_days * weights.age_decay_per_day;

    round2((upvote_score + comment_score - decay).max(0.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn fresh_item_has_no_decay() {
        let w = ScoringWeights::default();
        let expected = round2(13f64.ln() * 0.5 + 3f64.ln() * 0.3);
        assert_eq!(score(12, 2, now(), now(), &w), expected);
        assert_eq!(expected, 1.61);
    }

    #[test]
    fn one_day_old_item_loses_decay_weight() {
        let w = ScoringWeights::default();
        let created = now() - Duration::days(1);
        let expected = round2(13f64.ln() * 0.5 + 3f64.ln() * 0.3 - 0.05);
        assert_eq!(score(12, 2, created, now(), &w), expected);
    }

    #[test]
    fn monotonic_in_upvotes() {
        let w = ScoringWeights::default();
        let created = now() - Duration::hours(30);
        let mut last = 0.0;
        for upvotes in [0, 1, 2, 5, 10, 50, 100, 1_000, 100_000] {
            let s = score(upvotes, 4, created, now(), &w);
            assert!(s >= last, "score dropped at {upvotes} upvotes: {s} < {last}");
            last = s;
        }
    }

    #[test]
    fn non_increasing_with_age() {
        let w = ScoringWeights::default();
        let mut last = f64::MAX;
        for days in [0, 1, 2, 7, 30, 365] {
            let s = score(40, 10, now() - Duration::days(days), now(), &w);
            assert!(s <= last, "score grew at {days} days: {s} > {last}");
            last = s;
        }
    }

    #[test]
    fn never_negative() {
        let w = ScoringWeights::default();
        let ancient = now() - Duration::days(365 * 20);
        assert_eq!(score(0, 0, ancient, now(), &w), 0.0);
        assert_eq!(score(500, 80, ancient, now(), &w), 0.0);
    }

    #[test]
    fn weights_come_from_configuration() {
        let w = ScoringWeights {
            upvotes_multiplier: 1.0,
            comments_multiplier: 0.0,
            age_decay_per_day: 0.0,
        };
        assert_eq!(score(0, 1_000, now(), now(), &w), 0.0);
        assert_eq!(score(1, 0, now(), now(), &w), round2(2f64.ln()));
    }
}
