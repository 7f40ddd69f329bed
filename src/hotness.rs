//! # Hotness Scorer
//!
//! Pure functions mapping `(publishedAt, points, comments, source)` to a
//! decayed popularity score. The score is recomputed from current inputs on
//! every fetch and is never read back from storage as an input.
//!
//! Formula: `exp(-ageHours / 12) * (1 + ln(1 + points + 2*comments)) * sourceWeight`,
//! rounded to 3 decimal places. Missing engagement counts as 0. Future
//! timestamps (negative age) are accepted: recency exceeds 1 and the score
//! keeps growing, which is fine for display ranking.

use chrono::{DateTime, Utc};

/// Half-life style decay constant, in hours.
const DECAY_HOURS: f64 = 12.0;

/// Per-source trust/impact multiplier. Unknown sources get 1.0.
pub fn source_weight(source: &str) -> f64 {
    match source {
        "hackernews" => 1.3,
        _ => 1.0,
    }
}

/// Score against an explicit `now`, for deterministic evaluation.
pub fn score_at(
    now: DateTime<Utc>,
    published_at: DateTime<Utc>,
    points: Option<i64>,
    comment_count: Option<i64>,
    source: &str,
) -> f64 {
    let age_hours = (now - published_at).num_seconds() as f64 / 3600.0;
    let recency = (-age_hours / DECAY_HOURS).exp();
    let engagement_raw = points.unwrap_or(0) as f64 + 2.0 * comment_count.unwrap_or(0) as f64;
    let engagement = 1.0 + (1.0 + engagement_raw).ln();
    round3(recency * engagement * source_weight(source))
}

/// Score as of now. This is what the fetch path uses.
pub fn score(
    published_at: DateTime<Utc>,
    points: Option<i64>,
    comment_count: Option<i64>,
    source: &str,
) -> f64 {
    score_at(Utc::now(), published_at, points, comment_count, source)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn worked_example_at_age_zero() {
        // points=100, comments=50, weight 1.3, age 0:
        // (1) * (1 + ln(201)) * 1.3 = 8.194 after rounding.
        let now = Utc::now();
        let s = score_at(now, now, Some(100), Some(50), "hackernews");
        assert_eq!(s, 8.194);
    }

    #[test]
    fn missing_engagement_counts_as_zero() {
        let now = Utc::now();
        // ln(1) = 0 -> engagement factor 1.0, weight 1.0.
        let s = score_at(now, now, None, None, "unknown");
        assert_eq!(s, 1.0);
    }

    #[test]
    fn future_timestamps_do_not_panic_or_nan() {
        let now = Utc::now();
        let s = score_at(
            now,
            now + Duration::hours(6),
            Some(10),
            Some(0),
            "hackernews",
        );
        assert!(s.is_finite());
        // Recency above 1: a future item outranks the same item published now.
        assert!(s > score_at(now, now, Some(10), Some(0), "hackernews"));
    }

    #[test]
    fn unknown_source_uses_default_weight() {
        assert_eq!(source_weight("lobsters"), 1.0);
        assert_eq!(source_weight("hackernews"), 1.3);
    }
}
