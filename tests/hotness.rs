// tests/hotness.rs
//
// Scoring properties: the worked example, decay monotonicity over random
// ages, and the future-timestamp edge case.

use chrono::{Duration, Utc};
use hn_pulse::hotness::{score_at, source_weight};
use rand::Rng;

#[test]
fn worked_example_matches_to_three_decimals() {
    // points=100, comments=50 -> engagement = 1 + ln(201) ~= 6.303;
    // age 0 -> recency 1; weight 1.3 -> 8.194 rounded.
    let now = Utc::now();
    let s = score_at(now, now, Some(100), Some(50), "hackernews");
    assert_eq!(s, 8.194);
}

#[test]
fn score_strictly_decreases_with_age_for_fixed_engagement() {
    let mut rng = rand::rng();
    let now = Utc::now();
    for _ in 0..200 {
        let a = rng.random_range(0..5_000i64);
        let b = rng.random_range(0..5_000i64);
        if a == b {
            continue;
        }
        let (younger, older) = (a.min(b), a.max(b));
        // Minutes granularity keeps the rounded scores distinguishable.
        let s_young = score_at(
            now,
            now - Duration::minutes(younger * 10),
            Some(250),
            Some(40),
            "hackernews",
        );
        let s_old = score_at(
            now,
            now - Duration::minutes(older * 10),
            Some(250),
            Some(40),
            "hackernews",
        );
        assert!(
            s_young >= s_old,
            "age {younger} scored {s_young}, older {older} scored {s_old}"
        );
    }
}

#[test]
fn future_publication_is_not_an_error() {
    let now = Utc::now();
    let s = score_at(now, now + Duration::hours(3), Some(1), None, "hackernews");
    assert!(s.is_finite());
    assert!(s > 0.0);
}

#[test]
fn only_hackernews_gets_the_boosted_weight() {
    assert_eq!(source_weight("hackernews"), 1.3);
    assert_eq!(source_weight("rss"), 1.0);
    assert_eq!(source_weight(""), 1.0);
}
