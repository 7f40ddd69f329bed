// tests/tags.rs
//
// Classifier contract: catch-all fallback, 4-tag cap in first-matched
// order, and the topic -> company -> domain precedence.

use hn_pulse::tags::{classify, FALLBACK_TAG, MAX_TAGS};

#[test]
fn no_match_and_no_url_yields_exactly_tech() {
    let tags = classify("Quarterly earnings report released", None);
    assert_eq!(tags, vec![FALLBACK_TAG.to_string()]);
}

#[test]
fn six_keyword_title_is_capped_at_four() {
    let tags = classify(
        "LLM security hole in Rust GPU stack, say OpenAI and Nvidia",
        None,
    );
    assert_eq!(tags.len(), MAX_TAGS);
    assert_eq!(tags, vec!["AI", "Security", "Programming", "Hardware"]);
}

#[test]
fn classification_is_deterministic() {
    let title = "Anthropic ships Claude update for Linux";
    let a = classify(title, None);
    let b = classify(title, None);
    assert_eq!(a, b);
}

#[test]
fn domain_fallback_only_without_keyword_hits() {
    // No keyword in the title: hostname decides.
    assert_eq!(
        classify("Weekend reading list", Some("https://arxiv.org/abs/1234")),
        vec!["Science"]
    );
    // Keyword present: the domain table is never consulted.
    assert_eq!(
        classify("Bitcoin hits a new low", Some("https://arxiv.org/abs/1234")),
        vec!["Crypto"]
    );
}

#[test]
fn unknown_domain_still_falls_back_to_tech() {
    let tags = classify(
        "An untaggable headline",
        Some("https://blog.example.net/post/1"),
    );
    assert_eq!(tags, vec![FALLBACK_TAG.to_string()]);
}
