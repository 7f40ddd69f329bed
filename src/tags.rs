//! # Tag Classifier
//!
//! Maps a title (and optionally its URL) to a bounded, ordered set of topical
//! and company labels. Matching is deliberately dumb and deterministic:
//! case-insensitive substring tests against two fixed ordered tables, then a
//! domain fallback, then the catch-all. Tie-breaks are "first table position,
//! first keyword position, first domain match" — the tables below are the
//! single source of truth for that order.

/// Universal fallback when nothing matches.
pub const FALLBACK_TAG: &str = "Tech";

/// Hard cap on the tag set.
pub const MAX_TAGS: usize = 4;

/// Topical rules, evaluated first, in order.
const TOPIC_RULES: &[(&str, &[&str])] = &[
    (
        "AI",
        &[
            "ai",
            "llm",
            "gpt",
            "machine learning",
            "neural",
            "transformer",
            "diffusion model",
        ],
    ),
    (
        "Security",
        &[
            "security",
            "vulnerability",
            "exploit",
            "breach",
            "malware",
            "cve-",
            "encryption",
            "zero-day",
        ],
    ),
    (
        "Programming",
        &[
            "programming",
            "compiler",
            "rust",
            "python",
            "javascript",
            "typescript",
            "debugger",
            "sdk",
        ],
    ),
    (
        "Web",
        &["browser", "css", "html", "frontend", "http/3", "webassembly"],
    ),
    (
        "Hardware",
        &[
            "chip",
            "cpu",
            "gpu",
            "semiconductor",
            "silicon",
            "risc-v",
            "fpga",
        ],
    ),
    (
        "Crypto",
        &["bitcoin", "ethereum", "blockchain", "cryptocurrency"],
    ),
    (
        "Science",
        &[
            "physics",
            "quantum",
            "biology",
            "astronomy",
            "telescope",
            "genome",
            "climate",
        ],
    ),
    (
        "Startups",
        &["startup", "founder", "seed round", "series a", "y combinator"],
    ),
    (
        "Open Source",
        &["open source", "open-source", "linux", "kernel", "foss"],
    ),
];

/// Company rules, evaluated after the topical table, in order.
const COMPANY_RULES: &[(&str, &[&str])] = &[
    ("OpenAI", &["openai", "chatgpt"]),
    ("Anthropic", &["anthropic", "claude"]),
    ("Google", &["google", "deepmind", "gemini"]),
    ("Apple", &["apple", "iphone", "macos"]),
    ("Microsoft", &["microsoft", "windows", "azure"]),
    ("Meta", &["meta", "facebook", "instagram"]),
    ("Amazon", &["amazon", "aws"]),
    ("Nvidia", &["nvidia", "cuda"]),
    ("Tesla", &["tesla", "spacex"]),
];

/// Domain fallback, consulted only when no keyword matched at all.
/// First substring match on the hostname wins, then we stop.
const DOMAIN_RULES: &[(&str, &str)] = &[
    ("github.com", "Open Source"),
    ("gitlab.com", "Open Source"),
    ("arxiv.org", "Science"),
    ("nature.com", "Science"),
    ("techcrunch.com", "Startups"),
    ("youtube.com", "Media"),
    ("substack.com", "Media"),
];

/// Classify a title into 1..=4 tags, in match order.
pub fn classify(title: &str, url: Option<&str>) -> Vec<String> {
    let haystack = title.to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    for (tag, keywords) in TOPIC_RULES {
        if keywords.iter().any(|k| haystack.contains(k)) {
            tags.push((*tag).to_string());
        }
    }
    for (tag, keywords) in COMPANY_RULES {
        if keywords.iter().any(|k| haystack.contains(k)) {
            tags.push((*tag).to_string());
        }
    }

    if tags.is_empty() {
        if let Some(u) = url {
            let host = hostname(u).to_lowercase();
            for (domain, tag) in DOMAIN_RULES {
                if host.contains(domain) {
                    tags.push((*tag).to_string());
                    break;
                }
            }
        }
    }

    if tags.is_empty() {
        tags.push(FALLBACK_TAG.to_string());
    }

    tags.truncate(MAX_TAGS);
    tags
}

/// Pull the hostname out of a URL without a full parser:
/// strip the scheme, drop userinfo, cut at the first `/`, `?` or `#`,
/// and drop a trailing port.
fn hostname(url: &str) -> &str {
    let rest = url
        .split_once("://")
        .map(|(_, r)| r)
        .unwrap_or(url);
    let rest = rest.rsplit_once('@').map(|(_, r)| r).unwrap_or(rest);
    let end = rest
        .find(['/', '?', '#'])
        .unwrap_or(rest.len());
    let host = &rest[..end];
    host.split_once(':').map(|(h, _)| h).unwrap_or(host)
}
