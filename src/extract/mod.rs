//! # Content Extractor
//!
//! Best-effort enrichment fetchers. Every operation here returns `Option` /
//! silently drops failures: a timeout, a non-2xx status or hopelessly
//! malformed HTML all mean "no content", never an error for the caller.
//!
//! Extraction is regex/heuristic based rather than a full DOM parse, so it
//! must shrug off partial and broken markup.

pub mod comments;

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Per-paragraph minimum before a text block counts as content.
const MIN_PARAGRAPH_CHARS: usize = 50;
/// Total excerpt budget.
const MAX_CONTENT_CHARS: usize = 1000;
/// Hard timeout for page fetches.
const PAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// What we managed to pull out of a webpage. All fields best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtract {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
}

/// HTTP client tuned for page extraction (identifying UA + hard timeout).
pub fn page_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("hn-pulse/0.1 (+article preview fetcher)")
        .timeout(PAGE_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Fetch a page and extract meta fields plus a short text excerpt.
/// Returns `None` only when nothing at all could be fetched; a fetched page
/// with no extractable fields still yields a (mostly empty) extract.
pub async fn fetch_page(http: &reqwest::Client, url: &str) -> Option<PageExtract> {
    let resp = http.get(url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let html = resp.text().await.ok()?;
    Some(extract_from_html(&html))
}

/// Pure extraction half, split out so tests can run without a network.
pub fn extract_from_html(html: &str) -> PageExtract {
    let title = meta_content(html, "og:title")
        .or_else(|| title_tag(html));
    let description = meta_content(html, "og:description")
        .or_else(|| meta_content(html, "description"))
        .or_else(|| meta_content(html, "twitter:description"));
    let image = meta_content(html, "og:image");
    let content = main_content(html);

    PageExtract {
        title,
        description,
        content,
        image,
    }
}

/// `<meta property|name="key" content="...">` in either attribute order.
fn meta_content(html: &str, key: &str) -> Option<String> {
    let key = regex::escape(key);
    let patterns = [
        format!(
            r#"(?is)<meta[^>]*(?:property|name)\s*=\s*["']{key}["'][^>]*content\s*=\s*["']([^"']*)["']"#
        ),
        format!(
            r#"(?is)<meta[^>]*content\s*=\s*["']([^"']*)["'][^>]*(?:property|name)\s*=\s*["']{key}["']"#
        ),
    ];
    for p in &patterns {
        let re = match Regex::new(p) {
            Ok(re) => re,
            Err(_) => continue,
        };
        if let Some(c) = re.captures(html) {
            let v = clean_text(&c[1]);
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn title_tag(html: &str) -> Option<String> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
    RE.captures(html).map(|c| clean_text(&c[1])).filter(|t| !t.is_empty())
}

/// Locate the main content region (prefer `<article>`, then `<main>`, else
/// the whole document), harvest paragraph blocks longer than
/// `MIN_PARAGRAPH_CHARS`, and concatenate up to the budget.
fn main_content(html: &str) -> Option<String> {
    static STRIP_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
        // The regex crate has no backreferences, so one pattern per tag.
        ["script", "style", "nav", "header", "footer", "aside"]
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}[^>]*>.*?</{tag}>")).expect("strip regex")
            })
            .collect()
    });
    static ARTICLE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<article[^>]*>(.*?)</article>").expect("article regex"));
    static MAIN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<main[^>]*>(.*?)</main>").expect("main regex"));
    static P_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("paragraph regex"));

    let mut doc = html.to_string();
    for re in STRIP_BLOCKS.iter() {
        doc = re.replace_all(&doc, " ").to_string();
    }

    let captured = ARTICLE_RE
        .captures(&doc)
        .or_else(|| MAIN_RE.captures(&doc))
        .map(|c| c[1].to_string());
    let region = captured.unwrap_or(doc);

    let mut out = String::new();
    for cap in P_RE.captures_iter(&region) {
        let paragraph = clean_text(&cap[1]);
        if paragraph.chars().count() <= MIN_PARAGRAPH_CHARS {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&paragraph);
        if out.chars().count() >= MAX_CONTENT_CHARS {
            out = out.chars().take(MAX_CONTENT_CHARS).collect();
            break;
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Strip tags, decode entities, collapse whitespace.
pub(crate) fn clean_text(fragment: &str) -> String {
    static RE_TAGS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

    let out = RE_TAGS.replace_all(fragment, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    RE_WS.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head>
        <title>Fallback Title - Site</title>
        <meta property="og:title" content="OG Title">
        <meta name="description" content="plain description">
        <meta content="http://img.example/x.png" property="og:image">
        </head><body>
        <nav><p>navigation navigation navigation navigation navigation navigation</p></nav>
        <article>
          <p>short</p>
          <p>This paragraph is comfortably longer than fifty characters and should be kept.</p>
          <p>A second long paragraph, also past the fifty character threshold, to be appended.</p>
        </article>
        <footer><p>About us and careers and a very long legal disclaimer nobody ever reads.</p></footer>
        </body></html>"#;

    #[test]
    fn prefers_og_title_and_reads_reversed_attribute_order() {
        let e = extract_from_html(PAGE);
        assert_eq!(e.title.as_deref(), Some("OG Title"));
        assert_eq!(e.image.as_deref(), Some("http://img.example/x.png"));
        assert_eq!(e.description.as_deref(), Some("plain description"));
    }

    #[test]
    fn content_comes_from_article_region_only() {
        let e = extract_from_html(PAGE);
        let content = e.content.expect("content");
        assert!(content.contains("comfortably longer"));
        assert!(content.contains("second long paragraph"));
        assert!(!content.contains("short"));
        assert!(!content.contains("navigation"));
        assert!(!content.contains("legal disclaimer"));
    }

    #[test]
    fn falls_back_to_title_tag_and_tolerates_garbage() {
        let e = extract_from_html("<title>Only Title</title><p>tiny</p><div<<broken");
        assert_eq!(e.title.as_deref(), Some("Only Title"));
        assert!(e.content.is_none());
        assert!(e.description.is_none());
    }

    #[test]
    fn content_budget_is_capped() {
        let long = "x".repeat(400);
        let html = format!(
            "<p>{long}</p><p>{long}</p><p>{long}</p><p>{long}</p>",
        );
        let e = extract_from_html(&html);
        assert!(e.content.unwrap().chars().count() <= 1000);
    }

    #[test]
    fn clean_text_decodes_and_collapses() {
        assert_eq!(
            clean_text("  Hello,&nbsp;<b>world</b>\n&ldquo;ok&rdquo; "),
            "Hello, world \u{201c}ok\u{201d}"
        );
    }
}
