//! Best-effort fetch of the top direct replies on a discussion thread.
//! Individual comment failures are dropped silently, never retried.

use futures::future::join_all;

use crate::extract::clean_text;
use crate::ingest::hn::StoryFeed;

/// Comments are truncated to this many characters.
const MAX_COMMENT_CHARS: usize = 300;

/// Default number of top-level comments to pull.
pub const DEFAULT_COMMENT_LIMIT: usize = 3;

/// Fetch up to `limit` direct reply comments of `story_id`, in the thread's
/// own child order. Returns an empty list on any thread-level failure.
pub async fn fetch_top_comments(
    feed: &dyn StoryFeed,
    story_id: u64,
    limit: usize,
) -> Vec<String> {
    let story = match feed.item(story_id).await {
        Ok(item) => item,
        Err(e) => {
            tracing::debug!(error = ?e, story_id, "comment thread fetch failed");
            return Vec::new();
        }
    };

    let kids: Vec<u64> = story.kids.unwrap_or_default().into_iter().take(limit).collect();
    if kids.is_empty() {
        return Vec::new();
    }

    let fetched = join_all(kids.into_iter().map(|id| feed.item(id))).await;

    fetched
        .into_iter()
        .filter_map(|res| res.ok())
        .filter_map(|item| item.text)
        .map(|raw| truncate_chars(&clean_text(&raw), MAX_COMMENT_CHARS))
        .filter(|text| !text.is_empty())
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
