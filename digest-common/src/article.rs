use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an article entered the corpus, per spec §3. Drives the gate's
/// soft/strict window policy (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Rss,
    Page,
    Discovery,
}

/// An ingested article. Immutable once created (spec §3's Article lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Canonical key. Use [`crate::url::normalize_url`] before comparing two
    /// articles' URLs for identity.
    pub url: String,
    pub id: String,
    pub title: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub discovered_at: Option<DateTime<Utc>>,
    /// Free-form editorial hint, e.g. the scout's best guess at a category. Only
    /// consulted by the classifier's confidence guardrail (spec §4.3).
    #[serde(default)]
    pub category_hint: Option<String>,
}

impl Article {
    pub fn normalized_url(&self) -> String {
        crate::url::normalize_url(&self.url)
    }

    pub fn normalized_title(&self) -> String {
        crate::url::normalize_title(&self.title)
    }

    /// Truncate the snippet to at most `max_chars` characters, at a char boundary.
    pub fn snippet_truncated(&self, max_chars: usize) -> Option<String> {
        self.snippet.as_deref().map(|s| truncate_chars(s, max_chars))
    }
}

/// Truncate a string to at most `max_chars` Unicode scalar values.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// The inclusive `[Monday 00:00, Sunday 23:59:59.999]` interval for an ISO week,
/// resolved in the configured timezone (spec §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekWindow {
    /// `YYYY-Www`
    pub label: String,
    /// IANA timezone name.
    pub tz: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_respects_unicode_boundaries() {
        let s = "héllo wörld";
        let truncated = truncate_chars(s, 5);
        assert_eq!(truncated.chars().count(), 5);
    }

    #[test]
    fn truncate_chars_shorter_than_limit_is_unchanged() {
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
