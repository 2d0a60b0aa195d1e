use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::selection::SelectedArticle;

/// Per-category topline used in the `topics` map (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTopics {
    /// Count of eligible (gated-in) articles in this category for the week,
    /// before the top-7 cut.
    pub total: usize,
    pub top: Vec<SelectedArticle>,
}

/// The immutable per-week artifact produced by the pipeline (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub week_label: String,
    pub tz: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub built_at: DateTime<Utc>,

    pub total_articles: usize,
    pub topics: BTreeMap<Category, CategoryTopics>,

    pub key_themes: Vec<String>,
    pub one_sentence_summary: String,
    pub intro_paragraph: String,

    pub cover_image_url: String,
    pub cover_image_alt: String,
    pub cover_keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_map_serializes_with_spec_category_keys() {
        let mut topics = BTreeMap::new();
        topics.insert(Category::AiAndStrategy, CategoryTopics::default());
        let json = serde_json::to_value(&topics).unwrap();
        assert!(json.get("AI_and_Strategy").is_some());
    }
}
