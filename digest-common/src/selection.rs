use serde::{Deserialize, Serialize};

use crate::article::Article;

/// One article selected into a category's top list, with explainability
/// (spec §3, §4.5). `rerank_why`/`rerank_confidence` are absent exactly when the
/// reranker fell back to the deterministic diversity selection (spec §8's
/// "fallback visibility" property).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedArticle {
    pub article: Article,
    pub rank: u32,
    #[serde(default)]
    pub rerank_why: Option<String>,
    #[serde(default)]
    pub rerank_confidence: Option<f32>,
    /// Populated by the summary generator (spec §4.8); absent when skipped or failed.
    #[serde(default)]
    pub summary: Option<String>,
}

/// The outcome of reranking one category: up to 7 ordered selections plus the
/// counters the driver logs per spec §4.5 / §7.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    pub items: Vec<SelectedArticle>,
    pub stats: RerankStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerankStats {
    pub total_available: usize,
    pub candidates_count: usize,
    pub selected_count: usize,
    pub cache_hit: bool,
    pub fallback_used: bool,
}
