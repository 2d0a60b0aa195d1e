//! Reranker (spec §4.5): pick and order the top 7 candidates per category with
//! an LLM call, deterministic cache, and a pure diversity-selection fallback.

use std::collections::{HashMap, HashSet};

use digest_client::LlmClient;
use digest_common::{fingerprint, Article, Category, FingerprintCache, RerankStats, SelectedArticle, Selection};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

const PROMPT_VERSION: &str = "rerank-v1";
const MAX_CANDIDATES: usize = 100;
const TARGET_TOP_N: usize = 7;
const MAX_PER_SOURCE: usize = 2;

const SYSTEM_PROMPT: &str = "\
You select and rank the most important articles for a weekly industry digest \
in one category. Selection criteria, in priority order:
1. Relevance to retail/ecommerce operators making day-to-day decisions
2. Relevance to the broader retail/fashion landscape
3. Insightfulness (depth beyond a press release)
4. Filter out anything controversial or off-topic
Recency does not affect ranking beyond what is implied by selection order.

Respond with strict JSON: selected, a list of exactly the requested count of \
{id, rank, why, confidence} objects. `id` must be one of the candidate ids \
given. `rank` must be a permutation of 1..N. `why` is a 5-15 word phrase. No \
duplicate ids, no duplicate ranks. Prefer at most two selections per source \
unless there genuinely aren't enough other sources to fill the list.";

#[derive(Debug, Deserialize, JsonSchema)]
struct RerankLlmResponse {
    selected: Vec<RerankLlmItem>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RerankLlmItem {
    id: u32,
    rank: u32,
    why: String,
    confidence: f32,
}

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
struct CachedSelection {
    items: Vec<CachedItem>,
}

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
struct CachedItem {
    url: String,
    rank: u32,
    why: String,
    confidence: f32,
}

/// Candidate ordering is fixed here (lexicographic by normalized URL) so cache
/// keys and LLM-visible ordering are independent of upstream insertion order
/// (spec §5's ordering guarantee).
fn sorted_candidates(candidates: &[Article]) -> Vec<&Article> {
    let mut sorted: Vec<&Article> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.normalized_url().cmp(&b.normalized_url()));
    sorted
}

fn candidate_fingerprint(week_label: &str, category: Category, sorted: &[&Article]) -> String {
    let mut parts: Vec<String> = vec![week_label.to_string(), category.as_str().to_string()];
    for article in sorted {
        parts.push(article.normalized_url());
        parts.push(article.title.clone());
        parts.push(
            article
                .published_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_default(),
        );
        parts.push(article.snippet_truncated(350).unwrap_or_default());
    }
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    fingerprint(&refs)
}

fn diversity_fallback(sorted: &[&Article], target_n: usize) -> Vec<&Article> {
    let mut selected: Vec<&Article> = Vec::new();
    let mut per_source: HashMap<String, usize> = HashMap::new();

    // First pass: respect the per-source cap.
    for article in sorted {
        if selected.len() >= target_n {
            break;
        }
        let count = per_source.entry(article.source.clone()).or_insert(0);
        if *count < MAX_PER_SOURCE {
            *count += 1;
            selected.push(article);
        }
    }

    // Second pass ("mustFill"): relax the cap only to fill remaining slots once
    // the rest of the pool is exhausted (spec §4.5, §8 scenario 3).
    if selected.len() < target_n {
        let selected_urls: HashSet<String> =
            selected.iter().map(|a| a.normalized_url()).collect();
        for article in sorted {
            if selected.len() >= target_n {
                break;
            }
            if !selected_urls.contains(&article.normalized_url()) {
                selected.push(article);
            }
        }
    }

    selected
}

fn build_fallback_selection(
    sorted: &[&Article],
    total_available: usize,
    candidates_count: usize,
) -> Selection {
    let target_n = TARGET_TOP_N.min(sorted.len());
    let chosen = diversity_fallback(sorted, target_n);

    let items = chosen
        .into_iter()
        .enumerate()
        .map(|(i, article)| SelectedArticle {
            article: article.clone(),
            rank: (i + 1) as u32,
            rerank_why: None,
            rerank_confidence: None,
            summary: None,
        })
        .collect();

    Selection {
        items,
        stats: RerankStats {
            total_available,
            candidates_count,
            selected_count: target_n,
            cache_hit: false,
            fallback_used: true,
        },
    }
}

fn build_candidate_list_text(sorted: &[&Article]) -> String {
    sorted
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "id={} title=\"{}\" source=\"{}\" snippet=\"{}\"",
                i,
                a.title,
                a.source,
                a.snippet_truncated(200).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate the LLM's response against the candidate set and target count
/// (spec §4.5's five validation clauses). Returns the validated, URL-resolved
/// selection on success.
fn validate_llm_response(
    response: &RerankLlmResponse,
    sorted: &[&Article],
    target_n: usize,
) -> Option<Vec<(usize, u32, String, f32)>> {
    if response.selected.len() != target_n {
        return None;
    }

    let mut seen_ids = HashSet::new();
    let mut seen_ranks = HashSet::new();
    let mut seen_urls = HashSet::new();
    let mut resolved = Vec::with_capacity(target_n);

    for item in &response.selected {
        let idx = item.id as usize;
        if idx >= sorted.len() {
            return None;
        }
        if !seen_ids.insert(item.id) {
            return None;
        }
        if item.rank == 0 || item.rank as usize > target_n {
            return None;
        }
        if !seen_ranks.insert(item.rank) {
            return None;
        }
        let url = sorted[idx].normalized_url();
        if !seen_urls.insert(url) {
            return None;
        }
        resolved.push((idx, item.rank, item.why.clone(), item.confidence));
    }

    if seen_ranks.len() != target_n {
        return None;
    }

    Some(resolved)
}

#[allow(clippy::too_many_arguments)]
pub async fn rerank(
    week_label: &str,
    category: Category,
    total_available: usize,
    candidates: Vec<Article>,
    client: Option<&LlmClient>,
    model: &str,
    cache: &mut FingerprintCache,
) -> Selection {
    let candidates_count = candidates.len().min(MAX_CANDIDATES);
    let mut all_sorted = sorted_candidates(&candidates);
    all_sorted.truncate(MAX_CANDIDATES);

    if all_sorted.is_empty() {
        return Selection {
            items: Vec::new(),
            stats: RerankStats {
                total_available,
                candidates_count: 0,
                selected_count: 0,
                cache_hit: false,
                fallback_used: false,
            },
        };
    }

    if all_sorted.len() == 1 {
        let article = all_sorted[0];
        return Selection {
            items: vec![SelectedArticle {
                article: article.clone(),
                rank: 1,
                rerank_why: None,
                rerank_confidence: None,
                summary: None,
            }],
            stats: RerankStats {
                total_available,
                candidates_count: 1,
                selected_count: 1,
                cache_hit: false,
                fallback_used: false,
            },
        };
    }

    let target_n = TARGET_TOP_N.min(all_sorted.len());
    let version = format!("{PROMPT_VERSION}:{model}");
    let key = candidate_fingerprint(week_label, category, &all_sorted);

    if let Some(cached) = cache.get::<CachedSelection>(&key, &version) {
        let by_url: HashMap<String, &Article> = all_sorted
            .iter()
            .map(|a| (a.normalized_url(), *a))
            .collect();
        let mut items = Vec::with_capacity(cached.items.len());
        let mut all_resolved = true;
        for row in &cached.items {
            match by_url.get(&row.url) {
                Some(article) => items.push(SelectedArticle {
                    article: (*article).clone(),
                    rank: row.rank,
                    rerank_why: Some(row.why.clone()),
                    rerank_confidence: Some(row.confidence),
                    summary: None,
                }),
                None => {
                    all_resolved = false;
                    break;
                }
            }
        }
        if all_resolved {
            return Selection {
                stats: RerankStats {
                    total_available,
                    candidates_count,
                    selected_count: items.len(),
                    cache_hit: true,
                    fallback_used: false,
                },
                items,
            };
        }
    }

    let client = match client {
        Some(c) => c,
        None => return build_fallback_selection(&all_sorted, total_available, candidates_count),
    };

    let user_prompt = format!(
        "Category: {}\nTarget count: {}\nCandidates:\n{}",
        category.display_name(),
        target_n,
        build_candidate_list_text(&all_sorted)
    );

    let llm_result = client
        .extract::<RerankLlmResponse>(model, SYSTEM_PROMPT, &user_prompt, 0.0)
        .await;

    let resolved = match llm_result {
        Ok(response) => validate_llm_response(&response, &all_sorted, target_n),
        Err(e) => {
            warn!(category = %category, error = %e, "rerank LLM call failed");
            None
        }
    };

    let resolved = match resolved {
        Some(r) => r,
        None => return build_fallback_selection(&all_sorted, total_available, candidates_count),
    };

    let mut items: Vec<SelectedArticle> = resolved
        .iter()
        .map(|(idx, rank, why, confidence)| SelectedArticle {
            article: all_sorted[*idx].clone(),
            rank: *rank,
            rerank_why: Some(why.clone()),
            rerank_confidence: Some(*confidence),
            summary: None,
        })
        .collect();
    items.sort_by_key(|i| i.rank);

    let cache_rows: Vec<CachedItem> = items
        .iter()
        .map(|i| CachedItem {
            url: i.article.normalized_url(),
            rank: i.rank,
            why: i.rerank_why.clone().unwrap_or_default(),
            confidence: i.rerank_confidence.unwrap_or(0.0),
        })
        .collect();
    cache.put(key, &version, &CachedSelection { items: cache_rows });

    Selection {
        stats: RerankStats {
            total_available,
            candidates_count,
            selected_count: items.len(),
            cache_hit: false,
            fallback_used: false,
        },
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(url: &str, source: &str) -> Article {
        Article {
            url: url.to_string(),
            id: url.to_string(),
            title: format!("Story at {url}"),
            source: source.to_string(),
            published_at: Some(Utc::now()),
            ingested_at: Utc::now(),
            snippet: None,
            source_type: None,
            discovered_at: None,
            category_hint: None,
        }
    }

    #[tokio::test]
    async fn zero_candidates_yields_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "rerank_cache.json");
        let selection = rerank(
            "2026-W05",
            Category::EcommerceRetailTech,
            0,
            Vec::new(),
            None,
            "gpt-4o",
            &mut cache,
        )
        .await;
        assert!(selection.items.is_empty());
    }

    #[tokio::test]
    async fn single_candidate_skips_llm_and_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "rerank_cache.json");
        let candidates = vec![article("https://example.com/a", "Example")];
        let selection = rerank(
            "2026-W05",
            Category::JewelleryIndustry,
            1,
            candidates,
            None,
            "gpt-4o",
            &mut cache,
        )
        .await;
        assert_eq!(selection.items.len(), 1);
        assert_eq!(selection.items[0].rank, 1);
    }

    #[tokio::test]
    async fn no_client_falls_back_to_diversity_selection_with_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "rerank_cache.json");
        let candidates: Vec<Article> = (0..10)
            .map(|i| article(&format!("https://example.com/{i}"), "Source A"))
            .collect();

        let selection = rerank(
            "2026-W05",
            Category::EcommerceRetailTech,
            10,
            candidates,
            None,
            "gpt-4o",
            &mut cache,
        )
        .await;

        assert_eq!(selection.items.len(), 7);
        assert!(selection.stats.fallback_used);
        // All ten are the same source, so the per-source cap is relaxed to fill
        // the list (spec §8 scenario 3's "mustFill" path).
        assert!(selection.items.iter().all(|i| i.article.source == "Source A"));
        assert!(selection.items.iter().all(|i| i.rerank_why.is_none()));
    }

    #[tokio::test]
    async fn diverse_sources_respect_the_per_source_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "rerank_cache.json");
        let mut candidates = Vec::new();
        for source in ["A", "B", "C", "D", "E"] {
            for i in 0..3 {
                candidates.push(article(&format!("https://example.com/{source}-{i}"), source));
            }
        }

        let selection = rerank(
            "2026-W05",
            Category::LuxuryAndConsumer,
            candidates.len(),
            candidates,
            None,
            "gpt-4o",
            &mut cache,
        )
        .await;

        assert_eq!(selection.items.len(), 7);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for item in &selection.items {
            *counts.entry(item.article.source.clone()).or_insert(0) += 1;
        }
        assert!(counts.values().all(|&c| c <= MAX_PER_SOURCE));
    }

    #[test]
    fn candidate_fingerprint_is_stable_regardless_of_input_order() {
        let a = article("https://example.com/a", "A");
        let b = article("https://example.com/b", "B");

        let forward = sorted_candidates(&[a.clone(), b.clone()]);
        let backward = sorted_candidates(&[b.clone(), a.clone()]);

        assert_eq!(
            candidate_fingerprint("2026-W05", Category::AiAndStrategy, &forward),
            candidate_fingerprint("2026-W05", Category::AiAndStrategy, &backward)
        );
    }
}
