//! Classifier (spec §4.3): cache → LLM → confidence-guardrail → rule fallback.

pub mod rules;

use digest_client::LlmClient;
use digest_common::{Article, Category, Classification, FingerprintCache};
use futures::stream::{self, StreamExt};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

/// How many articles the driver classifies concurrently (spec §5: "all
/// eligible articles concurrently"). Bounded rather than unbounded so a
/// thousand-article store doesn't open a thousand sockets at once.
const CLASSIFY_CONCURRENCY: usize = 16;

const PROMPT_VERSION: &str = "classifier-v1";
const CONFIDENCE_GUARDRAIL: f32 = 0.55;
/// A rule-classifier score this low counts as "few keyword matches" for the
/// category-hint preference clause (spec §4.3).
const FEW_MATCHES_THRESHOLD: u32 = 1;

const SYSTEM_PROMPT: &str = "\
You classify business-news articles into exactly one of four categories:

- AI_and_Strategy: AI research, AI policy, enterprise/corporate strategy, \
  technology leadership. AI business applications used BY retailers or \
  ecommerce operators belong in Ecommerce_Retail_Tech instead.
- Ecommerce_Retail_Tech: online retail operations, marketplaces, supply \
  chain and fulfillment technology, point-of-sale systems, retail media.
- Luxury_and_Consumer: luxury fashion houses, premium consumer brands, \
  high-end retail, brand strategy in the luxury sector.
- Jewellery_Industry: jewellery and watch manufacturers, gemstones, \
  diamonds, the fine jewellery trade specifically.

Respond with strict JSON: category, confidence (0 to 1), rationale \
(one short sentence). Pick the single best-fitting category.";

#[derive(Debug, Deserialize, JsonSchema)]
struct ClassifierLlmResponse {
    category: Category,
    confidence: f32,
    rationale: String,
}

fn cache_version(model: &str) -> String {
    format!("{PROMPT_VERSION}:{model}")
}

fn build_user_prompt(article: &Article) -> String {
    let snippet = article.snippet_truncated(500).unwrap_or_default();
    let hint = article.category_hint.as_deref().unwrap_or("(none)");
    format!(
        "Title: {}\nSource: {}\nSnippet: {}\nCategoryHint: {}",
        article.title, article.source, snippet, hint
    )
}

fn rule_fallback(article: &Article, model: &str) -> Classification {
    let verdict = rules::classify(&article.title, &article.source);
    let capped = verdict.score.min(5) as f32 / 5.0;
    let confidence = 0.2 + 0.2 * capped;
    let mut classification = Classification::new(verdict.category, confidence, cache_version(model));
    classification.from_fallback = true;
    classification.rationale = Some(format!(
        "rule classifier: {} keyword match(es){}",
        verdict.score,
        if verdict.via_allowlist { ", source allowlist" } else { "" }
    ));
    classification
}

/// Run the LLM call plus the confidence guardrail for one article. Pure with
/// respect to the cache — callers are responsible for the lookup/write-back
/// so this can run concurrently without shared mutable state (spec §5).
async fn classify_live(article: &Article, client: Option<&LlmClient>, model: &str, version: &str) -> Classification {
    let client = match client {
        Some(c) => c,
        None => return rule_fallback(article, model),
    };

    let user_prompt = build_user_prompt(article);
    let llm_result = client
        .extract::<ClassifierLlmResponse>(model, SYSTEM_PROMPT, &user_prompt, 0.0)
        .await;

    let mut classification = match llm_result {
        Ok(response) if (0.0..=1.0).contains(&response.confidence) => {
            let mut classification =
                Classification::new(response.category, response.confidence, version.to_string());
            classification.rationale = Some(response.rationale);
            classification
        }
        Ok(response) => {
            warn!(
                url = %article.url,
                confidence = response.confidence,
                "classifier returned out-of-range confidence, falling back to rules"
            );
            rule_fallback(article, model)
        }
        Err(e) => {
            warn!(url = %article.url, error = %e, "classifier LLM call failed, falling back to rules");
            rule_fallback(article, model)
        }
    };

    if !classification.from_fallback && classification.confidence < CONFIDENCE_GUARDRAIL {
        let verdict = rules::classify(&article.title, &article.source);
        let hinted_category = article
            .category_hint
            .as_deref()
            .and_then(|h| h.parse::<Category>().ok());

        let resolved_category = match hinted_category {
            Some(hint) if verdict.score < FEW_MATCHES_THRESHOLD => hint,
            _ => verdict.category,
        };
        classification.category = resolved_category;
    }

    classification
}

/// Classify one article end to end, including cache lookup and write-back.
/// `client` is `None` when `CLASSIFIER_DRY_RUN` is set or no API key is
/// configured, in which case the rule classifier runs directly.
pub async fn classify(
    article: &Article,
    client: Option<&LlmClient>,
    model: &str,
    cache: &mut FingerprintCache,
) -> Classification {
    let key = article.normalized_url();
    let version = cache_version(model);

    if let Some(mut cached) = cache.get::<Classification>(&key, &version) {
        cached.from_cache = true;
        debug!(url = %key, "classification cache hit");
        return cached;
    }

    let classification = classify_live(article, client, model, &version).await;
    cache.put(key, &version, &classification);
    classification
}

/// Classify every article, checking the cache sequentially first, then
/// running the LLM calls for cache misses concurrently (bounded), then
/// writing the fresh results back to the cache sequentially. Order of the
/// returned vector matches `articles`.
pub async fn classify_many(
    articles: &[Article],
    client: Option<&LlmClient>,
    model: &str,
    cache: &mut FingerprintCache,
) -> Vec<Classification> {
    let version = cache_version(model);
    let mut results: Vec<Option<Classification>> = Vec::with_capacity(articles.len());
    let mut misses: Vec<usize> = Vec::new();

    for (i, article) in articles.iter().enumerate() {
        let key = article.normalized_url();
        match cache.get::<Classification>(&key, &version) {
            Some(mut cached) => {
                cached.from_cache = true;
                results.push(Some(cached));
            }
            None => {
                results.push(None);
                misses.push(i);
            }
        }
    }

    let version_ref = &version;
    let computed: Vec<(usize, Classification)> = stream::iter(misses.into_iter().map(|i| {
        let article = &articles[i];
        async move { (i, classify_live(article, client, model, version_ref).await) }
    }))
    .buffer_unordered(CLASSIFY_CONCURRENCY)
    .collect()
    .await;

    for (i, classification) in computed {
        let key = articles[i].normalized_url();
        cache.put(key, &version, &classification);
        results[i] = Some(classification);
    }

    results.into_iter().map(|r| r.expect("every index filled")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_article() -> Article {
        Article {
            url: "https://example.com/story".to_string(),
            id: "1".to_string(),
            title: "Lab-grown diamond prices fall".to_string(),
            source: "Unknown Source".to_string(),
            published_at: Some(Utc::now()),
            ingested_at: Utc::now(),
            snippet: None,
            source_type: None,
            discovered_at: None,
            category_hint: None,
        }
    }

    #[tokio::test]
    async fn dry_run_uses_rule_classifier_and_marks_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "classification_cache.json");
        let article = sample_article();

        let result = classify(&article, None, "gpt-4o-mini", &mut cache).await;

        assert!(result.from_fallback);
        assert_eq!(result.category, Category::JewelleryIndustry);
        assert!(result.confidence >= 0.2 && result.confidence <= 0.4);
    }

    #[tokio::test]
    async fn classify_many_preserves_order_and_hits_cache_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "classification_cache.json");

        let mut a = sample_article();
        a.url = "https://example.com/a".to_string();
        a.title = "Lab-grown diamond prices fall".to_string();
        let mut b = sample_article();
        b.url = "https://example.com/b".to_string();
        b.title = "Luxury brand expands retail footprint".to_string();
        let articles = vec![a, b];

        let first = classify_many(&articles, None, "gpt-4o-mini", &mut cache).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|c| !c.from_cache));

        let second = classify_many(&articles, None, "gpt-4o-mini", &mut cache).await;
        assert!(second.iter().all(|c| c.from_cache));
        assert_eq!(second[0].category, first[0].category);
        assert_eq!(second[1].category, first[1].category);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path(), "classification_cache.json");
        let article = sample_article();

        let first = classify(&article, None, "gpt-4o-mini", &mut cache).await;
        assert!(!first.from_cache);

        let second = classify(&article, None, "gpt-4o-mini", &mut cache).await;
        assert!(second.from_cache);
        assert_eq!(second.category, first.category);
    }
}
