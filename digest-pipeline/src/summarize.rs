//! Summary generator (spec §4.8): one-to-two-sentence per-article gloss from
//! title and snippet. Skipped when there's no snippet; failures leave the
//! field absent. Runs concurrently over every selected item (spec §5).

use digest_client::LlmClient;
use digest_common::Article;
use futures::stream::{self, StreamExt};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

const TEMPERATURE: f32 = 0.2;
const SNIPPET_MAX_CHARS: usize = 800;
/// How many summaries run concurrently across all four categories' selected
/// items at once (spec §5: "Summarization runs all selected items concurrently").
const SUMMARIZE_CONCURRENCY: usize = 16;

const SYSTEM_PROMPT: &str = "\
Write a one-to-two sentence gloss of this article for a category page in a \
weekly industry digest. Plain, factual tone. No hype adjectives. Do not \
repeat the title verbatim.";

#[derive(Debug, Deserialize, JsonSchema)]
struct SummaryLlmResponse {
    summary: String,
}

/// `None` when the article has no snippet, the LLM call fails, or no client
/// is configured.
pub async fn summarize(
    article: &Article,
    category_name: &str,
    client: Option<&LlmClient>,
    model: &str,
) -> Option<String> {
    let snippet = article.snippet_truncated(SNIPPET_MAX_CHARS)?;
    let client = client?;

    let user_prompt = format!(
        "Category: {category_name}\nTitle: {}\nSource: {}\nSnippet: {snippet}",
        article.title, article.source
    );

    match client
        .extract::<SummaryLlmResponse>(model, SYSTEM_PROMPT, &user_prompt, TEMPERATURE)
        .await
    {
        Ok(response) => Some(response.summary),
        Err(e) => {
            warn!(url = %article.url, error = %e, "article summary generation failed");
            None
        }
    }
}

/// Summarize every selected item concurrently (bounded). No cache is
/// involved here — spec §4.9 lists classification, rerank, themes, intro,
/// and scene-director caches only; summaries are recomputed every run.
///
/// `buffer_unordered` completes futures in whatever order the underlying
/// LLM calls resolve, not submission order, so each future is tagged with
/// its original index and scattered back into a pre-sized vec — the same
/// shape `classifier::classify_many` uses for its own concurrent fan-out.
pub async fn summarize_many(
    items: &[(Article, String)],
    client: Option<&LlmClient>,
    model: &str,
) -> Vec<Option<String>> {
    let computed: Vec<(usize, Option<String>)> = stream::iter(items.iter().enumerate().map(
        |(i, (article, category_name))| async move {
            (i, summarize(article, category_name, client, model).await)
        },
    ))
    .buffer_unordered(SUMMARIZE_CONCURRENCY)
    .collect()
    .await;

    let mut results: Vec<Option<String>> = vec![None; items.len()];
    for (i, summary) in computed {
        results[i] = summary;
    }
    results
}
