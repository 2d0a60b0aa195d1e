//! Theme, summary, and intro generation (spec §4.6). Both cached by
//! `(week_label, fingerprint-of-selected-urls, version)`; both best-effort —
//! on LLM failure the fields stay empty and the pipeline continues.

use digest_client::LlmClient;
use digest_common::{fingerprint, FingerprintCache, SelectedArticle};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

const THEMES_PROMPT_VERSION: &str = "themes-v1";
const INTRO_PROMPT_VERSION: &str = "intro-v1";

const BANNED_THEME_SUBSTRINGS: &[&str] = &[
    "challenges",
    "headwinds",
    "trends",
    "dynamics",
    "impact on",
    "market dynamics",
];

const THEMES_SYSTEM_PROMPT: &str = "\
You identify 3 to 5 key themes running through this week's selected articles. \
Each theme is 2 to 6 words, no punctuation, and is either a capitalized named \
entity (a company, product, or person) or a specific business condition such \
as \"margin compression\" or \"retail media networks\". Never use a generic \
bucket word like challenges, headwinds, trends, or dynamics, and never a vague \
placeholder like \"AI's impact on retail\".

Also write a one-sentence summary of at most 22 words that references at \
least two of the themes.

Respond with strict JSON: themes (list of strings), summary (string).";

const THEMES_RETRY_REMINDER: &str = "\
Your previous themes violated the rules: avoid banned generic words entirely \
and make every theme either a capitalized named entity or a specific, \
concrete business condition. Try again.";

const INTRO_SYSTEM_PROMPT: &str = "\
Write a 2 to 3 sentence introduction to this week's digest in a plain, \
factual, newsroom tone. Do not use hype adjectives (\"groundbreaking\", \
\"revolutionary\", \"game-changing\") and do not refer to \"this digest\", \
\"this week's roundup\", or \"below\" — just state what happened.

Respond with strict JSON: intro (string).";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ThemesLlmResponse {
    themes: Vec<String>,
    summary: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct IntroLlmResponse {
    intro: String,
}

fn selected_urls_fingerprint(week_label: &str, all_selected: &[&SelectedArticle]) -> String {
    let mut urls: Vec<String> = all_selected
        .iter()
        .map(|s| s.article.normalized_url())
        .collect();
    urls.sort();
    let mut parts = vec![week_label.to_string()];
    parts.extend(urls);
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    fingerprint(&refs)
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// 2–6 words, no banned substring, and either starts with a capital letter
/// (named-entity heuristic) or contains one of a small set of concrete
/// business-condition nouns (spec §4.6's validator).
fn theme_is_valid(theme: &str) -> bool {
    let words = word_count(theme);
    if !(2..=6).contains(&words) {
        return false;
    }
    if theme.chars().any(|c| c.is_ascii_punctuation()) {
        return false;
    }
    let lower = theme.to_lowercase();
    if BANNED_THEME_SUBSTRINGS.iter().any(|b| lower.contains(b)) {
        return false;
    }

    let looks_like_named_entity = theme
        .split_whitespace()
        .next()
        .map(|w| w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false))
        .unwrap_or(false);

    const SPECIFIC_CONDITION_WORDS: &[&str] = &[
        "compression", "network", "networks", "shortage", "surplus", "margin", "pricing",
        "tariffs", "inflation", "shrinkage", "fulfillment", "logistics",
    ];
    let looks_like_specific_condition = SPECIFIC_CONDITION_WORDS
        .iter()
        .any(|w| lower.contains(w));

    looks_like_named_entity || looks_like_specific_condition
}

fn truncate_summary(summary: &str) -> String {
    let words: Vec<&str> = summary.split_whitespace().collect();
    if words.len() <= 22 {
        return summary.trim().to_string();
    }
    let mut truncated = words[..22].join(" ");
    if !truncated.ends_with(['.', '!', '?']) {
        truncated.push('.');
    }
    truncated
}

fn truncate_intro(intro: &str) -> String {
    let sentence_re_chars = ['.', '!', '?'];
    let mut sentences: Vec<&str> = Vec::new();
    let mut start = 0;
    let bytes = intro.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if sentence_re_chars.contains(&(*b as char)) {
            sentences.push(intro[start..=i].trim());
            start = i + 1;
        }
    }
    let tail = intro[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences.into_iter().take(3).collect::<Vec<_>>().join(" ")
}

/// Generate themes and a one-sentence summary from the full cross-category
/// selection. On LLM failure, returns empty values (spec §4.6).
pub async fn generate_themes(
    week_label: &str,
    all_selected: &[&SelectedArticle],
    client: Option<&LlmClient>,
    model: &str,
    cache: &mut FingerprintCache,
    force_regen: bool,
) -> (Vec<String>, String) {
    if all_selected.is_empty() {
        return (Vec::new(), String::new());
    }

    let version = format!("{THEMES_PROMPT_VERSION}:{model}");
    let key = selected_urls_fingerprint(week_label, all_selected);

    if !force_regen {
        if let Some(cached) = cache.get::<ThemesLlmResponse>(&key, &version) {
            return (cached.themes, cached.summary);
        }
    }

    let Some(client) = client else {
        return (Vec::new(), String::new());
    };

    let titles: Vec<String> = all_selected.iter().map(|s| s.article.title.clone()).collect();
    let user_prompt = format!("Selected article titles:\n{}", titles.join("\n"));

    let first_attempt = client
        .extract::<ThemesLlmResponse>(model, THEMES_SYSTEM_PROMPT, &user_prompt, 0.0)
        .await;

    let response = match first_attempt {
        Ok(r) if r.themes.iter().all(|t| theme_is_valid(t)) && !r.themes.is_empty() => Some(r),
        Ok(_) | Err(_) => {
            let retry_prompt = format!("{user_prompt}\n\n{THEMES_RETRY_REMINDER}");
            match client
                .extract::<ThemesLlmResponse>(model, THEMES_SYSTEM_PROMPT, &retry_prompt, 0.0)
                .await
            {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(error = %e, "theme generation failed on retry, leaving empty");
                    None
                }
            }
        }
    };

    let Some(mut response) = response else {
        return (Vec::new(), String::new());
    };

    // Best-effort acceptance: keep whatever validates, warn about the rest.
    let invalid_count = response.themes.iter().filter(|t| !theme_is_valid(t)).count();
    if invalid_count > 0 {
        warn!(invalid_count, "accepting best-effort themes after failed retry");
    }
    response.summary = truncate_summary(&response.summary);

    cache.put(key, &version, &response);
    (response.themes, response.summary)
}

/// Generate the intro paragraph from the selected articles. Best-effort on
/// LLM failure (spec §4.6).
pub async fn generate_intro(
    week_label: &str,
    all_selected: &[&SelectedArticle],
    client: Option<&LlmClient>,
    model: &str,
    cache: &mut FingerprintCache,
    force_regen: bool,
) -> String {
    if all_selected.is_empty() {
        return String::new();
    }

    let version = format!("{INTRO_PROMPT_VERSION}:{model}");
    let key = selected_urls_fingerprint(week_label, all_selected);

    if !force_regen {
        if let Some(cached) = cache.get::<IntroLlmResponse>(&key, &version) {
            return truncate_intro(&cached.intro);
        }
    }

    let Some(client) = client else {
        return String::new();
    };

    let titles: Vec<String> = all_selected.iter().map(|s| s.article.title.clone()).collect();
    let user_prompt = format!("Selected article titles:\n{}", titles.join("\n"));

    match client
        .extract::<IntroLlmResponse>(model, INTRO_SYSTEM_PROMPT, &user_prompt, 0.0)
        .await
    {
        Ok(response) => {
            let intro = truncate_intro(&response.intro);
            cache.put(key, &version, &IntroLlmResponse { intro: intro.clone() });
            intro
        }
        Err(e) => {
            warn!(error = %e, "intro generation failed, leaving empty");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_named_entity_theme_passes() {
        assert!(theme_is_valid("Shein Expansion Plans"));
    }

    #[test]
    fn valid_specific_condition_theme_passes() {
        assert!(theme_is_valid("margin compression"));
    }

    #[test]
    fn banned_generic_word_fails() {
        assert!(!theme_is_valid("market trends"));
        assert!(!theme_is_valid("industry headwinds"));
    }

    #[test]
    fn too_many_words_fails() {
        assert!(!theme_is_valid("a very long theme with way too many words here"));
    }

    #[test]
    fn punctuation_fails() {
        assert!(!theme_is_valid("Shein's expansion"));
    }

    #[test]
    fn summary_over_22_words_is_truncated() {
        let long = (0..30).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let truncated = truncate_summary(&long);
        assert_eq!(word_count(&truncated), 22);
        assert!(truncated.ends_with('.'));
    }

    #[test]
    fn summary_within_limit_is_unchanged() {
        assert_eq!(truncate_summary("Short summary."), "Short summary.");
    }

    #[test]
    fn intro_over_three_sentences_is_truncated() {
        let intro = "One. Two. Three. Four. Five.";
        let truncated = truncate_intro(intro);
        assert_eq!(truncated.matches('.').count(), 3);
    }

    #[test]
    fn empty_selection_short_circuits_without_llm() {
        let key = selected_urls_fingerprint("2026-W05", &[]);
        assert!(!key.is_empty());
    }
}
