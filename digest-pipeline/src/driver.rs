//! Pipeline driver (spec §4.10): composes window resolution through digest
//! serialization. Only a corrupt article store or an unwritable output
//! directory is fatal; every other failure degrades to a local fallback.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use digest_client::LlmClient;
use digest_common::{
    Article, Category, CategoryTopics, Config, Digest, DigestError, FingerprintCache,
    SelectedArticle,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{classifier, cover, gate, rerank, store, summarize, themes, window};

/// Flags the driver reads from the CLI, distinct from the environment-backed
/// [`Config`] (spec §6's CLI flag list).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub week_label: Option<String>,
    pub regen_cover: bool,
    pub regen_themes: bool,
    pub regen_intro: bool,
    pub cover_style: String,
}

impl RunOptions {
    pub fn cover_style_or_default(&self) -> &str {
        if self.cover_style.is_empty() {
            "realistic"
        } else {
            &self.cover_style
        }
    }
}

struct Caches {
    classification: FingerprintCache,
    rerank: FingerprintCache,
    themes: FingerprintCache,
    intro: FingerprintCache,
    scene_director: FingerprintCache,
}

impl Caches {
    fn load(data_dir: &Path) -> Self {
        Self {
            classification: FingerprintCache::load(data_dir, "classification_cache.json"),
            rerank: FingerprintCache::load(data_dir, "rerank_cache.json"),
            themes: FingerprintCache::load(data_dir, "themes_cache.json"),
            intro: FingerprintCache::load(data_dir, "intro_cache.json"),
            scene_director: FingerprintCache::load(data_dir, "scene_director_cache.json"),
        }
    }

    fn save_all(&self) {
        self.classification.save();
        self.rerank.save();
        self.themes.save();
        self.intro.save();
        self.scene_director.save();
    }
}

#[derive(Debug, Default, Serialize)]
struct RunStats {
    total_articles: usize,
    classification_cache_hits: usize,
    classification_fallbacks: usize,
    gated_out: HashMap<String, usize>,
    rerank_fallbacks: usize,
}

fn current_week_label(tz: &str) -> String {
    use chrono::Datelike;

    let iso = match tz.parse::<chrono_tz::Tz>() {
        Ok(zone) => chrono::Utc::now().with_timezone(&zone).iso_week(),
        Err(_) => chrono::Utc::now().iso_week(),
    };
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

/// Run the digest build for one week end to end. Returns the digest plus the
/// path it was written to. Errors are fatal per spec §7: unreadable article
/// store or unwritable digest directory only.
pub async fn run(config: &Config, options: &RunOptions) -> Result<(Digest, PathBuf), DigestError> {
    let data_dir = PathBuf::from(&config.data_dir);
    let week_label = options
        .week_label
        .clone()
        .unwrap_or_else(|| current_week_label(&config.timezone));

    let win = window::resolve(&week_label, &config.timezone)?;
    info!(week = %win.label, tz = %win.tz, start = %win.start, end = %win.end, "week window resolved");

    let articles = store::ArticleStore::new(&data_dir).load(&win)?;
    let mut stats = RunStats {
        total_articles: articles.len(),
        ..Default::default()
    };

    let client_owned = config.openai_api_key.as_deref().map(LlmClient::new);
    let client = if config.classifier_dry_run {
        None
    } else {
        client_owned.as_ref()
    };
    let mut caches = Caches::load(&data_dir);

    let classifications =
        classifier::classify_many(&articles, client, &config.classifier_model, &mut caches.classification).await;

    for c in &classifications {
        if c.from_cache {
            stats.classification_cache_hits += 1;
        }
        if c.from_fallback {
            stats.classification_fallbacks += 1;
        }
    }

    let mut by_category: BTreeMap<Category, Vec<Article>> = BTreeMap::new();
    for (article, classification) in articles.iter().zip(classifications.iter()) {
        by_category
            .entry(classification.category)
            .or_default()
            .push(article.clone());
    }

    let mut topics: BTreeMap<Category, CategoryTopics> = BTreeMap::new();
    let mut selections: BTreeMap<Category, Vec<SelectedArticle>> = BTreeMap::new();

    for category in Category::all() {
        let mut candidates = by_category.remove(&category).unwrap_or_default();
        candidates.sort_by(|a, b| a.normalized_url().cmp(&b.normalized_url()));

        let mut newest_by_title: HashMap<String, Article> = HashMap::new();
        for article in candidates {
            let key = article.normalized_title();
            match newest_by_title.get(&key) {
                Some(existing) if existing.ingested_at >= article.ingested_at => {}
                _ => {
                    newest_by_title.insert(key, article);
                }
            }
        }
        let mut deduped: Vec<Article> = newest_by_title.into_values().collect();
        deduped.sort_by(|a, b| a.normalized_url().cmp(&b.normalized_url()));

        let mut title_first_seen: HashMap<String, String> = HashMap::new();
        let mut eligible = Vec::new();
        for article in &deduped {
            let verdict = gate::gate(article, &win, &mut title_first_seen);
            if verdict.eligible {
                eligible.push(article.clone());
            } else {
                for reason in &verdict.reasons {
                    *stats.gated_out.entry(reason.clone()).or_insert(0) += 1;
                }
            }
        }

        let total_available = eligible.len();
        let selection = rerank::rerank(
            &week_label,
            category,
            total_available,
            eligible,
            client,
            &config.rerank_model,
            &mut caches.rerank,
        )
        .await;

        if selection.stats.fallback_used {
            stats.rerank_fallbacks += 1;
        }

        let items = selection.items;
        topics.insert(
            category,
            CategoryTopics {
                total: total_available,
                top: items.clone(),
            },
        );
        selections.insert(category, items);
    }

    let to_summarize: Vec<(Article, String)> = selections
        .iter()
        .flat_map(|(category, items)| {
            items
                .iter()
                .map(move |item| (item.article.clone(), category.display_name().to_string()))
        })
        .collect();

    let summaries = summarize::summarize_many(&to_summarize, client, &config.classifier_model).await;
    let mut summary_iter = summaries.into_iter();
    for items in selections.values_mut() {
        for item in items.iter_mut() {
            item.summary = summary_iter.next().flatten();
        }
    }

    for (category, items) in &selections {
        if let Some(topic) = topics.get_mut(category) {
            topic.top = items.clone();
        }
    }

    let all_selected_refs: Vec<&SelectedArticle> = selections.values().flatten().collect();

    let (key_themes, one_sentence_summary) = themes::generate_themes(
        &week_label,
        &all_selected_refs,
        client,
        &config.theme_model,
        &mut caches.themes,
        options.regen_themes,
    )
    .await;

    let intro_paragraph = themes::generate_intro(
        &week_label,
        &all_selected_refs,
        client,
        &config.intro_model,
        &mut caches.intro,
        options.regen_intro,
    )
    .await;

    let homepage_top_articles: Vec<&Article> = [Category::EcommerceRetailTech, Category::JewelleryIndustry]
        .iter()
        .flat_map(|c| selections.get(c).into_iter().flatten().take(2))
        .map(|item| &item.article)
        .collect();

    let cover_result = cover::cover(
        &data_dir,
        &week_label,
        &homepage_top_articles,
        options.cover_style_or_default(),
        client,
        &config.scene_director_model,
        &config.image_model,
        &mut caches.scene_director,
        options.regen_cover,
    )
    .await;

    let built_at = chrono::Utc::now();
    let digest = Digest {
        week_label: week_label.clone(),
        tz: win.tz.clone(),
        start: win.start,
        end: win.end,
        built_at,
        total_articles: stats.total_articles,
        topics,
        key_themes,
        one_sentence_summary,
        intro_paragraph,
        cover_image_url: cover_result.image_url,
        cover_image_alt: cover_result.alt,
        cover_keywords: cover_result.keywords,
    };

    let output_path = write_digest(&data_dir, &digest)?;
    caches.save_all();
    write_run_log(&data_dir, &week_label, built_at, &stats);

    info!(
        week = %week_label,
        total_articles = stats.total_articles,
        classification_cache_hits = stats.classification_cache_hits,
        classification_fallbacks = stats.classification_fallbacks,
        rerank_fallbacks = stats.rerank_fallbacks,
        gated_out = ?stats.gated_out,
        "digest run complete"
    );

    Ok((digest, output_path))
}

/// Diagnostics only, not part of the digest artifact's invariants. A failure
/// here is a warning, never fatal (spec §4.9's "writes are best-effort" ethos
/// applied to the run log too).
fn write_run_log(data_dir: &Path, week_label: &str, built_at: chrono::DateTime<chrono::Utc>, stats: &RunStats) {
    let dir = data_dir.join("digest-runs");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(error = %e, "failed to create digest-runs directory, skipping run log");
        return;
    }

    let path = dir.join(format!("{week_label}-{}.json", built_at.timestamp()));
    let body = serde_json::json!({
        "week_label": week_label,
        "built_at": built_at,
        "stats": stats,
    });
    match serde_json::to_string_pretty(&body) {
        Ok(text) => {
            if let Err(e) = std::fs::write(&path, text) {
                warn!(error = %e, path = %path.display(), "failed to write run log");
            } else {
                info!(path = %path.display(), "run log saved");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize run log"),
    }
}

fn write_digest(data_dir: &Path, digest: &Digest) -> Result<PathBuf, DigestError> {
    let dir = data_dir.join("digests");
    std::fs::create_dir_all(&dir).map_err(|source| DigestError::OutputWrite {
        path: dir.display().to_string(),
        source,
    })?;

    let path = dir.join(format!("{}.json", digest.week_label));
    let tmp_path = dir.join(format!("{}.json.tmp", digest.week_label));

    let body = serde_json::to_string_pretty(digest).map_err(|e| DigestError::OutputWrite {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    std::fs::write(&tmp_path, &body).map_err(|source| DigestError::OutputWrite {
        path: tmp_path.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp_path, &path).map_err(|source| DigestError::OutputWrite {
        path: path.display().to_string(),
        source,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_article(url: &str, title: &str, source: &str, days_ago: i64) -> Article {
        Article {
            url: url.to_string(),
            id: url.to_string(),
            title: title.to_string(),
            source: source.to_string(),
            published_at: Some(Utc::now() - chrono::Duration::days(days_ago)),
            ingested_at: Utc::now(),
            snippet: Some("A short snippet describing the article's contents.".to_string()),
            source_type: None,
            discovered_at: None,
            category_hint: None,
        }
    }

    #[tokio::test]
    async fn full_run_with_no_client_produces_a_digest_and_writes_it() {
        let dir = tempfile::tempdir().unwrap();

        let articles: Vec<Article> = (0..5)
            .map(|i| {
                sample_article(
                    &format!("https://example.com/story-{i}"),
                    "Lab-grown diamond demand climbs",
                    "Jewellery Trade Weekly",
                    1,
                )
            })
            .collect();
        std::fs::write(dir.path().join("articles.json"), serde_json::to_string(&articles).unwrap()).unwrap();

        let config = Config {
            openai_api_key: None,
            classifier_model: "gpt-4o-mini".into(),
            rerank_model: "gpt-4o".into(),
            theme_model: "gpt-4o".into(),
            intro_model: "gpt-4o".into(),
            scene_director_model: "gpt-4o".into(),
            image_model: "gpt-image-1".into(),
            classifier_dry_run: true,
            data_dir: dir.path().display().to_string(),
            timezone: "UTC".into(),
        };
        let options = RunOptions {
            week_label: Some("2026-W05".to_string()),
            ..Default::default()
        };

        let (digest, path) = run(&config, &options).await.unwrap();

        assert_eq!(digest.week_label, "2026-W05");
        assert_eq!(digest.total_articles, 5);
        assert!(digest.key_themes.is_empty());
        assert!(digest.intro_paragraph.is_empty());
        assert!(path.exists());

        let reloaded: Digest = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded.week_label, digest.week_label);
    }

    #[tokio::test]
    async fn missing_article_store_is_a_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            openai_api_key: None,
            classifier_model: "gpt-4o-mini".into(),
            rerank_model: "gpt-4o".into(),
            theme_model: "gpt-4o".into(),
            intro_model: "gpt-4o".into(),
            scene_director_model: "gpt-4o".into(),
            image_model: "gpt-image-1".into(),
            classifier_dry_run: true,
            data_dir: dir.path().display().to_string(),
            timezone: "UTC".into(),
        };
        let options = RunOptions {
            week_label: Some("2026-W05".to_string()),
            ..Default::default()
        };

        let err = run(&config, &options).await.unwrap_err();
        assert!(matches!(err, DigestError::ArticleStore { .. }));
    }
}
