//! Scene director + image renderer (spec §4.7): a two-stage cover-image
//! pipeline. Scene direction is an LLM call producing a structured prompt;
//! the image render submits that prompt to the image service.

use std::path::{Path, PathBuf};

use digest_client::LlmClient;
use digest_common::{fingerprint, Article, FingerprintCache};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const SCENE_PROMPT_VERSION: &str = "scene-director-v1";
const MIN_IMAGE_BYTES: usize = 50 * 1024;
const CONFIDENCE_THRESHOLD: f32 = 0.55;

/// The fixed nine-element catalogue the scene director must pick at least one
/// technique from (spec §4.7, GLOSSARY "Boringness Breaker").
pub const BORINGNESS_BREAKER_CATALOGUE: &[&str] = &[
    "human micro-moment",
    "mild irony",
    "visual tension",
    "role reversal",
    "framing tricks",
    "environmental storytelling",
    "time-pressure cues",
    "soft contradiction",
    "Easter egg",
];

const SCENE_SYSTEM_PROMPT_TEMPLATE: &str = "\
You are an editorial photo director for a business-news cover image. Describe \
ONE coherent photorealistic scene: no collage, no sci-fi elements, no \
text-bearing surfaces, no visible logos. Compose for a wide banner aspect \
ratio. You must select at least one technique from this fixed catalogue to \
keep the scene from feeling generic:

human micro-moment, mild irony, visual tension, role reversal, framing \
tricks, environmental storytelling, time-pressure cues, soft contradiction, \
Easter egg

Respond with strict JSON: concept_title (string), visual_anchors (list of \
strings), boringness_breaker (object with selected and execution_note), \
final_image_prompt (string), negative_prompt (list of strings), confidence \
(0 to 1).";

const SCENE_RETRY_REMINDER: &str = "\
Your previous response left boringness_breaker.selected empty. You must name \
exactly one technique from the fixed catalogue and describe how it's executed \
in this scene.";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct BoringnessBreaker {
    selected: String,
    execution_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SceneDirectorResponse {
    concept_title: String,
    visual_anchors: Vec<String>,
    boringness_breaker: BoringnessBreaker,
    final_image_prompt: String,
    negative_prompt: Vec<String>,
    confidence: f32,
}

#[derive(Debug, Clone)]
pub struct CoverResult {
    pub image_url: String,
    pub alt: String,
    pub keywords: Vec<String>,
}

fn fallback_scene(variant: &str) -> SceneDirectorResponse {
    SceneDirectorResponse {
        concept_title: "Quiet checkout counter".to_string(),
        visual_anchors: vec!["checkout counter".to_string(), "storefront window".to_string()],
        boringness_breaker: BoringnessBreaker {
            selected: "environmental storytelling".to_string(),
            execution_note: "a single paper receipt curls on the counter in the draft from an open door".to_string(),
        },
        final_image_prompt: format!(
            "A wide editorial photograph of a quiet retail storefront at closing time, {variant} style, one employee counting the till, warm interior light against a cool blue dusk outside."
        ),
        negative_prompt: vec!["text".to_string(), "logos".to_string(), "collage".to_string()],
        confidence: 1.0,
    }
}

fn articles_fingerprint(week_label: &str, articles: &[&Article], variant: &str) -> String {
    let mut parts = vec![week_label.to_string(), variant.to_string()];
    let mut titles: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();
    titles.sort();
    parts.extend(titles);
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    fingerprint(&refs)
}

async fn direct_scene(
    client: &LlmClient,
    model: &str,
    homepage_top_articles: &[&Article],
    variant: &str,
) -> SceneDirectorResponse {
    let titles: Vec<String> = homepage_top_articles.iter().map(|a| a.title.clone()).collect();
    let user_prompt = format!("Cover style: {variant}\nThis week's top stories:\n{}", titles.join("\n"));
    let system_prompt = SCENE_SYSTEM_PROMPT_TEMPLATE;

    let first = client
        .extract::<SceneDirectorResponse>(model, system_prompt, &user_prompt, 0.7)
        .await;

    let resolved = match first {
        Ok(r) if !r.boringness_breaker.selected.trim().is_empty() => Ok(r),
        Ok(_) | Err(_) => {
            let retry_prompt = format!("{user_prompt}\n\n{SCENE_RETRY_REMINDER}");
            client
                .extract::<SceneDirectorResponse>(model, system_prompt, &retry_prompt, 0.7)
                .await
        }
    };

    match resolved {
        Ok(r) if !r.boringness_breaker.selected.trim().is_empty() && r.confidence >= CONFIDENCE_THRESHOLD => r,
        Ok(r) => {
            warn!(confidence = r.confidence, "scene director below threshold, using fallback template");
            fallback_scene(variant)
        }
        Err(e) => {
            warn!(error = %e, "scene director failed twice, using fallback template");
            fallback_scene(variant)
        }
    }
}

fn image_output_path(data_dir: &Path, week_label: &str) -> PathBuf {
    data_dir.join("weekly-images").join(format!("{week_label}.png"))
}

fn debug_artifact_path(data_dir: &Path, week_label: &str) -> PathBuf {
    data_dir.join("cover-debug").join(format!("{week_label}.json"))
}

fn write_debug_artifact(data_dir: &Path, week_label: &str, prompt: &str, model: &str, output_path: &Path) {
    let path = debug_artifact_path(data_dir, week_label);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let body = serde_json::json!({
        "prompt": prompt,
        "model": model,
        "output_path": output_path.display().to_string(),
    });
    if let Err(e) = std::fs::write(&path, serde_json::to_string_pretty(&body).unwrap_or_default()) {
        warn!(error = %e, path = %path.display(), "failed to write cover debug artifact");
    }
}

/// Generate the digest cover: scene direction then image render. `variant` is
/// the `--coverStyle` value (`realistic` or `illustration`). `regen` bypasses
/// both the scene-director cache and the existing-file image cache.
pub async fn cover(
    data_dir: &Path,
    week_label: &str,
    homepage_top_articles: &[&Article],
    variant: &str,
    client: Option<&LlmClient>,
    scene_model: &str,
    image_model: &str,
    cache: &mut FingerprintCache,
    regen: bool,
) -> CoverResult {
    let output_path = image_output_path(data_dir, week_label);

    if !regen {
        if let Ok(meta) = std::fs::metadata(&output_path) {
            if meta.len() as usize >= MIN_IMAGE_BYTES {
                info!(path = %output_path.display(), "cover image cache hit");
                return CoverResult {
                    image_url: output_path.display().to_string(),
                    alt: format!("Editorial cover image for the {week_label} digest"),
                    keywords: Vec::new(),
                };
            }
        }
    }

    let version = format!("{SCENE_PROMPT_VERSION}:{scene_model}");
    let key = articles_fingerprint(week_label, homepage_top_articles, variant);

    let scene = if !regen {
        if let Some(cached) = cache.get::<SceneDirectorResponse>(&key, &version) {
            Some(cached)
        } else {
            None
        }
    } else {
        None
    };

    let scene = match scene {
        Some(s) => s,
        None => match client {
            Some(c) => {
                let scene = direct_scene(c, scene_model, homepage_top_articles, variant).await;
                cache.put(key, &version, &scene);
                scene
            }
            None => fallback_scene(variant),
        },
    };

    let full_prompt = format!(
        "{} Negative: {}. Photorealistic, no embedded text, no logos.",
        scene.final_image_prompt,
        scene.negative_prompt.join(", ")
    );

    let alt = scene.concept_title.clone();
    let keywords = scene.visual_anchors.clone();

    let Some(client) = client else {
        return CoverResult {
            image_url: String::new(),
            alt,
            keywords,
        };
    };

    let bytes = client.generate_image(image_model, &full_prompt, true).await;

    match bytes {
        Ok(bytes) if bytes.len() >= MIN_IMAGE_BYTES => {
            if let Some(parent) = output_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(&output_path, &bytes) {
                warn!(error = %e, "failed to write cover image to disk");
                return CoverResult { image_url: String::new(), alt, keywords };
            }
            write_debug_artifact(data_dir, week_label, &full_prompt, image_model, &output_path);
            CoverResult {
                image_url: output_path.display().to_string(),
                alt,
                keywords,
            }
        }
        Ok(bytes) => {
            warn!(bytes = bytes.len(), "rendered image below size threshold, treating as failure");
            CoverResult { image_url: String::new(), alt, keywords }
        }
        Err(e) => {
            warn!(error = %e, "image render failed");
            CoverResult { image_url: String::new(), alt, keywords }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_scene_picks_from_the_fixed_catalogue() {
        let scene = fallback_scene("realistic");
        assert!(BORINGNESS_BREAKER_CATALOGUE.contains(&scene.boringness_breaker.selected.as_str()));
    }

    #[test]
    fn catalogue_has_nine_elements() {
        assert_eq!(BORINGNESS_BREAKER_CATALOGUE.len(), 9);
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs_regardless_of_article_order() {
        let a = Article {
            url: "https://example.com/a".to_string(),
            id: "a".to_string(),
            title: "B title".to_string(),
            source: "S".to_string(),
            published_at: None,
            ingested_at: chrono::Utc::now(),
            snippet: None,
            source_type: None,
            discovered_at: None,
            category_hint: None,
        };
        let mut b = a.clone();
        b.title = "A title".to_string();

        let forward = articles_fingerprint("2026-W05", &[&a, &b], "realistic");
        let backward = articles_fingerprint("2026-W05", &[&b, &a], "realistic");
        assert_eq!(forward, backward);
    }
}
