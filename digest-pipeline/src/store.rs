//! Article store adapter (spec §4.2): a read-only view of the canonical article
//! set with a per-week discovery overlay applied on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use digest_common::{Article, DigestError, WeekWindow};
use tracing::{info, warn};

/// Reads `{data_dir}/articles.json` (the canonical store) and, when present,
/// `{data_dir}/weeks/{label}/discoveryArticles.json` (spec §6). Overlay items
/// replace canonical items sharing the same normalized URL.
pub struct ArticleStore {
    data_dir: PathBuf,
}

impl ArticleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn load(&self, window: &WeekWindow) -> Result<Vec<Article>, DigestError> {
        let canonical_path = self.data_dir.join("articles.json");
        let canonical = read_articles(&canonical_path)?;

        let overlay_path = self
            .data_dir
            .join("weeks")
            .join(&window.label)
            .join("discoveryArticles.json");
        let overlay = match read_articles_optional(&overlay_path) {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %overlay_path.display(), error = %e, "discovery overlay unreadable, ignoring");
                Vec::new()
            }
        };

        let mut by_url: HashMap<String, Article> = HashMap::new();
        for article in canonical {
            by_url.insert(article.normalized_url(), article);
        }
        let overlay_count = overlay.len();
        for article in overlay {
            by_url.insert(article.normalized_url(), article);
        }

        info!(
            canonical = by_url.len(),
            overlay_applied = overlay_count,
            week = %window.label,
            "article store loaded"
        );

        Ok(by_url.into_values().collect())
    }
}

fn read_articles(path: &Path) -> Result<Vec<Article>, DigestError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DigestError::ArticleStore {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        DigestError::ArticleStore {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        }
    })
}

fn read_articles_optional(path: &Path) -> Result<Vec<Article>, DigestError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_articles(path)
}
