use serde::{Deserialize, Serialize};

use crate::category::Category;

/// The classifier's verdict for one article (spec §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub confidence: f32,
    #[serde(default)]
    pub rationale: Option<String>,
    pub classifier_version: String,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub from_fallback: bool,
}

impl Classification {
    pub fn new(category: Category, confidence: f32, classifier_version: impl Into<String>) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: None,
            classifier_version: classifier_version.into(),
            from_cache: false,
            from_fallback: false,
        }
    }
}
