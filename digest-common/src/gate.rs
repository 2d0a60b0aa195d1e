use serde::{Deserialize, Serialize};

/// Confidence-tier hint carried for reranker context only — never used for
/// ranking itself (spec §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Med,
    Low,
}

/// Per-article eligibility verdict (spec §3, §4.4). Pure function of the
/// article and the week window; never used for ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gate {
    pub eligible: bool,
    /// Ordered; the first entry is the primary cause of ineligibility (or, when
    /// eligible, the first notable flag).
    pub reasons: Vec<String>,
    pub sponsored: bool,
    pub press_release: bool,
    pub duplicate_of: Option<String>,
    pub controversial: bool,
    pub controversial_suspected: bool,
    pub off_category: bool,
    pub tier: Option<Tier>,
    /// Set when a discovery-origin article's eligibility was decided by
    /// `discovered_at` rather than `published_at` (spec §4.4).
    #[serde(default)]
    pub used_discovered_at_fallback: bool,
}

impl Gate {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            ..Default::default()
        }
    }

    pub fn ineligible(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reasons: vec![reason.into()],
            ..Default::default()
        }
    }

    pub fn add_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }
}
