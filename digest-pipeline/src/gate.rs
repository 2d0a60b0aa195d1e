//! Gate (spec §4.4): per-article eligibility. Pure function of the article, the
//! week window, and a duplicate index built across the category's article set.
//! Never used for ranking.

use std::collections::HashMap;

use chrono::Duration;
use digest_common::{Article, Gate, SourceType, WeekWindow};

const SPONSORED_MARKERS: &[&str] = &["sponsored", "partner content", "advertisement", "paid post"];
const PRESS_RELEASE_MARKERS: &[&str] = &["press release", "announces", "(PR Newswire)", "(Business Wire)"];

const WAR_MARKERS: &[&str] = &["war", "invasion", "airstrike", "ceasefire"];
const CULTURE_WAR_MARKERS: &[&str] = &["culture war", "woke", "cancel culture", "boycott calls"];
const ELECTION_MARKERS: &[&str] = &["election", "ballot", "primary race", "polling"];

const POLICY_ALLOWLIST: &[&str] = &["tariff", "ai act", "gdpr", "antitrust", "regulation", "compliance"];
const RETAIL_CONTEXT: &[&str] = &[
    "retail", "ecommerce", "e-commerce", "consumer", "jewellery", "jewelry", "luxury", "store", "brand",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(&n.to_lowercase()))
}

/// Build the per-category duplicate index and gate a single article against it.
/// Callers must process a category's articles in a stable order (normalized URL
/// order matches the reranker's ordering guarantee, spec §5) so "first-seen"
/// is deterministic across reruns.
pub fn gate(
    article: &Article,
    window: &WeekWindow,
    title_first_seen: &mut HashMap<String, String>,
) -> Gate {
    let (window_ok, mut reasons, used_discovered_at_fallback) = check_window(article, window);
    if !window_ok {
        reasons.insert(0, "Outside window".to_string());
        return Gate {
            eligible: false,
            reasons,
            used_discovered_at_fallback,
            ..Default::default()
        };
    }

    let normalized_title = article.normalized_title();
    let normalized_url = article.normalized_url();
    let duplicate_of = match title_first_seen.get(&normalized_title) {
        Some(first_url) if *first_url != normalized_url => Some(first_url.clone()),
        Some(_) => None,
        None => {
            title_first_seen.insert(normalized_title, normalized_url);
            None
        }
    };

    if let Some(original) = duplicate_of {
        return Gate {
            eligible: false,
            reasons: vec!["Duplicate of another article this week".to_string()],
            duplicate_of: Some(original),
            used_discovered_at_fallback,
            ..Default::default()
        };
    }

    let haystack = format!(
        "{} {}",
        article.title,
        article.snippet.as_deref().unwrap_or("")
    );

    let sponsored = contains_any(&haystack, SPONSORED_MARKERS);
    let press_release = contains_any(&haystack, PRESS_RELEASE_MARKERS);

    let controversy_hit = contains_any(&haystack, WAR_MARKERS)
        || contains_any(&haystack, CULTURE_WAR_MARKERS)
        || contains_any(&haystack, ELECTION_MARKERS);
    let allowlisted = contains_any(&haystack, POLICY_ALLOWLIST);
    let retail_context = contains_any(&haystack, RETAIL_CONTEXT);

    let (controversial, controversial_suspected) = match (controversy_hit, allowlisted, retail_context) {
        (true, true, _) => (false, false),
        (true, false, true) => (false, true),
        (true, false, false) => (true, false),
        (false, _, _) => (false, false),
    };

    let mut gate_reasons = Vec::new();
    if controversial {
        gate_reasons.push("Controversial topic".to_string());
    }
    if sponsored {
        gate_reasons.push("Sponsored content".to_string());
    }
    if press_release {
        gate_reasons.push("Press release".to_string());
    }
    if controversial_suspected {
        gate_reasons.push("Controversial topic suspected".to_string());
    }

    Gate {
        eligible: !controversial,
        reasons: gate_reasons,
        sponsored,
        press_release,
        duplicate_of: None,
        controversial,
        controversial_suspected,
        off_category: false,
        tier: None,
        used_discovered_at_fallback,
    }
}

/// Window policy (spec §4.4). Returns `(eligible, reasons, used_discovered_at_fallback)`.
fn check_window(article: &Article, window: &WeekWindow) -> (bool, Vec<String>, bool) {
    match article.source_type {
        Some(SourceType::Discovery) => check_discovery_window(article, window),
        _ => match article.published_at {
            Some(ts) if ts >= window.start && ts <= window.end => (true, Vec::new(), false),
            Some(_) => (false, vec!["Published outside the requested week".to_string()], false),
            None => (false, vec!["No publish timestamp".to_string()], false),
        },
    }
}

fn check_discovery_window(article: &Article, window: &WeekWindow) -> (bool, Vec<String>, bool) {
    let soft_start = window.start - Duration::days(1);
    let soft_end = window.end + Duration::days(1);
    let hard_floor = window.start - Duration::days(30);

    if let Some(ts) = article.published_at {
        if ts < hard_floor {
            return (false, vec!["Discovery item older than 30-day guardrail".to_string()], false);
        }
        if ts >= soft_start && ts <= soft_end {
            return (true, Vec::new(), false);
        }
    }

    match article.discovered_at {
        Some(ts) if ts < hard_floor => {
            (false, vec!["Discovery item older than 30-day guardrail".to_string()], false)
        }
        Some(ts) if ts >= window.start && ts <= window.end => (true, Vec::new(), true),
        Some(_) => (false, vec!["Discovery timestamp outside window".to_string()], false),
        None => (false, vec!["Discovery item has no usable timestamp".to_string()], false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn window() -> WeekWindow {
        let start = "2026-02-02T00:00:00Z".parse().unwrap();
        let end = "2026-02-08T23:59:59.999Z".parse().unwrap();
        WeekWindow {
            label: "2026-W06".to_string(),
            tz: "UTC".to_string(),
            start,
            end,
        }
    }

    fn base_article(title: &str, published_at: Option<chrono::DateTime<Utc>>) -> Article {
        Article {
            url: "https://example.com/a".to_string(),
            id: "1".to_string(),
            title: title.to_string(),
            source: "Wire".to_string(),
            published_at,
            ingested_at: Utc::now(),
            snippet: None,
            source_type: None,
            discovered_at: None,
            category_hint: None,
        }
    }

    #[test]
    fn article_inside_window_is_eligible() {
        let w = window();
        let article = base_article("Neutral headline", Some(w.start + Duration::hours(1)));
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
    }

    #[test]
    fn article_without_published_at_is_ineligible() {
        let w = window();
        let article = base_article("Neutral headline", None);
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(!verdict.eligible);
    }

    #[test]
    fn discovery_soft_window_allows_18h_past_end_with_discovered_at_inside_week() {
        let w = window();
        let mut article = base_article("Neutral headline", Some(w.end + Duration::hours(18)));
        article.source_type = Some(SourceType::Discovery);
        article.discovered_at = Some(w.start + Duration::days(2));
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
        assert!(verdict.used_discovered_at_fallback);
    }

    #[test]
    fn discovery_guardrail_rejects_items_older_than_30_days() {
        let w = window();
        let mut article = base_article("Neutral headline", Some(w.start - Duration::days(40)));
        article.source_type = Some(SourceType::Discovery);
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(!verdict.eligible);
    }

    #[test]
    fn election_headline_is_gated_out() {
        let w = window();
        let article = base_article("Election polling surprises voters", Some(w.start + Duration::hours(1)));
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(!verdict.eligible);
        assert_eq!(verdict.reasons.first().map(String::as_str), Some("Controversial topic"));
    }

    #[test]
    fn policy_allowlisted_topic_stays_eligible() {
        let w = window();
        let article = base_article("EU AI Act tightens retail compliance", Some(w.start + Duration::hours(1)));
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
        assert!(!verdict.controversial);
    }

    #[test]
    fn second_article_with_same_normalized_title_is_duplicate() {
        let w = window();
        let mut seen = HashMap::new();
        let first = base_article("Same Title Here", Some(w.start + Duration::hours(1)));
        let first_verdict = gate(&first, &w, &mut seen);
        assert!(first_verdict.eligible);

        let mut second = base_article("same   title here", Some(w.start + Duration::hours(2)));
        second.url = "https://example.com/other".to_string();
        let second_verdict = gate(&second, &w, &mut seen);
        assert!(!second_verdict.eligible);
        assert!(second_verdict.duplicate_of.is_some());
    }

    #[test]
    fn war_marker_with_allowlisted_policy_term_stays_eligible() {
        let w = window();
        let article = base_article(
            "Trade war over tariffs disrupts retail supply chains",
            Some(w.start + Duration::hours(1)),
        );
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
        assert!(!verdict.controversial);
    }

    #[test]
    fn war_marker_with_retail_context_but_no_allowlist_is_suspected_not_rejected() {
        let w = window();
        let article = base_article(
            "Retail brands navigate fallout from overseas war",
            Some(w.start + Duration::hours(1)),
        );
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
        assert!(verdict.controversial_suspected);
    }

    #[test]
    fn sponsored_marker_flags_but_keeps_eligible() {
        let w = window();
        let article = base_article("New platform launch: Sponsored content", Some(w.start + Duration::hours(1)));
        let verdict = gate(&article, &w, &mut HashMap::new());
        assert!(verdict.eligible);
        assert!(verdict.sponsored);
    }
}
