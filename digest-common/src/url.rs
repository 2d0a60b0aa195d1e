//! URL and title normalization, centralized per spec §9 ("URL as the primary key").
//!
//! Every cache key, dedup check, and cross-category disjointness check in the
//! pipeline depends on the definitions in this module — never re-implement them
//! locally in a component.

/// Normalize a URL for use as a cache/dedup key: lowercase the host, strip a
/// single trailing slash from the path, preserve scheme and query string.
pub fn normalize_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => return url.trim_end_matches('/').to_string(),
    };

    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let authority = authority.to_lowercase();

    let path_and_query = if path_and_query.is_empty() || path_and_query == "/" {
        String::new()
    } else if let Some((path, query)) = path_and_query.split_once('?') {
        let path = path.trim_end_matches('/');
        format!("{path}?{query}")
    } else {
        path_and_query.trim_end_matches('/').to_string()
    };

    format!("{scheme}://{authority}{path_and_query}")
}

/// Normalize a title for dedup comparison: lowercase, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the lowercased host from a URL (used for per-source diversity caps).
pub fn extract_host(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_host_and_strips_trailing_slash() {
        assert_eq!(
            normalize_url("https://Example.COM/Path/"),
            "https://example.com/Path"
        );
    }

    #[test]
    fn preserves_query_string() {
        assert_eq!(
            normalize_url("https://example.com/path/?utm=1"),
            "https://example.com/path?utm=1"
        );
    }

    #[test]
    fn preserves_scheme() {
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn root_path_has_no_trailing_slash() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
    }

    #[test]
    fn title_normalization_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_title("  The  Future Of   Retail  "),
            "the future of retail"
        );
    }

    #[test]
    fn extract_host_strips_scheme_and_path() {
        assert_eq!(extract_host("https://www.Vogue.com/article/x"), "www.vogue.com");
    }
}
