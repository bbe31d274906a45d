// src/utils/url.rs

//! URL manipulation utilities.

use regex::Regex;

/// Normalize a URL for use as a cache key.
///
/// Scheme and host are lower-cased by the parser, the fragment is dropped
/// and query pairs are sorted. Unparsable input is returned trimmed.
///
/// # Examples
/// ```
/// use goalcrawler::utils::url::normalize;
///
/// assert_eq!(
///     normalize("HTTPS://Example.com/a?b=2&a=1#top"),
///     "https://example.com/a?a=1&b=2"
/// );
/// ```
pub fn normalize(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    parsed.to_string()
}

/// Page index encoded in a listing URL, captured by group 1 of `pattern`.
pub fn page_index(url: &str, pattern: &Regex) -> Option<u32> {
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Append a path suffix, inserting a slash when needed.
pub fn append_suffix(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return base.to_string();
    }
    match (base.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{}{}", base, &suffix[1..]),
        (false, false) => format!("{base}/{suffix}"),
        _ => format!("{base}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_query_and_drops_fragment() {
        assert_eq!(
            normalize("https://example.com/x?page=2&id=7#frag"),
            "https://example.com/x?id=7&page=2"
        );
    }

    #[test]
    fn test_normalize_equal_for_equivalent_urls() {
        assert_eq!(
            normalize("https://EXAMPLE.com/x?b=1&a=2"),
            normalize("https://example.com/x?a=2&b=1")
        );
    }

    #[test]
    fn test_normalize_invalid_passthrough() {
        assert_eq!(normalize("  not a url "), "not a url");
    }

    #[test]
    fn test_page_index() {
        let pattern = Regex::new(r"(?i)statLR-Page=(\d+)").unwrap();
        assert_eq!(page_index("https://x.com/r/?statLR-Page=3", &pattern), Some(3));
        assert_eq!(page_index("https://x.com/r/?Ajax=1&statlr-page=0", &pattern), Some(0));
        assert_eq!(page_index("https://x.com/r/", &pattern), None);
    }

    #[test]
    fn test_append_suffix() {
        assert_eq!(append_suffix("https://x.com/s/", "results/"), "https://x.com/s/results/");
        assert_eq!(append_suffix("https://x.com/s", "results/"), "https://x.com/s/results/");
        assert_eq!(append_suffix("https://x.com/s/", "/results/"), "https://x.com/s/results/");
    }
}
