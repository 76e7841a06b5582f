//! String helpers shared by the parser, the expander and the enricher.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static TML_TYPO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btml\b").unwrap());
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_/|,:;.•·—–]+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static LIST_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:[,;|]|\band\b)\s*").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*•]+\s*").unwrap());
static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase, fix the `tml` typo, turn separator punctuation into spaces and
/// collapse whitespace.
pub fn normalize_query(raw: &str) -> String {
    let fixed = TML_TYPO.replace_all(raw, "html").to_lowercase();
    let spaced = SEPARATORS.replace_all(&fixed, " ");
    WHITESPACE.replace_all(spaced.trim(), " ").to_string()
}

/// Remove a leading `-`, `*` or `•` bullet and surrounding whitespace.
pub fn strip_bullet(line: &str) -> String {
    BULLET.replace(line, "").trim().to_string()
}

pub fn has_bullet(line: &str) -> bool {
    BULLET.is_match(line) && !line.trim_start().starts_with("---")
}

/// Split a labelled list such as `a, b; c | d and e`.
pub fn split_list(raw: &str) -> Vec<String> {
    LIST_SPLIT
        .split(raw)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>().trim_end().to_string()
    }
}

/// Order-preserving dedupe, keeping at most `cap` entries.
pub fn dedupe_capped(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .take(cap)
        .collect()
}

/// Scalar JSON values as text; objects and arrays yield `None`.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn slugify(raw: &str) -> String {
    let lower = raw.to_lowercase();
    NON_SLUG
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

pub fn youtube_search_url(query: &str) -> String {
    search_url("https://www.youtube.com/results", &[("search_query", query)])
}

pub fn github_search_url(query: &str) -> String {
    search_url(
        "https://github.com/search",
        &[("q", query), ("type", "repositories")],
    )
}

pub fn github_topic_url(topic: &str) -> String {
    let slug = slugify(topic);
    if slug.is_empty() {
        "https://github.com/topics".to_string()
    } else {
        format!("https://github.com/topics/{slug}")
    }
}

fn search_url(base: &str, params: &[(&str, &str)]) -> String {
    match Url::parse_with_params(base, params) {
        Ok(url) => url.to_string(),
        Err(_) => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_typos_and_separators() {
        assert_eq!(normalize_query("  TML/CSS -  Basics "), "html css basics");
        assert_eq!(normalize_query("Front-end   React"), "front end react");
    }

    #[test]
    fn splits_labelled_lists() {
        assert_eq!(
            split_list("github.com/a/b, github.com/c/d; x | y and z"),
            vec!["github.com/a/b", "github.com/c/d", "x", "y", "z"]
        );
        assert!(split_list("  ,  ").is_empty());
    }

    #[test]
    fn strips_bullets() {
        assert_eq!(strip_bullet("- Learn loops"), "Learn loops");
        assert_eq!(strip_bullet("• Learn loops"), "Learn loops");
        assert_eq!(strip_bullet("Learn loops"), "Learn loops");
    }

    #[test]
    fn dedupes_and_caps() {
        let items = (0..12).map(|i| format!("item-{}", i % 10)).collect();
        let out = dedupe_capped(items, 8);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], "item-0");
        assert_eq!(out[7], "item-7");
    }

    #[test]
    fn builds_encoded_search_urls() {
        let url = youtube_search_url("rust async playlist");
        assert!(url.starts_with("https://www.youtube.com/results?search_query="));
        assert!(!url.contains(' '));
        assert_eq!(github_topic_url("Machine Learning!"), "https://github.com/topics/machine-learning");
    }
}
