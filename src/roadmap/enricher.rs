//! Curated keyword table and the description/subtopic enrichment it drives.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::ServiceResult;
use crate::roadmap::normalize::normalize_query;
use crate::types::TopicItem;

/// Descriptions at or under this many characters are considered unhelpful.
pub const MIN_DESCRIPTION_CHARS: usize = 12;
pub const MAX_CURATED_SUBTOPICS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CuratedEntry {
    pub keyword: String,
    pub description: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CuratedTable {
    #[serde(rename = "entry", default)]
    pub entries: Vec<CuratedEntry>,
}

impl Default for CuratedTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn entry(keyword: &str, description: &str, subtopics: &[&str]) -> CuratedEntry {
    CuratedEntry {
        keyword: keyword.to_string(),
        description: description.to_string(),
        subtopics: subtopics.iter().map(|s| s.to_string()).collect(),
    }
}

impl CuratedTable {
    /// The table shipped with the binary. Order matters: the first keyword
    /// that matches wins.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                entry(
                    "html",
                    "Structure of web pages: tags, elements, semantic meaning and accessibility basics.",
                    &[
                        "HTML syntax & structure",
                        "Semantic elements (header, main, nav, article)",
                        "Forms & inputs",
                        "Accessibility basics (a11y)",
                    ],
                ),
                entry(
                    "css",
                    "Styling and layout: selectors, cascading, Flexbox, Grid, responsive design basics.",
                    &["Selectors & specificity", "Box model", "Flexbox", "Grid", "Responsive design"],
                ),
                entry(
                    "javascript",
                    "Programming for the web: language basics, DOM, events, and async patterns.",
                    &[
                        "Syntax & data types",
                        "DOM manipulation",
                        "Events & handlers",
                        "Promises & async/await",
                    ],
                ),
                entry(
                    "react",
                    "Component-driven UI: JSX, state, props, basic hooks and component lifecycle.",
                    &[
                        "JSX & components",
                        "State & props",
                        "useEffect/useState basics",
                        "Routing (intro)",
                    ],
                ),
                entry(
                    "typescript",
                    "Static typing on top of JavaScript: basic types, interfaces, and typing React.",
                    &["Type annotations", "Interfaces & types", "Generics (intro)"],
                ),
            ],
        }
    }

    pub fn from_toml_str(raw: &str) -> ServiceResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Built-in table merged with a TOML file: entries with a known keyword
    /// replace the built-in one, others are appended.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut table = Self::builtin();
        table.merge(Self::from_toml_str(&raw)?);
        Ok(table)
    }

    pub fn merge(&mut self, other: CuratedTable) {
        for incoming in other.entries {
            let keyword = incoming.keyword.trim().to_lowercase();
            let merged = CuratedEntry { keyword, ..incoming };
            match self.entries.iter().position(|e| e.keyword == merged.keyword) {
                Some(i) => self.entries[i] = merged,
                None => self.entries.push(merged),
            }
        }
    }

    fn first_match(&self, haystacks: &[&str]) -> Option<&CuratedEntry> {
        self.entries
            .iter()
            .find(|e| !e.keyword.is_empty() && haystacks.iter().any(|h| h.contains(&e.keyword)))
    }
}

fn is_insufficient(description: &str) -> bool {
    description.trim().chars().count() <= MIN_DESCRIPTION_CHARS
}

fn apply(mut item: TopicItem, curated: &CuratedEntry) -> TopicItem {
    item.short_description = curated.description.clone();
    if item.subtopics.is_empty() {
        item.subtopics = curated
            .subtopics
            .iter()
            .take(MAX_CURATED_SUBTOPICS)
            .cloned()
            .collect();
    }
    item
}

/// Fill in missing or too-short descriptions from the curated table. Entries
/// are tried in table order and the first keyword found in either the query
/// or the item title wins; items with a useful description are returned
/// untouched.
pub fn enrich_topics(query: &str, items: Vec<TopicItem>, table: &CuratedTable) -> Vec<TopicItem> {
    let query_norm = normalize_query(query);
    items
        .into_iter()
        .map(|item| {
            if !is_insufficient(&item.short_description) {
                return item;
            }
            let title_norm = normalize_query(&item.title);
            match table.first_match(&[&query_norm, &title_norm]) {
                Some(curated) => {
                    debug!(title = %item.title, keyword = %curated.keyword, "enriching topic");
                    apply(item, curated)
                }
                None => item,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(title: &str, description: &str) -> TopicItem {
        TopicItem {
            id: title.to_string(),
            title: title.to_string(),
            short_description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn fills_missing_description_from_title_keyword() {
        let table = CuratedTable::builtin();
        let out = enrich_topics("", vec![topic("Semantic HTML", "")], &table);
        assert!(out[0].short_description.starts_with("Structure of web pages"));
        assert_eq!(out[0].subtopics.len(), 3);
        assert_eq!(out[0].subtopics[0], "HTML syntax & structure");
    }

    #[test]
    fn keeps_useful_descriptions() {
        let table = CuratedTable::builtin();
        let description = "A fifty character description of the HTML module..";
        assert_eq!(description.len(), 50);
        let original = topic("HTML forms", description);
        let out = enrich_topics("html", vec![original.clone()], &table);
        assert_eq!(out[0], original);
    }

    #[test]
    fn short_descriptions_are_replaced_and_subtopics_kept() {
        let table = CuratedTable::builtin();
        let mut item = topic("Flexbox", "layout");
        item.subtopics = vec!["justify-content".into()];
        let out = enrich_topics("learn css", vec![item], &table);
        assert!(out[0].short_description.starts_with("Styling and layout"));
        assert_eq!(out[0].subtopics, vec!["justify-content"]);
    }

    #[test]
    fn typo_in_query_still_matches() {
        let table = CuratedTable::builtin();
        let out = enrich_topics("TML basics", vec![topic("Getting started", "")], &table);
        assert!(out[0].short_description.starts_with("Structure of web pages"));
    }

    #[test]
    fn table_order_decides_between_query_and_title() {
        let table = CuratedTable::builtin();
        let out = enrich_topics("html, css", vec![topic("css", "")], &table);
        assert!(out[0].short_description.starts_with("Structure of web pages"));
        assert_eq!(out[0].subtopics[0], "HTML syntax & structure");
    }

    #[test]
    fn unmatched_items_are_unchanged() {
        let table = CuratedTable::builtin();
        let item = topic("Kubernetes", "");
        let out = enrich_topics("devops", vec![item.clone()], &table);
        assert_eq!(out[0], item);
    }

    #[test]
    fn toml_entries_extend_and_replace() {
        let mut table = CuratedTable::builtin();
        let extra = CuratedTable::from_toml_str(
            r#"
            [[entry]]
            keyword = "Rust"
            description = "Systems programming with ownership and borrowing."
            subtopics = ["Ownership", "Traits"]

            [[entry]]
            keyword = "css"
            description = "Custom CSS description for the team."
            "#,
        )
        .unwrap();
        table.merge(extra);
        assert_eq!(table.entries.len(), 6);
        assert_eq!(table.entries[1].description, "Custom CSS description for the team.");
        let out = enrich_topics("", vec![topic("rust ownership", "")], &table);
        assert_eq!(out[0].subtopics, vec!["Ownership", "Traits"]);
    }
}
