//! The basic (non-weekly) plan: a flat list of topics with short descriptions.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::info;
use ulid::Ulid;

use crate::roadmap::enricher::{CuratedTable, enrich_topics};
use crate::roadmap::normalize::{has_bullet, strip_bullet, truncate_chars, value_to_text};
use crate::roadmap::parser::{
    Strategy, TITLE_MAX_CHARS, envelope_candidates, extract_json, looks_like_json, run_strategies,
};
use crate::types::TopicItem;

const DETAIL_JOINER: &str = " • ";

static TITLE_AND_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+\.\s*)?([A-Za-z0-9 &+.#-]{2,60})\s*[:\-—]\s*(.+)$").unwrap()
});
static QUERY_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,|/&]").unwrap());
static INLINE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-:—]").unwrap());

fn new_id() -> String {
    Ulid::new().to_string()
}

fn text_of(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(value_to_text)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn carry_progress(item: &mut TopicItem, map: &Map<String, Value>) {
    item.completed = map.get("completed").and_then(Value::as_bool).unwrap_or(false);
    item.project_link = text_of(map, &["projectLink", "project_link"]);
}

fn topic_from_object(map: &Map<String, Value>, idx: usize) -> TopicItem {
    let title = text_of(map, &["title", "topic", "name"]);
    let id = text_of(map, &["id"]);
    let mut item = TopicItem {
        id: if id.is_empty() { new_id() } else { id },
        title: if title.is_empty() {
            format!("Topic {}", idx + 1)
        } else {
            truncate_chars(&title, TITLE_MAX_CHARS)
        },
        short_description: text_of(map, &["description", "shortDescription", "summary"]),
        subtopics: string_list(map.get("subtopics")),
        ..Default::default()
    };
    carry_progress(&mut item, map);
    item
}

/// `"Title - description"` or `"Title: description"` list entries.
fn topic_from_string(raw: &str, idx: usize) -> TopicItem {
    let mut parts = INLINE_SEPARATOR.split(raw).map(str::trim);
    let title = parts.next().filter(|t| !t.is_empty()).map(str::to_string);
    let rest: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    TopicItem {
        id: new_id(),
        title: title.unwrap_or_else(|| format!("Topic {}", idx + 1)),
        short_description: rest.join(" - "),
        ..Default::default()
    }
}

fn topic_from_week(value: &Value, idx: usize) -> TopicItem {
    let Value::Object(map) = value else {
        return topic_from_string(&value_to_text(value).unwrap_or_default(), idx);
    };
    let title = text_of(map, &["title"]);
    let week = map
        .get("week")
        .and_then(value_to_text)
        .unwrap_or_else(|| (idx + 1).to_string());
    let short_description = match map.get("details") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(DETAIL_JOINER),
        Some(other) => value_to_text(other).unwrap_or_default(),
        None => String::new(),
    };
    let mut item = TopicItem {
        id: new_id(),
        title: if title.is_empty() { format!("Week {week}") } else { title },
        short_description,
        subtopics: string_list(map.get("subtopics")),
        ..Default::default()
    };
    carry_progress(&mut item, map);
    item
}

fn topic_from_section(value: &Value, idx: usize) -> TopicItem {
    let Value::Object(map) = value else {
        return topic_from_string(&value_to_text(value).unwrap_or_default(), idx);
    };
    let title = text_of(map, &["section_title", "title"]);
    TopicItem {
        id: new_id(),
        title: if title.is_empty() { format!("Topic {}", idx + 1) } else { title },
        subtopics: string_list(map.get("topics")),
        ..Default::default()
    }
}

fn map_array(
    value: &Value,
    key: &str,
    project: fn(&Value, usize) -> TopicItem,
) -> Option<Vec<TopicItem>> {
    let items = value.get(key)?.as_array().filter(|a| !a.is_empty())?;
    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(idx, v)| project(v, idx))
            .collect(),
    )
}

fn topics_array(value: &Value, _depth: usize) -> Option<Vec<TopicItem>> {
    map_array(value, "topics", |v, idx| match v {
        Value::Object(map) => topic_from_object(map, idx),
        other => topic_from_string(&value_to_text(other).unwrap_or_default(), idx),
    })
}

fn weeks_array(value: &Value, _depth: usize) -> Option<Vec<TopicItem>> {
    map_array(value, "weeks", topic_from_week)
}

fn sections_array(value: &Value, _depth: usize) -> Option<Vec<TopicItem>> {
    map_array(value, "sections", topic_from_section)
}

fn top_level_array(value: &Value, _depth: usize) -> Option<Vec<TopicItem>> {
    let items = value.as_array().filter(|a| !a.is_empty())?;
    Some(
        items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(idx, v)| match v {
                Value::Object(map) => topic_from_object(map, idx),
                other => topic_from_string(&value_to_text(other).unwrap_or_default(), idx),
            })
            .collect(),
    )
}

fn nested_payload(value: &Value, depth: usize) -> Option<Vec<TopicItem>> {
    envelope_candidates(value)
        .into_iter()
        .map(|inner| run_strategies(TOPIC_STRATEGIES, inner, depth + 1))
        .find(|items| !items.is_empty())
}

fn embedded_json(value: &Value, depth: usize) -> Option<Vec<TopicItem>> {
    let text = value.as_str()?;
    if !looks_like_json(text) {
        return None;
    }
    let parsed = extract_json(text)?;
    Some(run_strategies(TOPIC_STRATEGIES, &parsed, depth + 1))
}

/// Line formats: `1. Title - description`, a title followed by bullet lines,
/// or a bare title.
fn text_lines(value: &Value, _depth: usize) -> Option<Vec<TopicItem>> {
    let text = value.as_str()?;
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut items = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = TITLE_AND_DESCRIPTION.captures(line) {
            items.push(TopicItem {
                id: new_id(),
                title: caps[1].trim().to_string(),
                short_description: caps[2].trim().to_string(),
                ..Default::default()
            });
            i += 1;
            continue;
        }
        let mut j = i + 1;
        let mut bullets = Vec::new();
        while j < lines.len() && has_bullet(lines[j]) {
            bullets.push(strip_bullet(lines[j]));
            j += 1;
        }
        items.push(TopicItem {
            id: new_id(),
            title: truncate_chars(&strip_bullet(line), TITLE_MAX_CHARS),
            short_description: bullets.join(DETAIL_JOINER),
            ..Default::default()
        });
        i = j;
    }
    (!items.is_empty()).then_some(items)
}

const TOPIC_STRATEGIES: &[Strategy<TopicItem>] = &[
    Strategy { name: "topics", extract: topics_array },
    Strategy { name: "weeks", extract: weeks_array },
    Strategy { name: "sections", extract: sections_array },
    Strategy { name: "array", extract: top_level_array },
    Strategy { name: "envelope", extract: nested_payload },
    Strategy { name: "json-text", extract: embedded_json },
    Strategy { name: "text-lines", extract: text_lines },
];

/// Parse an arbitrary response into topic items.
pub fn parse_topics(input: Option<&Value>) -> Vec<TopicItem> {
    match input {
        Some(value) => run_strategies(TOPIC_STRATEGIES, value, 0),
        None => Vec::new(),
    }
}

/// Topics straight from the user's query: `html, css / js` → three items.
pub fn synthesize_topics(query: &str) -> Vec<TopicItem> {
    let parts: Vec<String> = QUERY_SPLIT
        .split(query)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let titles = if parts.is_empty() {
        vec![query.trim().to_string()]
    } else {
        parts
    };
    titles
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(|title| TopicItem {
            id: new_id(),
            title,
            ..Default::default()
        })
        .collect()
}

/// Parse, fall back to the query, then enrich with the curated table. The
/// enrichment query is the topic, or the learner's current knowledge when no
/// topic was given.
pub fn build_topic_plan(
    input: Option<&Value>,
    query: &str,
    current_knowledge: Option<&str>,
    table: &CuratedTable,
) -> Vec<TopicItem> {
    let mut items = parse_topics(input);
    if items.is_empty() {
        info!(%query, "no topics parsed from response; using the query");
        items = synthesize_topics(query);
    }
    let enrichment_query = if query.trim().is_empty() {
        current_knowledge.unwrap_or_default()
    } else {
        query
    };
    enrich_topics(enrichment_query, items, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn maps_topic_objects() {
        let input = json!({ "topics": [
            { "title": "HTML", "description": "Markup", "subtopics": "Tags\nForms" },
            { "topic": "CSS", "completed": true }
        ]});
        let items = parse_topics(Some(&input));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "HTML");
        assert_eq!(items[0].subtopics, vec!["Tags", "Forms"]);
        assert_eq!(items[1].title, "CSS");
        assert!(items[1].completed);
        let ids: HashSet<_> = items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn converts_week_shapes() {
        let input = json!({ "weeks": [{ "week": 1, "title": "", "details": ["a", "b"] }] });
        let items = parse_topics(Some(&input));
        assert_eq!(items[0].title, "Week 1");
        assert_eq!(items[0].short_description, "a • b");
    }

    #[test]
    fn parses_text_formats() {
        let text = "1. HTML - Structure and semantic elements\nCSS: Styling\nJavaScript\n- DOM\n- Events\nReact";
        let items = parse_topics(Some(&Value::String(text.into())));
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["HTML", "CSS", "JavaScript", "React"]);
        assert_eq!(items[0].short_description, "Structure and semantic elements");
        assert_eq!(items[2].short_description, "DOM • Events");
        assert_eq!(items[3].short_description, "");
    }

    #[test]
    fn string_arrays_split_on_separator() {
        let items = parse_topics(Some(&json!(["Git: version control", "Docker"])));
        assert_eq!(items[0].title, "Git");
        assert_eq!(items[0].short_description, "version control");
        assert_eq!(items[1].title, "Docker");
    }

    #[test]
    fn empty_response_uses_query_and_enriches() {
        let table = CuratedTable::builtin();
        let items = build_topic_plan(None, "html, css & react", None, &table);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["html", "css", "react"]);
        assert!(items
            .iter()
            .all(|i| i.short_description.starts_with("Structure of web pages")));
    }

    #[test]
    fn tolerates_garbage() {
        assert!(parse_topics(Some(&json!(7))).is_empty());
        assert!(parse_topics(Some(&Value::Null)).is_empty());
        let items = parse_topics(Some(&Value::String("{not json".into())));
        assert_eq!(items.len(), 1);
    }
}
