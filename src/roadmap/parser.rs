//! Tolerant reader for roadmap responses of unknown shape.
//!
//! The input is whatever the backend or a model handed back: an object in one
//! of several layouts, a JSON document hidden inside a string, or plain text
//! with "Week N" headings. Each layout is handled by one named strategy; the
//! strategies are tried in order and the first one that recognises the input
//! wins. Nothing in here fails: unreadable input yields an empty list and
//! [`build_weekly_plan`] turns that into a synthesized plan.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::roadmap::distributor::project_suggestions;
use crate::roadmap::normalize::{
    dedupe_capped, github_search_url, github_topic_url, split_list, strip_bullet, truncate_chars,
    value_to_text, youtube_search_url,
};
use crate::types::{WeekId, WeekRecord};

pub const MAX_WEEKS: usize = 24;
pub const MAX_LINKS: usize = 8;
pub const SYNTHESIZED_WEEKS: usize = 6;
pub const TITLE_MAX_CHARS: usize = 80;
const MAX_DEPTH: usize = 8;

/// Keys under which envelopes commonly nest the real payload.
pub(crate) const ENVELOPE_KEYS: &[&str] = &["content", "text", "result", "data", "roadmap"];
pub(crate) const ENVELOPE_POINTERS: &[&str] = &[
    "/choices/0/message/content",
    "/choices/0/text",
    "/candidates/0/content/parts/0/text",
];

static WEEK_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s#*>•-]*week\s*(\d+)\b\s*[:.)\-–—]?\s*(.*)$").unwrap()
});
static WEEK_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bweek\s*(\d+)").unwrap());
static LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(repos|repositories|github|projects|project ideas|youtube|playlists|videos)\s*:\s*(.*)$",
    )
    .unwrap()
});
static JSON_KEY_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:sections|weeks|topics)"\s*:"#).unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkField {
    Repos,
    Projects,
    Youtube,
}

impl LinkField {
    fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "repos" | "repositories" | "github" => LinkField::Repos,
            "projects" | "project ideas" => LinkField::Projects,
            _ => LinkField::Youtube,
        }
    }

    fn target<'a>(&self, week: &'a mut WeekRecord) -> &'a mut Vec<String> {
        match self {
            LinkField::Repos => &mut week.repos,
            LinkField::Projects => &mut week.projects,
            LinkField::Youtube => &mut week.youtube,
        }
    }
}

/// One way of reading an upstream response.
pub(crate) struct Strategy<T> {
    pub name: &'static str,
    pub extract: fn(&Value, usize) -> Option<Vec<T>>,
}

pub(crate) fn run_strategies<T>(strategies: &[Strategy<T>], value: &Value, depth: usize) -> Vec<T> {
    if depth > MAX_DEPTH {
        debug!(depth, "roadmap payload nested too deeply; giving up");
        return Vec::new();
    }
    for strategy in strategies {
        if let Some(records) = (strategy.extract)(value, depth) {
            debug!(
                strategy = strategy.name,
                records = records.len(),
                "roadmap strategy matched"
            );
            return records;
        }
    }
    Vec::new()
}

const WEEK_STRATEGIES: &[Strategy<WeekRecord>] = &[
    Strategy { name: "sections", extract: sections_array },
    Strategy { name: "weeks", extract: weeks_array },
    Strategy { name: "array", extract: top_level_array },
    Strategy { name: "envelope", extract: nested_payload },
    Strategy { name: "json-text", extract: embedded_json },
    Strategy { name: "week-headings", extract: week_headings },
    Strategy { name: "plain-lines", extract: plain_lines },
];

/// Parse an arbitrary response into week records. `None` stands for an
/// absent response.
pub fn parse_weeks(input: Option<&Value>) -> Vec<WeekRecord> {
    match input {
        Some(value) => run_strategies(WEEK_STRATEGIES, value, 0),
        None => Vec::new(),
    }
}

fn non_empty_array<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
}

fn sections_array(value: &Value, _depth: usize) -> Option<Vec<WeekRecord>> {
    non_empty_array(value, "sections").map(|items| project_items(items))
}

fn weeks_array(value: &Value, _depth: usize) -> Option<Vec<WeekRecord>> {
    non_empty_array(value, "weeks").map(|items| project_items(items))
}

fn top_level_array(value: &Value, _depth: usize) -> Option<Vec<WeekRecord>> {
    value
        .as_array()
        .filter(|a| !a.is_empty())
        .map(|items| project_items(items))
}

/// Values nested under envelope keys or API-style paths, in priority order.
pub(crate) fn envelope_candidates(value: &Value) -> Vec<&Value> {
    if !value.is_object() {
        return Vec::new();
    }
    ENVELOPE_KEYS
        .iter()
        .filter_map(|key| value.get(*key))
        .chain(ENVELOPE_POINTERS.iter().filter_map(|p| value.pointer(p)))
        .filter(|v| match v {
            Value::String(s) => !s.trim().is_empty(),
            Value::Object(_) | Value::Array(_) => true,
            _ => false,
        })
        .collect()
}

fn nested_payload(value: &Value, depth: usize) -> Option<Vec<WeekRecord>> {
    envelope_candidates(value)
        .into_iter()
        .map(|inner| run_strategies(WEEK_STRATEGIES, inner, depth + 1))
        .find(|records| !records.is_empty())
}

pub(crate) fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[') || JSON_KEY_HINT.is_match(text)
}

/// Parse the JSON document starting at the first `{` or `[`. Trailing prose is
/// tolerated only after an object, so `[1] Intro` stays text.
pub(crate) fn extract_json(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    let candidate = &text[start..];
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }
    let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_object() => Some(value),
        _ => None,
    }
}

fn embedded_json(value: &Value, depth: usize) -> Option<Vec<WeekRecord>> {
    let text = value.as_str()?;
    if !looks_like_json(text) {
        return None;
    }
    let parsed = extract_json(text)?;
    Some(run_strategies(WEEK_STRATEGIES, &parsed, depth + 1))
}

fn clean_heading_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == ':' || c.is_whitespace())
        .to_string()
}

fn week_headings(value: &Value, _depth: usize) -> Option<Vec<WeekRecord>> {
    let text = value.as_str()?;
    let mut records = Vec::new();
    let mut current: Option<WeekRecord> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = WEEK_HEADING.captures(line) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            let number = caps.get(1).map(|m| m.as_str()).unwrap_or("1");
            let title = caps
                .get(2)
                .map(|m| clean_heading_title(m.as_str()))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Week {number}"));
            current = Some(WeekRecord::new(WeekId::from(number), title));
            continue;
        }
        let Some(week) = current.as_mut() else {
            continue;
        };
        let cleaned = strip_bullet(line);
        if cleaned.is_empty() {
            continue;
        }
        match LABELLED.captures(&cleaned) {
            Some(caps) => {
                let field = LinkField::from_label(&caps[1]);
                field.target(week).extend(split_list(&caps[2]));
            }
            None => week.details.push(cleaned),
        }
    }
    if let Some(done) = current.take() {
        records.push(done);
    }
    (!records.is_empty()).then_some(records)
}

fn plain_lines(value: &Value, _depth: usize) -> Option<Vec<WeekRecord>> {
    let text = value.as_str()?;
    let records: Vec<WeekRecord> = text
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| WeekRecord::new(idx as u32 + 1, truncate_chars(&line, TITLE_MAX_CHARS)))
        .collect();
    (!records.is_empty()).then_some(records)
}

fn project_items(items: &[Value]) -> Vec<WeekRecord> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_null())
        .map(|(idx, item)| project_item(item, idx))
        .collect()
}

fn first_text(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(value_to_text)
        .find(|s| !s.is_empty())
}

fn week_from_value(value: &Value) -> Option<WeekId> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok())
            .map(WeekId::Number),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.parse::<u32>().is_ok() {
                Some(WeekId::Label(trimmed.to_string()))
            } else {
                week_in_text(trimmed).map(|n| WeekId::Label(n.to_string()))
            }
        }
        _ => None,
    }
}

fn week_in_text(text: &str) -> Option<u32> {
    WEEK_IN_TEXT
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Text of a list-ish element: scalars as-is, objects by their most
/// descriptive field.
fn element_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => first_text(
            map,
            &["url", "html_url", "link", "title", "name", "text", "description"],
        )
        .or_else(|| Some(value.to_string())),
        Value::Array(_) | Value::Null => None,
        other => value_to_text(other),
    }
}

/// `details`-style field: arrays, or strings split on newlines (a single line
/// is split on commas).
fn detail_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(element_text)
            .map(|s| strip_bullet(&s))
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => {
            let pieces: Vec<&str> = if s.contains('\n') {
                s.lines().collect()
            } else {
                s.split(',').collect()
            };
            pieces
                .into_iter()
                .map(strip_bullet)
                .filter(|p| !p.is_empty())
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Enrichment field: arrays, or strings split like a labelled list.
fn link_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(element_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_list(s),
        _ => Vec::new(),
    }
}

fn collect_field(
    map: &serde_json::Map<String, Value>,
    keys: &[&str],
    read: fn(&Value) -> Vec<String>,
) -> Vec<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .flat_map(read)
        .collect()
}

/// Map one structured element onto a week record.
pub fn project_item(item: &Value, idx: usize) -> WeekRecord {
    let positional = idx as u32 + 1;
    let Value::Object(map) = item else {
        let text = element_text(item).unwrap_or_default();
        let week = week_in_text(&text).map(WeekId::Number).unwrap_or(WeekId::Number(positional));
        let title = if text.is_empty() {
            format!("Week {positional}")
        } else {
            truncate_chars(&text, TITLE_MAX_CHARS)
        };
        return WeekRecord::new(week, title);
    };

    let named = first_text(map, &["title", "section_title", "name", "topic"]);
    let week = map
        .get("week")
        .and_then(week_from_value)
        .or_else(|| {
            ["section_title", "title"]
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .find_map(week_in_text)
                .map(WeekId::Number)
        })
        .unwrap_or(WeekId::Number(positional));
    let title = named
        .or_else(|| first_text(map, &["description", "summary"]))
        .map(|t| truncate_chars(&t, TITLE_MAX_CHARS))
        .unwrap_or_else(|| format!("Week {}", week.number().unwrap_or(positional)));

    WeekRecord {
        week,
        title,
        details: collect_field(map, &["details", "topics"], detail_list),
        repos: collect_field(map, &["repos", "github", "repo"], link_list),
        projects: collect_field(map, &["projects", "projectIdeas", "tasks"], link_list),
        youtube: collect_field(map, &["youtube", "playlists", "videos"], link_list),
        completed: map.get("completed").and_then(Value::as_bool).unwrap_or(false),
        project_link: first_text(map, &["projectLink", "project_link"]).unwrap_or_default(),
        reflection: first_text(map, &["reflection"]).unwrap_or_default(),
    }
}

fn placeholder_subject<'a>(topic: &'a str, title: &'a str) -> &'a str {
    if topic.trim().is_empty() { title } else { topic.trim() }
}

/// Cap, renumber, dedupe and fill every record so it renders fully.
pub fn finalize_weeks(mut weeks: Vec<WeekRecord>, topic: &str) -> Vec<WeekRecord> {
    weeks.truncate(MAX_WEEKS);
    for (i, week) in weeks.iter_mut().enumerate() {
        let n = i as u32 + 1;
        week.week = week.week.renumbered(n);
        if week.title.trim().is_empty() {
            week.title = format!("Week {n}");
        }
        let subject = placeholder_subject(topic, &week.title).to_string();

        week.repos = dedupe_capped(std::mem::take(&mut week.repos), MAX_LINKS);
        if week.repos.is_empty() {
            week.repos.push(github_search_url(&subject));
        }
        week.projects = dedupe_capped(std::mem::take(&mut week.projects), MAX_LINKS);
        if week.projects.is_empty() {
            week.projects
                .push(format!("Mini project: practice {subject} with \"{}\"", week.title));
        }
        week.youtube = dedupe_capped(std::mem::take(&mut week.youtube), MAX_LINKS);
        if week.youtube.is_empty() {
            week.youtube.push(youtube_search_url(&format!("{subject} playlist")));
        }
    }
    weeks
}

const STAGES: &[&str] = &[
    "Foundations",
    "Core Concepts",
    "Hands-on Practice",
    "Intermediate Patterns",
    "Build a Project",
    "Review & Next Steps",
];

/// Placeholder plan used when nothing could be parsed.
pub fn synthesize_weeks(topic: &str, count: usize) -> Vec<WeekRecord> {
    let topic = topic.trim();
    (0..count.clamp(1, MAX_WEEKS))
        .map(|i| {
            let stage = STAGES
                .get(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Practice Sprint {}", i + 1));
            let title = format!("{topic}: {stage}");
            let mut week = WeekRecord::new(i as u32 + 1, title.clone());
            week.details = vec![
                format!("Study {} for {topic}", stage.to_lowercase()),
                "Write short notes and solve a few small exercises".to_string(),
            ];
            week.repos = vec![
                github_topic_url(topic),
                github_search_url(&format!("{topic} {stage}")),
            ];
            week.youtube = vec![youtube_search_url(&format!("{topic} {stage} playlist"))];
            week.projects = project_suggestions(topic, &title);
            week
        })
        .collect()
}

/// Parse a response into a ready-to-render weekly plan, synthesizing one when
/// the response held nothing usable.
pub fn build_weekly_plan(input: Option<&Value>, topic: &str) -> Vec<WeekRecord> {
    let mut weeks = parse_weeks(input);
    if weeks.is_empty() {
        info!(%topic, "no weeks parsed from response; synthesizing placeholder plan");
        weeks = synthesize_weeks(topic, SYNTHESIZED_WEEKS);
    }
    finalize_weeks(weeks, topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn parse_weeks_text(text: &str) -> Vec<WeekRecord> {
        parse_weeks(Some(&Value::String(text.to_string())))
    }

    #[test]
    fn parses_week_headings_with_labelled_lines() {
        let text = "Week 1: Basics\nLearn variables\nLearn loops\nWeek 2: Intermediate\nRepos: github.com/a/b, github.com/c/d\nBuild a project";
        let weeks = parse_weeks_text(text);
        assert_eq!(weeks.len(), 2);

        assert_eq!(weeks[0].week, WeekId::from("1"));
        assert_eq!(weeks[0].title, "Basics");
        assert_eq!(weeks[0].details, vec!["Learn variables", "Learn loops"]);

        assert_eq!(weeks[1].week, WeekId::from("2"));
        assert_eq!(weeks[1].title, "Intermediate");
        assert_eq!(weeks[1].repos, vec!["github.com/a/b", "github.com/c/d"]);
        assert_eq!(weeks[1].details, vec!["Build a project"]);
    }

    #[test]
    fn lines_without_headings_become_records() {
        let weeks = parse_weeks_text("Topic A\nTopic B\nTopic C");
        let titles: Vec<_> = weeks.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["Topic A", "Topic B", "Topic C"]);
        for (i, w) in weeks.iter().enumerate() {
            assert!(w.details.is_empty());
            assert_eq!(w.week.number(), Some(i as u32 + 1));
        }
    }

    #[test]
    fn structured_weeks_object() {
        let input = json!({ "weeks": [{ "title": "Intro", "week": 1, "details": ["x"] }] });
        let weeks = parse_weeks(Some(&input));
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].title, "Intro");
        assert_eq!(weeks[0].week, WeekId::Number(1));
        assert_eq!(weeks[0].details, vec!["x"]);
        assert!(weeks[0].repos.is_empty());
        assert!(weeks[0].projects.is_empty());
        assert!(weeks[0].youtube.is_empty());

        let done = finalize_weeks(weeks, "rust");
        assert_eq!(done[0].repos.len(), 1);
        assert_eq!(done[0].projects.len(), 1);
        assert_eq!(done[0].youtube.len(), 1);
    }

    #[test]
    fn never_panics_on_odd_input() {
        assert!(parse_weeks(None).is_empty());
        assert!(parse_weeks(Some(&Value::Null)).is_empty());
        assert!(parse_weeks_text("").is_empty());
        assert!(parse_weeks(Some(&json!(42))).is_empty());
        assert!(parse_weeks(Some(&json!({ "error": "quota exceeded" }))).is_empty());

        // Unparsable JSON falls through to line parsing.
        let weeks = parse_weeks_text("{malformed json");
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].title, "{malformed json");

        let mut nested = json!({ "weeks": [{ "title": "deep" }] });
        for _ in 0..200 {
            nested = json!({ "data": nested });
        }
        assert!(parse_weeks(Some(&nested)).is_empty());
    }

    #[test]
    fn sections_take_priority_over_weeks() {
        let input = json!({
            "weeks": [{ "title": "ignored" }],
            "sections": [
                { "section_title": "Week 3 - Async", "topics": ["futures", "tasks"] },
                { "section_title": "Tooling", "topics": "cargo\nclippy" }
            ]
        });
        let weeks = parse_weeks(Some(&input));
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].title, "Week 3 - Async");
        assert_eq!(weeks[0].week, WeekId::Number(3));
        assert_eq!(weeks[0].details, vec!["futures", "tasks"]);
        assert_eq!(weeks[1].week, WeekId::Number(2));
        assert_eq!(weeks[1].details, vec!["cargo", "clippy"]);
    }

    #[test]
    fn unwraps_envelopes_and_json_strings() {
        let chat = json!({
            "choices": [{ "message": { "content": "Sure! ```json\n{\"weeks\": [{\"title\": \"A\"}, {\"title\": \"B\"}]}\n```" } }]
        });
        let weeks = parse_weeks(Some(&chat));
        assert_eq!(weeks.iter().map(|w| w.title.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);

        let stringly = Value::String(r#"{"roadmap": "Week 1: Setup\n- install tools"}"#.to_string());
        let weeks = parse_weeks(Some(&stringly));
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].title, "Setup");
        assert_eq!(weeks[0].details, vec!["install tools"]);

        let gemini = json!({ "candidates": [{ "content": { "parts": [{ "text": "Week 4 Review\nRecap" }] } }] });
        let weeks = parse_weeks(Some(&gemini));
        assert_eq!(weeks[0].title, "Review");
        assert_eq!(weeks[0].week, WeekId::from("4"));
    }

    #[test]
    fn projects_enrichment_fields_from_arrays_and_strings() {
        let input = json!([{
            "title": "Web",
            "github": "github.com/x/y; github.com/z/w",
            "projectIdeas": ["Todo app"],
            "videos": [{ "url": "https://youtu.be/1" }],
            "completed": true,
            "projectLink": "https://example.com"
        }]);
        let weeks = parse_weeks(Some(&input));
        assert_eq!(weeks[0].repos, vec!["github.com/x/y", "github.com/z/w"]);
        assert_eq!(weeks[0].projects, vec!["Todo app"]);
        assert_eq!(weeks[0].youtube, vec!["https://youtu.be/1"]);
        assert!(weeks[0].completed);
        assert_eq!(weeks[0].project_link, "https://example.com");
    }

    #[test]
    fn finalize_renumbers_caps_and_dedupes() {
        let mut records = Vec::new();
        for i in 0..30u32 {
            let mut w = WeekRecord::new(i * 5 + 7, format!("T{i}"));
            w.repos = (0..12).map(|r| format!("r{}", r % 9)).collect();
            w.youtube = vec!["y".into(), "y".into()];
            records.push(w);
        }
        let weeks = finalize_weeks(records, "go");
        assert_eq!(weeks.len(), MAX_WEEKS);
        for (i, w) in weeks.iter().enumerate() {
            assert_eq!(w.week, WeekId::Number(i as u32 + 1));
            for field in [&w.repos, &w.projects, &w.youtube] {
                assert!(!field.is_empty() && field.len() <= MAX_LINKS);
                let unique: HashSet<_> = field.iter().collect();
                assert_eq!(unique.len(), field.len());
            }
        }
        assert_eq!(weeks[0].youtube, vec!["y"]);
    }

    #[test]
    fn text_labels_are_case_insensitive() {
        let weeks = parse_weeks_text(
            "WEEK 1 - Start\n* Project Ideas: CLI tool and web scraper\nPLAYLISTS: p1 | p2\n• read the book",
        );
        assert_eq!(weeks[0].title, "Start");
        assert_eq!(weeks[0].projects, vec!["CLI tool", "web scraper"]);
        assert_eq!(weeks[0].youtube, vec!["p1", "p2"]);
        assert_eq!(weeks[0].details, vec!["read the book"]);
    }

    #[test]
    fn empty_response_synthesizes_plan() {
        let weeks = build_weekly_plan(Some(&json!({ "error": "boom" })), "kotlin");
        assert_eq!(weeks.len(), SYNTHESIZED_WEEKS);
        assert_eq!(weeks[0].title, "kotlin: Foundations");
        assert!(weeks.iter().all(|w| !w.repos.is_empty() && !w.youtube.is_empty()));
        assert_eq!(weeks[5].week, WeekId::Number(6));
    }
}
