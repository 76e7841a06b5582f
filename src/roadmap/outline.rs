//! AI outline validation and the section → week expansion.

use serde_json::Value;
use tracing::{debug, warn};

use crate::roadmap::normalize::value_to_text;
use crate::types::{Outline, Section, WeekRecord};

pub const DEFAULT_TOPIC: &str = "frontend development";
pub const DEFAULT_DURATION_WEEKS: u32 = 6;

/// Sections used when the model returns none.
pub fn default_sections() -> Vec<Section> {
    let section = |title: &str, weeks: u32, topics: &[&str]| Section {
        section_title: title.to_string(),
        weeks_allotted: weeks,
        topics: topics.iter().map(|t| t.to_string()).collect(),
    };
    vec![
        section("Foundations", 2, &["Basics", "Core APIs"]),
        section("Core / Hands-on", 3, &["State management", "Projects"]),
        section("Project & Advanced", 1, &["Project", "Wrap-up"]),
    ]
}

/// Coerce a `weeks_allotted`-like value to a whole number of weeks, minimum 1.
pub fn coerce_weeks(value: Option<&Value>) -> u32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(n) if n.is_finite() && n >= 1.0 => n.min(u32::MAX as f64).floor() as u32,
        _ => 1,
    }
}

fn coerce_topics(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => map
                    .get("title")
                    .or_else(|| map.get("topic"))
                    .and_then(value_to_text)
                    .or_else(|| Some(item.to_string())),
                Value::Null => None,
                other => value_to_text(other).or_else(|| Some(other.to_string())),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(['\n', ','])
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Tolerant conversion of raw section values. `week_counter` is the running
/// week number used to name untitled sections.
pub fn coerce_sections(values: &[Value]) -> Vec<Section> {
    let mut week_counter = 1u32;
    let mut sections = Vec::with_capacity(values.len());
    for value in values {
        let section = match value {
            Value::Object(map) => {
                let section_title = map
                    .get("section_title")
                    .or_else(|| map.get("title"))
                    .and_then(value_to_text)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("Section {week_counter}"));
                Section {
                    section_title,
                    weeks_allotted: coerce_weeks(map.get("weeks_allotted")),
                    topics: coerce_topics(map.get("topics")),
                }
            }
            Value::String(s) if !s.trim().is_empty() => Section {
                section_title: s.trim().to_string(),
                weeks_allotted: 1,
                topics: Vec::new(),
            },
            _ => continue,
        };
        week_counter = week_counter.saturating_add(section.weeks_allotted);
        sections.push(section);
    }
    sections
}

/// Validate the model's outline, substituting defaults for anything missing.
pub fn outline_from_model(value: &Value, topic: &str) -> Outline {
    let title = value
        .get("title")
        .and_then(value_to_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{topic} roadmap"));
    let duration = value
        .get("duration_weeks")
        .filter(|v| !v.is_null())
        .map(|v| coerce_weeks(Some(v)));

    let raw_sections = value
        .get("sections")
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or_default();
    let mut sections = coerce_sections(raw_sections);
    let mut fallback_duration = sections.iter().map(|s| s.weeks_allotted).sum::<u32>().max(1);
    if sections.is_empty() {
        warn!(%topic, "model did not return sections; using default outline");
        sections = default_sections();
        fallback_duration = DEFAULT_DURATION_WEEKS;
    }

    let duration_weeks = duration.unwrap_or(fallback_duration);
    Outline {
        title,
        duration_weeks,
        sections,
    }
}

/// Slice bounds for slot `i` of `n` over `len` topics. Consecutive slots
/// partition the topic list exactly. The end is `floor((i+1)*len/n)`, not the
/// upstream `ceil`, which can repeat a topic in two weeks.
fn slot_bounds(i: usize, n: usize, len: usize) -> (usize, usize) {
    (i * len / n, (i + 1) * len / n)
}

/// Flatten sections into consecutive, 1-based week records.
pub fn expand_sections(sections: &[Section]) -> Vec<WeekRecord> {
    let mut weeks = Vec::new();
    let mut week_counter = 1u32;
    for section in sections {
        let allocate = section.weeks_allotted.max(1) as usize;
        let len = section.topics.len();
        for i in 0..allocate {
            let title = if allocate == 1 {
                section.section_title.clone()
            } else {
                format!("{} — Part {}", section.section_title, i + 1)
            };
            let (start, end) = slot_bounds(i, allocate, len);
            let details = if start < end {
                section.topics[start..end].to_vec()
            } else {
                vec![format!("Focus on {}", section.section_title)]
            };
            let mut record = WeekRecord::new(week_counter, title);
            record.details = details;
            weeks.push(record);
            week_counter += 1;
        }
    }
    debug!(sections = sections.len(), weeks = weeks.len(), "expanded outline");
    weeks
}
