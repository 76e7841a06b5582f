use serde_json::{Value, json};

use crate::types::WeekRecord;

const NOT_PROVIDED: &str = "Not provided";
const NO_CONTEXT: &str = "No roadmap text provided.";
const DEFAULT_QUESTION: &str = "Explain this simply and tell me what to do next.";

pub const TUTOR_PROMPT: &str = r#"--- ROLE ---
You are a friendly senior developer mentoring a beginner inside SyncVerse Premium.
Keep the tone calm, encouraging and practical. Use plain language a teenager who just started coding would follow.

--- FORMAT ---
Never use "*" or "-" bullets. Number the main sections (1., 2., 3.) and letter the sub-points (a., b., c.). Keep paragraphs short.

--- CONTEXT ---
1. Topic: {topic}
2. Week:
   a. Number: {week}
   b. Title: {week_title}
3. Roadmap context: {context}
4. Question: {question}

--- ANSWER STRUCTURE ---
1. Simple Breakdown: the concept in the simplest words possible.
2. Why This Matters: how it helps in real jobs, freelancing or open source.
3. Real-Life Example: tie it to an app the student already uses.
4. 3-Day Micro Plan: day 1 basics, day 2 hands-on challenge, day 3 revision plus a stretch goal.
5. Mini Project: a catchy name, what it does, and 3-4 steps to start.
6. Motivation: a short, honest note on consistency over speed."#;

/// JSON schema handed to the model for structured roadmap output.
pub fn roadmap_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "duration_weeks": { "type": "NUMBER" },
            "sections": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "section_title": { "type": "STRING" },
                        "weeks_allotted": { "type": "NUMBER" },
                        "topics": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": ["section_title", "weeks_allotted", "topics"]
                }
            }
        },
        "required": ["title", "duration_weeks", "sections"]
    })
}

pub fn roadmap_prompt(topic: &str, current_knowledge: Option<&str>, premium: bool) -> String {
    let mut prompt = format!(
        "You are an expert career coach. Generate a detailed learning roadmap for \"{topic}\".\n"
    );
    if let Some(knowledge) = current_knowledge.map(str::trim).filter(|k| !k.is_empty()) {
        prompt.push_str(&format!(
            "The learner already knows: {knowledge}. Skip what they know and build on it.\n"
        ));
    }
    if premium {
        prompt.push_str(
            "This is a premium plan: go deeper, include advanced sections and a capstone project.\n",
        );
    }
    prompt.push_str(
        r#"Return ONLY valid JSON that conforms to this schema:
{
  "title": string,
  "duration_weeks": number,
  "sections": [
    { "section_title": string, "weeks_allotted": number, "topics": [string, ...] }, ...
  ]
}
Keep each "topics" entry short (1 line). Provide realistic sections and weeks_allotted that add up to duration_weeks (approx)."#,
    );
    prompt
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

pub fn tutor_prompt(
    topic: Option<&str>,
    week: Option<&str>,
    week_title: Option<&str>,
    context: Option<&str>,
    question: Option<&str>,
) -> String {
    TUTOR_PROMPT
        .replace("{topic}", or_default(topic, NOT_PROVIDED))
        .replace("{week}", or_default(week, NOT_PROVIDED))
        .replace("{week_title}", or_default(week_title, NOT_PROVIDED))
        .replace("{context}", or_default(context, NO_CONTEXT))
        .replace("{question}", or_default(question, DEFAULT_QUESTION))
}

/// What the tutor sees about a week: its details, or its heading when empty.
pub fn week_roadmap_context(week: &WeekRecord) -> String {
    if week.details.is_empty() {
        format!("Week {}: {}", week.week, week.title)
    } else {
        week.details.join("\n")
    }
}

/// Plain-text copy of a week for sharing.
pub fn week_export_text(week: &WeekRecord) -> String {
    let mut lines = vec![format!("Week {}: {}", week.week, week.title), String::new()];
    lines.extend(week.details.iter().cloned());
    lines.push(String::new());
    lines.push(if week.project_link.is_empty() {
        String::new()
    } else {
        format!("Project link: {}", week.project_link)
    });
    lines.push(if week.reflection.is_empty() {
        String::new()
    } else {
        format!("Reflection: {}", week.reflection)
    });
    lines.join("\n").trim().to_string()
}
