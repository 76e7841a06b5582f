use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Week identifier as produced upstream: either a JSON number or the digits
/// captured from a "Week N" heading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum WeekId {
    Number(u32),
    Label(String),
}

impl WeekId {
    pub fn number(&self) -> Option<u32> {
        match self {
            WeekId::Number(n) => Some(*n),
            WeekId::Label(s) => s.trim().parse().ok(),
        }
    }

    /// Same representation, new value.
    pub fn renumbered(&self, n: u32) -> WeekId {
        match self {
            WeekId::Number(_) => WeekId::Number(n),
            WeekId::Label(_) => WeekId::Label(n.to_string()),
        }
    }
}

impl Default for WeekId {
    fn default() -> Self {
        WeekId::Number(1)
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekId::Number(n) => write!(f, "{n}"),
            WeekId::Label(s) => f.write_str(s),
        }
    }
}

impl From<u32> for WeekId {
    fn from(n: u32) -> Self {
        WeekId::Number(n)
    }
}

impl From<&str> for WeekId {
    fn from(s: &str) -> Self {
        WeekId::Label(s.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeekRecord {
    pub week: WeekId,
    pub title: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub youtube: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, rename = "projectLink")]
    pub project_link: String,
    #[serde(default)]
    pub reflection: String,
}

impl WeekRecord {
    pub fn new(week: impl Into<WeekId>, title: impl Into<String>) -> Self {
        Self {
            week: week.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopicItem {
    pub id: String,
    pub title: String,
    #[serde(default, rename = "shortDescription")]
    pub short_description: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, rename = "projectLink")]
    pub project_link: String,
}

/// One block of the AI outline, already coerced: `weeks_allotted >= 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub section_title: String,
    pub weeks_allotted: u32,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Outline {
    pub title: String,
    pub duration_weeks: u32,
    pub sections: Vec<Section>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Free,
    Premium,
    Basic,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Free => "free",
            PlanKind::Premium => "premium",
            PlanKind::Basic => "basic",
        }
    }

    /// Key the plan is persisted under.
    pub fn storage_key(&self) -> &'static str {
        match self {
            PlanKind::Free => "roadmapProgress",
            PlanKind::Premium => "premiumRoadmapProgress",
            PlanKind::Basic => "basicRoadmapProgress",
        }
    }

    pub fn is_weekly(&self) -> bool {
        !matches!(self, PlanKind::Basic)
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(PlanKind::Free),
            "premium" => Ok(PlanKind::Premium),
            "basic" => Ok(PlanKind::Basic),
            _ => Err(format!("Unknown plan kind: {s}")),
        }
    }
}

/// Body accepted by the generation endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "currentKnowledge", skip_serializing_if = "Option::is_none")]
    pub current_knowledge: Option<String>,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ResponseMeta {
    pub source: String,
    pub generated_at: String,
    pub topic: String,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct RoadmapResponse {
    pub title: String,
    pub duration_weeks: u32,
    pub weeks: Vec<WeekRecord>,
    pub meta: ResponseMeta,
    pub raw_model: Value,
}
