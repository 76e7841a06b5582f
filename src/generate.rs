//! Roadmap generation: prompt → outline → weekly expansion → resources.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::clients::{GeminiClient, GitHubClient, YouTubeClient};
use crate::error::ServiceResult;
use crate::prompts::{roadmap_prompt, roadmap_schema};
use crate::roadmap::{DEFAULT_TOPIC, distribute_resources, expand_sections, outline_from_model};
use crate::types::{GenerateRequest, ResponseMeta, RoadmapResponse};

pub const SOURCE: &str = "gemini+github+youtube";

/// The three upstream producers. Pools are best effort; only the outline
/// is allowed to fail a generation.
pub trait RoadmapBackend {
    fn outline(&self, prompt: &str, schema: &Value) -> ServiceResult<Value>;
    fn repositories(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>>;
    fn playlists(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>>;
}

pub struct LiveBackend {
    pub gemini: GeminiClient,
    pub github: GitHubClient,
    pub youtube: YouTubeClient,
}

impl RoadmapBackend for LiveBackend {
    fn outline(&self, prompt: &str, schema: &Value) -> ServiceResult<Value> {
        self.gemini.generate_json(prompt, schema)
    }

    fn repositories(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>> {
        self.github.search_repositories(topic, count)
    }

    fn playlists(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>> {
        self.youtube.search_playlists(topic, count)
    }
}

pub fn repo_pool_size(weeks: usize) -> usize {
    (weeks * 2).clamp(8, 24)
}

pub fn playlist_pool_size(weeks: usize) -> usize {
    (weeks * 2).min(12)
}

pub fn resolve_topic(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        trimmed.to_string()
    }
}

fn pool_or_empty(kind: &str, result: ServiceResult<Vec<String>>) -> Vec<String> {
    result.unwrap_or_else(|e| {
        warn!(%kind, error = %e, "resource search failed; continuing without it");
        Vec::new()
    })
}

pub fn generate_roadmap<B: RoadmapBackend + ?Sized>(
    request: &GenerateRequest,
    backend: &B,
) -> ServiceResult<RoadmapResponse> {
    let topic = resolve_topic(&request.topic);
    info!(%topic, premium = request.premium, "generating roadmap");

    let prompt = roadmap_prompt(&topic, request.current_knowledge.as_deref(), request.premium);
    let raw_model = backend.outline(&prompt, &roadmap_schema())?;
    let outline = outline_from_model(&raw_model, &topic);
    let weeks = expand_sections(&outline.sections);

    let repo_pool = pool_or_empty("github", backend.repositories(&topic, repo_pool_size(weeks.len())));
    let playlist_pool = if playlist_pool_size(weeks.len()) == 0 {
        Vec::new()
    } else {
        pool_or_empty("youtube", backend.playlists(&topic, playlist_pool_size(weeks.len())))
    };
    let weeks = distribute_resources(weeks, &repo_pool, &playlist_pool, &topic);

    let duration_weeks = if outline.duration_weeks > 0 {
        outline.duration_weeks
    } else {
        weeks.len() as u32
    };
    Ok(RoadmapResponse {
        title: outline.title,
        duration_weeks,
        weeks,
        meta: ResponseMeta {
            source: SOURCE.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            topic,
            premium: request.premium,
        },
        raw_model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubBackend {
        outline: Value,
        repos: Vec<String>,
        playlists_fail: bool,
        prompts: Mutex<Vec<String>>,
        requested: Mutex<Vec<(String, usize)>>,
    }

    impl StubBackend {
        fn new(outline: Value) -> Self {
            Self {
                outline,
                repos: (0..10).map(|i| format!("https://github.com/o/r{i}")).collect(),
                playlists_fail: false,
                prompts: Mutex::new(Vec::new()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl RoadmapBackend for StubBackend {
        fn outline(&self, prompt: &str, _schema: &Value) -> ServiceResult<Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.outline.is_null() {
                return Err(ServiceError::ApiError("Failed to parse JSON returned by model.".into()));
            }
            Ok(self.outline.clone())
        }

        fn repositories(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>> {
            self.requested.lock().unwrap().push((format!("repos:{topic}"), count));
            Ok(self.repos.iter().take(count).cloned().collect())
        }

        fn playlists(&self, topic: &str, count: usize) -> ServiceResult<Vec<String>> {
            self.requested.lock().unwrap().push((format!("playlists:{topic}"), count));
            if self.playlists_fail {
                return Err(ServiceError::NetworkError("offline".into()));
            }
            Ok(vec!["https://www.youtube.com/playlist?list=PL1".into()])
        }
    }

    #[test]
    fn pool_sizes_follow_week_count() {
        assert_eq!(repo_pool_size(1), 8);
        assert_eq!(repo_pool_size(6), 12);
        assert_eq!(repo_pool_size(20), 24);
        assert_eq!(playlist_pool_size(3), 6);
        assert_eq!(playlist_pool_size(10), 12);
    }

    #[test]
    fn blank_topic_defaults() {
        let backend = StubBackend::new(json!({ "title": "FE", "duration_weeks": 3, "sections": [
            { "section_title": "HTML", "weeks_allotted": 3, "topics": ["tags", "forms", "a11y"] }
        ]}));
        let request = GenerateRequest {
            topic: "   ".into(),
            current_knowledge: Some("some css".into()),
            premium: true,
        };
        let response = generate_roadmap(&request, &backend).unwrap();
        assert_eq!(response.meta.topic, "frontend development");
        assert_eq!(response.meta.source, "gemini+github+youtube");
        assert!(response.meta.premium);
        assert!(chrono::DateTime::parse_from_rfc3339(&response.meta.generated_at).is_ok());
        assert_eq!(response.weeks.len(), 3);
        assert_eq!(response.weeks[1].title, "HTML — Part 2");
        assert_eq!(response.weeks[1].details, vec!["forms"]);
        assert_eq!(response.weeks[0].repos.len(), 3);
        assert_eq!(response.weeks[0].youtube, vec!["https://www.youtube.com/playlist?list=PL1"]);
        assert_eq!(response.raw_model["title"], "FE");

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("some css"));
        let requested = backend.requested.lock().unwrap();
        assert_eq!(requested[0], ("repos:frontend development".to_string(), 8));
        assert_eq!(requested[1], ("playlists:frontend development".to_string(), 6));
    }

    #[test]
    fn missing_sections_use_default_outline() {
        let backend = StubBackend::new(json!({ "title": "" }));
        let request = GenerateRequest { topic: "rust".into(), ..Default::default() };
        let response = generate_roadmap(&request, &backend).unwrap();
        assert_eq!(response.title, "rust roadmap");
        assert_eq!(response.duration_weeks, 6);
        let titles: Vec<_> = response.weeks.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Foundations — Part 1",
                "Foundations — Part 2",
                "Core / Hands-on — Part 1",
                "Core / Hands-on — Part 2",
                "Core / Hands-on — Part 3",
                "Project & Advanced"
            ]
        );
    }

    #[test]
    fn failed_playlist_search_falls_back_to_search_url() {
        let mut backend = StubBackend::new(json!({ "sections": [{ "section_title": "A", "weeks_allotted": 1, "topics": [] }] }));
        backend.playlists_fail = true;
        let request = GenerateRequest { topic: "go".into(), ..Default::default() };
        let response = generate_roadmap(&request, &backend).unwrap();
        assert_eq!(response.weeks.len(), 1);
        assert!(response.weeks[0].youtube[0].starts_with("https://www.youtube.com/results?search_query="));
        assert_eq!(response.weeks[0].details, vec!["Focus on A"]);
        assert_eq!(response.duration_weeks, 1);
    }

    #[test]
    fn model_failure_is_an_error() {
        let backend = StubBackend::new(Value::Null);
        let request = GenerateRequest { topic: "go".into(), ..Default::default() };
        assert!(generate_roadmap(&request, &backend).is_err());
        assert!(backend.requested.lock().unwrap().is_empty());
    }
}
