//! Generative-AI client: structured JSON for outlines, plain text for the tutor.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};

use crate::clients::{DEFAULT_TIMEOUT_SECS, build_agent, map_ureq_error};
use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const MISSING_KEY_MESSAGE: &str = "Missing GEMINI_API_KEY secret.";
const NO_ANSWER: &str = "No explanation received.";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    agent: ureq::Agent,
}

impl GeminiClient {
    /// Fails when no key is configured; generation cannot proceed without one.
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Config(MISSING_KEY_MESSAGE.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
            api_key,
            agent: build_agent(config.timeout),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn call(&self, payload: Value) -> ServiceResult<Value> {
        debug!(model = %self.model, "calling generateContent");
        let response = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json")
            .set("X-goog-api-key", &self.api_key)
            .send_json(payload)
            .map_err(|e| map_ureq_error("Gemini API", e))?;
        response
            .into_json::<Value>()
            .map_err(|e| ServiceError::NetworkError(format!("Failed to read Gemini response: {e}")))
    }

    /// Ask for JSON constrained by `schema` and parse it.
    pub fn generate_json(&self, prompt: &str, schema: &Value) -> ServiceResult<Value> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });
        let data = self.call(payload)?;
        let text = first_candidate_text(&data).ok_or_else(|| {
            error!(response = %data, "model returned an empty response");
            ServiceError::ApiError(format!(
                "AI failed to generate clean JSON content (try again): {data}"
            ))
        })?;
        parse_model_json(&text)
    }

    /// Free-form text answer; every part of the first candidate is joined.
    pub fn generate_text(&self, prompt: &str) -> ServiceResult<String> {
        let payload = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let data = self.call(payload)?;
        Ok(joined_candidate_text(&data).unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}

pub fn first_candidate_text(data: &Value) -> Option<String> {
    data.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn joined_candidate_text(data: &Value) -> Option<String> {
    let parts = data.pointer("/candidates/0/content/parts")?.as_array()?;
    let text = parts
        .iter()
        .map(|p| p.get("text").and_then(Value::as_str).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn parse_model_json(text: &str) -> ServiceResult<Value> {
    serde_json::from_str(text.trim()).map_err(|e| {
        error!(%e, "failed to parse model JSON");
        ServiceError::ApiError(format!("Failed to parse JSON returned by model: {text}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = GeminiClient::new(config(None)).err().unwrap();
        assert_eq!(err.to_string(), format!("configuration error: {MISSING_KEY_MESSAGE}"));
        assert!(GeminiClient::new(config(Some("  "))).is_err());
    }

    #[test]
    fn endpoint_accepts_prefixed_model_names() {
        let client = GeminiClient::new(GeminiConfig {
            model: "models/gemini-2.0-flash".into(),
            base_url: "http://localhost:9000/".into(),
            ..config(Some("k"))
        })
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn extracts_candidate_text() {
        let data = json!({ "candidates": [{ "content": { "parts": [{ "text": " {\"a\":1} " }, { "text": "more" }] } }] });
        assert_eq!(first_candidate_text(&data).as_deref(), Some("{\"a\":1}"));
        assert_eq!(joined_candidate_text(&data).as_deref(), Some("{\"a\":1} \nmore"));
        assert!(first_candidate_text(&json!({ "candidates": [] })).is_none());
        assert!(first_candidate_text(&json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] })).is_none());
    }

    #[test]
    fn unparsable_model_text_keeps_raw_text() {
        let err = parse_model_json("not json").unwrap_err();
        assert!(err.to_string().contains("not json"));
        assert_eq!(parse_model_json(" {\"title\":\"x\"} ").unwrap()["title"], "x");
    }
}
