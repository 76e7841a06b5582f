//! Repository search, used to fill the per-week repository pool.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::clients::{DEFAULT_TIMEOUT_SECS, build_agent, map_ureq_error};
use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepositoryItem>,
}

#[derive(Debug, Deserialize)]
struct RepositoryItem {
    #[serde(default)]
    html_url: Option<String>,
}

pub struct GitHubClient {
    api_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            agent: build_agent(timeout),
        }
    }

    /// Most-starred repositories whose name, description or readme mention
    /// `topic`. Unauthenticated requests work but are rate-limited.
    pub fn search_repositories(&self, topic: &str, per_page: usize) -> ServiceResult<Vec<String>> {
        let url = format!("{}/search/repositories", self.api_url);
        let per_page = per_page.clamp(1, MAX_PER_PAGE).to_string();
        let query = format!("{topic} in:name,description,readme");

        let mut request = self
            .agent
            .get(&url)
            .set("Accept", "application/vnd.github.v3+json")
            .set("User-Agent", crate::metadata::PKG_NAME)
            .query("q", &query)
            .query("sort", "stars")
            .query("order", "desc")
            .query("per_page", &per_page);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("token {token}"));
        }

        let response = request
            .call()
            .map_err(|e| map_ureq_error("GitHub search", e))?;
        let body: SearchResponse = response.into_json().map_err(|e| {
            ServiceError::NetworkError(format!("Failed to read GitHub response: {e}"))
        })?;
        let urls = repository_urls(body);
        debug!(%topic, count = urls.len(), "github repositories");
        Ok(urls)
    }
}

fn repository_urls(body: SearchResponse) -> Vec<String> {
    body.items
        .into_iter()
        .filter_map(|item| item.html_url)
        .filter(|u| !u.is_empty())
        .collect()
}

pub fn create_github_client(token: Option<String>, timeout_secs: Option<u64>) -> GitHubClient {
    GitHubClient::new(
        DEFAULT_API_URL,
        token,
        Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    )
}
