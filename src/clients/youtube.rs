//! Playlist search. Without an API key there is no pool and weeks fall back
//! to a search URL.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::clients::{DEFAULT_TIMEOUT_SECS, build_agent, map_ureq_error};
use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: Option<ItemId>,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(default, rename = "playlistId")]
    playlist_id: Option<String>,
}

pub struct YouTubeClient {
    api_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl YouTubeClient {
    pub fn new(api_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            agent: build_agent(timeout),
        }
    }

    pub fn playlist_url(playlist_id: &str) -> String {
        format!("https://www.youtube.com/playlist?list={playlist_id}")
    }

    /// Playlists matching `"{topic} playlist"`.
    pub fn search_playlists(&self, topic: &str, max_results: usize) -> ServiceResult<Vec<String>> {
        let Some(key) = &self.api_key else {
            debug!("no YouTube API key configured; skipping playlist search");
            return Ok(Vec::new());
        };
        let url = format!("{}/search", self.api_url);
        let query = format!("{topic} playlist");
        let max_results = max_results.clamp(1, MAX_RESULTS).to_string();

        let response = self
            .agent
            .get(&url)
            .query("part", "snippet")
            .query("type", "playlist")
            .query("maxResults", &max_results)
            .query("q", &query)
            .query("key", key)
            .call()
            .map_err(|e| map_ureq_error("YouTube API", e))?;
        let body: SearchResponse = response.into_json().map_err(|e| {
            ServiceError::NetworkError(format!("Failed to read YouTube response: {e}"))
        })?;
        let urls = playlist_urls(body);
        debug!(%topic, count = urls.len(), "youtube playlists");
        Ok(urls)
    }
}

fn playlist_urls(body: SearchResponse) -> Vec<String> {
    body.items
        .into_iter()
        .filter_map(|item| item.id?.playlist_id)
        .filter(|id| !id.is_empty())
        .map(|id| YouTubeClient::playlist_url(&id))
        .collect()
}

pub fn create_youtube_client(api_key: Option<String>, timeout_secs: Option<u64>) -> YouTubeClient {
    YouTubeClient::new(
        DEFAULT_API_URL,
        api_key,
        Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_yields_empty_pool() {
        let client = create_youtube_client(None, Some(1));
        assert!(client.search_playlists("rust", 4).unwrap().is_empty());
    }

    #[test]
    fn maps_playlist_ids_to_urls() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"items":[{"id":{"kind":"youtube#playlist","playlistId":"PL1"}},{"id":{"videoId":"v"}},{}]}"#,
        )
        .unwrap();
        assert_eq!(
            playlist_urls(body),
            vec!["https://www.youtube.com/playlist?list=PL1"]
        );
    }
}
