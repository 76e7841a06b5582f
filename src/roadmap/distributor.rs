//! Deterministic assignment of fetched repositories and playlists to weeks.

use crate::roadmap::normalize::youtube_search_url;
use crate::types::WeekRecord;

pub const REPOS_PER_WEEK: usize = 3;

pub fn project_suggestions(topic: &str, week_title: &str) -> Vec<String> {
    vec![
        format!("Mini project: Build a small {topic} prototype related to \"{week_title}\""),
        "Challenge: Add 1 feature to the prototype (UX / performance / tests)".to_string(),
    ]
}

/// Round-robin up to three repositories for the week at `idx`.
fn pick_repos(pool: &[String], idx: usize) -> Vec<String> {
    let mut picked: Vec<String> = Vec::with_capacity(REPOS_PER_WEEK);
    if pool.is_empty() {
        return picked;
    }
    for k in 0..REPOS_PER_WEEK {
        let pick = &pool[(idx * REPOS_PER_WEEK + k) % pool.len()];
        if !pick.is_empty() && !picked.contains(pick) {
            picked.push(pick.clone());
        }
    }
    picked
}

/// Populate `repos`, `youtube` and `projects` on every week. Empty pools are
/// fine: repos stay empty and the playlist becomes a search URL.
pub fn distribute_resources(
    weeks: Vec<WeekRecord>,
    repo_pool: &[String],
    playlist_pool: &[String],
    topic: &str,
) -> Vec<WeekRecord> {
    let fallback_playlist = youtube_search_url(&format!("{topic} playlist"));
    weeks
        .into_iter()
        .enumerate()
        .map(|(idx, mut week)| {
            week.repos = pick_repos(repo_pool, idx);
            let playlist = if playlist_pool.is_empty() {
                fallback_playlist.clone()
            } else {
                playlist_pool[idx % playlist_pool.len()].clone()
            };
            week.youtube = vec![playlist];
            week.projects = project_suggestions(topic, &week.title);
            week
        })
        .collect()
}
