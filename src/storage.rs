use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::roadmap::{parse_topics, parse_weeks};
use crate::types::{PlanKind, TopicItem, WeekRecord};

const STORE_DIR: &str = ".syncverse";
const STORE_FILE: &str = "plans.json";
const CHANGE_CAPACITY: usize = 64;

/// A key was replaced (`Some`) or removed (`None`).
#[derive(Clone, Debug, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub value: Option<Value>,
}

/// Change feed for one key. Dropping it unsubscribes.
pub struct KeySubscription {
    key: String,
    rx: broadcast::Receiver<StoreChange>,
}

impl KeySubscription {
    /// Next value written under the key; `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Option<Value>> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.key == self.key => return Some(change.value),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "subscriber lagged behind store changes");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, schemars::JsonSchema)]
pub struct PlanProgress {
    pub kind: PlanKind,
    pub total: usize,
    pub completed: usize,
    /// `completed / total * 100`, 0 for an empty plan.
    pub percent: f64,
    /// Index of the first unfinished entry.
    pub next_active: Option<usize>,
    pub next_title: Option<String>,
    pub pace: String,
}

/// Advice shown next to the progress bar.
pub fn pace_message(total: usize, percent: f64) -> &'static str {
    if total == 0 {
        "Generate a roadmap to see adaptive suggestions."
    } else if percent < 35.0 {
        "Slow and steady: repeat the core weeks and focus on consistency over speed."
    } else if percent < 75.0 {
        "Balanced pace: keep going and add one extra mini project every two weeks."
    } else {
        "Push mode: take on advanced projects, open source issues or an internship alongside the roadmap."
    }
}

/// JSON file of plan key → value. Mutations stay in memory; callers persist
/// with `save` or `save_snapshot_async`, which write atomically.
pub struct PlanStore {
    storage_path: PathBuf,
    data: Map<String, Value>,
    changes: broadcast::Sender<StoreChange>,
}

impl PlanStore {
    pub fn default_path() -> ServiceResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ServiceError::Config("couldn't find home dir".to_string()))?;
        Ok(home.join(STORE_DIR).join(STORE_FILE))
    }

    pub fn with_path(storage_path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            storage_path: storage_path.into(),
            data: Map::new(),
            changes,
        }
    }

    /// Open the store at `path`, or the default location under the home dir.
    pub fn open(path: Option<&Path>) -> ServiceResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        let mut store = Self::with_path(path);
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Load the file if present. A file that is not a JSON object is left
    /// alone and the store starts empty.
    pub fn initialize(&mut self) -> ServiceResult<()> {
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !self.storage_path.exists() {
            return Ok(());
        }
        let contents = fs::read_to_string(&self.storage_path)?;
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => self.data = map,
            Ok(_) | Err(_) => {
                warn!(path = %self.storage_path.display(), "plan store is not a JSON object; starting empty");
                self.data = Map::new();
            }
        }
        Ok(())
    }

    pub fn save(&self) -> ServiceResult<()> {
        write_atomic(&self.storage_path, &self.data)
    }

    /// Path and data to write once the caller has released its lock.
    pub fn snapshot_for_save(&self) -> (PathBuf, Map<String, Value>) {
        (self.storage_path.clone(), self.data.clone())
    }

    pub async fn save_snapshot_async(path: PathBuf, data: Map<String, Value>) -> ServiceResult<()> {
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|e| ServiceError::Storage(format!("spawn_blocking failed: {e}")))?
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Replace the whole value under `key`. Nothing is written to disk until
    /// `save` or `save_snapshot_async`.
    pub fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value.clone());
        self.notify(key, Some(value));
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let existed = self.data.remove(key).is_some();
        if existed {
            self.notify(key, None);
        }
        existed
    }

    pub fn subscribe(&self, key: &str) -> KeySubscription {
        KeySubscription {
            key: key.to_string(),
            rx: self.changes.subscribe(),
        }
    }

    fn notify(&self, key: &str, value: Option<Value>) {
        let receivers = self
            .changes
            .send(StoreChange {
                key: key.to_string(),
                value,
            })
            .unwrap_or(0);
        debug!(%key, receivers, "store change");
    }

    /// Stored records come back as written; anything else goes through the
    /// tolerant parser.
    pub fn load_weeks(&self, kind: PlanKind) -> Vec<WeekRecord> {
        let stored = self.get(kind.storage_key());
        stored
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| parse_weeks(stored))
    }

    pub fn put_weeks(&mut self, kind: PlanKind, weeks: &[WeekRecord]) -> ServiceResult<()> {
        self.set(kind.storage_key(), serde_json::to_value(weeks)?);
        Ok(())
    }

    pub fn load_topics(&self, kind: PlanKind) -> Vec<TopicItem> {
        let stored = self.get(kind.storage_key());
        stored
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| parse_topics(stored))
    }

    pub fn put_topics(&mut self, kind: PlanKind, topics: &[TopicItem]) -> ServiceResult<()> {
        self.set(kind.storage_key(), serde_json::to_value(topics)?);
        Ok(())
    }

    /// Flip the completion flag of entry `index`, returning the new state.
    pub fn toggle_completed(&mut self, kind: PlanKind, index: usize) -> ServiceResult<bool> {
        if kind.is_weekly() {
            let mut weeks = self.load_weeks(kind);
            let week = entry_mut(&mut weeks, kind, index)?;
            week.completed = !week.completed;
            let completed = week.completed;
            self.put_weeks(kind, &weeks)?;
            Ok(completed)
        } else {
            let mut topics = self.load_topics(kind);
            let topic = entry_mut(&mut topics, kind, index)?;
            topic.completed = !topic.completed;
            let completed = topic.completed;
            self.put_topics(kind, &topics)?;
            Ok(completed)
        }
    }

    pub fn set_project_link(&mut self, kind: PlanKind, index: usize, link: &str) -> ServiceResult<()> {
        let link = link.trim().to_string();
        if kind.is_weekly() {
            let mut weeks = self.load_weeks(kind);
            entry_mut(&mut weeks, kind, index)?.project_link = link;
            self.put_weeks(kind, &weeks)
        } else {
            let mut topics = self.load_topics(kind);
            entry_mut(&mut topics, kind, index)?.project_link = link;
            self.put_topics(kind, &topics)
        }
    }

    pub fn set_reflection(&mut self, kind: PlanKind, index: usize, text: &str) -> ServiceResult<()> {
        if !kind.is_weekly() {
            return Err(ServiceError::Other(format!(
                "reflections are only kept for weekly plans, not {kind}"
            )));
        }
        let mut weeks = self.load_weeks(kind);
        entry_mut(&mut weeks, kind, index)?.reflection = text.to_string();
        self.put_weeks(kind, &weeks)
    }

    pub fn progress(&self, kind: PlanKind) -> PlanProgress {
        let flags: Vec<(bool, String)> = if kind.is_weekly() {
            self.load_weeks(kind)
                .into_iter()
                .map(|w| (w.completed, format!("Week {}: {}", w.week, w.title)))
                .collect()
        } else {
            self.load_topics(kind)
                .into_iter()
                .map(|t| (t.completed, t.title))
                .collect()
        };
        let total = flags.len();
        let completed = flags.iter().filter(|(done, _)| *done).count();
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let next_active = flags.iter().position(|(done, _)| !done);
        PlanProgress {
            kind,
            total,
            completed,
            percent,
            next_active,
            next_title: next_active.map(|i| flags[i].1.clone()),
            pace: pace_message(total, percent).to_string(),
        }
    }

    pub fn reset(&mut self, kind: PlanKind) -> bool {
        self.remove(kind.storage_key())
    }
}

/// Log every change to one saved plan until the store is dropped.
pub fn log_plan_changes(store: &PlanStore, kind: PlanKind) -> JoinHandle<()> {
    let mut changes = store.subscribe(kind.storage_key());
    tokio::spawn(async move {
        while let Some(value) = changes.recv().await {
            match value {
                Some(v) => info!(%kind, entries = v.as_array().map_or(0, Vec::len), "plan updated"),
                None => info!(%kind, "plan cleared"),
            }
        }
    })
}

fn entry_mut<T>(entries: &mut [T], kind: PlanKind, index: usize) -> ServiceResult<&mut T> {
    let len = entries.len();
    if len == 0 {
        return Err(ServiceError::PlanNotFound(kind.to_string()));
    }
    entries
        .get_mut(index)
        .ok_or(ServiceError::IndexOutOfRange { index, len })
}

fn write_atomic(path: &Path, data: &Map<String, Value>) -> ServiceResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension("tmp");
    let mut f = File::create(&temp)?;
    let content = serde_json::to_string_pretty(data)?;
    f.write_all(content.as_bytes())?;
    f.sync_all()?;
    fs::rename(temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeekId;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, PlanStore) {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::open(Some(&dir.path().join("nested").join("plans.json"))).unwrap();
        (dir, store)
    }

    fn weeks(n: u32) -> Vec<WeekRecord> {
        (1..=n).map(|i| WeekRecord::new(i, format!("W{i}"))).collect()
    }

    #[test]
    fn values_survive_reopen() {
        let (dir, mut store) = store();
        store.put_weeks(PlanKind::Premium, &weeks(2)).unwrap();
        store.save().unwrap();
        let reopened = PlanStore::open(Some(store.path())).unwrap();
        let loaded = reopened.load_weeks(PlanKind::Premium);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].week, WeekId::Number(2));
        assert!(reopened.get("roadmapProgress").is_none());
        assert!(!dir.path().join("nested").join("plans.tmp").exists());
    }

    #[test]
    fn unsaved_changes_stay_in_memory() {
        let (_dir, mut store) = store();
        store.put_weeks(PlanKind::Free, &weeks(1)).unwrap();
        assert_eq!(store.load_weeks(PlanKind::Free).len(), 1);
        let reopened = PlanStore::open(Some(store.path())).unwrap();
        assert!(reopened.load_weeks(PlanKind::Free).is_empty());
    }

    #[test]
    fn stored_records_reload_unchanged() {
        let (_dir, mut store) = store();
        let mut week = WeekRecord::new("1", "x".repeat(100));
        week.details = vec!["--release builds".into(), "* glob patterns".into()];
        week.project_link = "https://github.com/me/cli".into();
        store.put_weeks(PlanKind::Free, std::slice::from_ref(&week)).unwrap();
        store.save().unwrap();

        let reopened = PlanStore::open(Some(store.path())).unwrap();
        assert_eq!(reopened.load_weeks(PlanKind::Free), vec![week]);

        let topic = TopicItem {
            id: "t1".into(),
            title: "y".repeat(100),
            subtopics: vec!["- dashes kept".into()],
            ..Default::default()
        };
        store.put_topics(PlanKind::Basic, std::slice::from_ref(&topic)).unwrap();
        assert_eq!(store.load_topics(PlanKind::Basic), vec![topic]);
    }

    #[test]
    fn loosely_shaped_entries_go_through_the_parser() {
        let (_dir, mut store) = store();
        store.set("roadmapProgress", json!("Week 1: Basics\nvariables"));
        let loaded = store.load_weeks(PlanKind::Free);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Basics");
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plans.json");
        fs::write(&path, "[1, 2").unwrap();
        let store = PlanStore::open(Some(&path)).unwrap();
        assert!(store.load_weeks(PlanKind::Free).is_empty());
    }

    #[test]
    fn corrupt_entries_degrade_to_empty() {
        let (_dir, mut store) = store();
        store.set("roadmapProgress", json!(42));
        assert!(store.load_weeks(PlanKind::Free).is_empty());
        assert!(matches!(
            store.toggle_completed(PlanKind::Free, 0),
            Err(ServiceError::PlanNotFound(_))
        ));
    }

    #[test]
    fn toggles_links_and_reflections() {
        let (_dir, mut store) = store();
        store.put_weeks(PlanKind::Free, &weeks(3)).unwrap();
        assert!(store.toggle_completed(PlanKind::Free, 0).unwrap());
        store.set_project_link(PlanKind::Free, 1, " https://github.com/me/x ").unwrap();
        store.set_reflection(PlanKind::Free, 1, "Got stuck on traits").unwrap();

        let loaded = store.load_weeks(PlanKind::Free);
        assert!(loaded[0].completed);
        assert_eq!(loaded[1].project_link, "https://github.com/me/x");
        assert_eq!(loaded[1].reflection, "Got stuck on traits");

        assert!(!store.toggle_completed(PlanKind::Free, 0).unwrap());
        assert!(matches!(
            store.toggle_completed(PlanKind::Free, 3),
            Err(ServiceError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn basic_plan_has_no_reflections() {
        let (_dir, mut store) = store();
        let topics = vec![TopicItem {
            id: "a".into(),
            title: "HTML".into(),
            ..Default::default()
        }];
        store.put_topics(PlanKind::Basic, &topics).unwrap();
        assert!(store.set_reflection(PlanKind::Basic, 0, "x").is_err());
        assert!(store.toggle_completed(PlanKind::Basic, 0).unwrap());
        assert!(store.load_topics(PlanKind::Basic)[0].completed);
    }

    #[test]
    fn progress_and_next_active() {
        let (_dir, mut store) = store();
        let empty = store.progress(PlanKind::Free);
        assert_eq!(empty.percent, 0.0);
        assert_eq!(empty.next_active, None);

        store.put_weeks(PlanKind::Free, &weeks(4)).unwrap();
        store.toggle_completed(PlanKind::Free, 0).unwrap();
        let progress = store.progress(PlanKind::Free);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.percent, 25.0);
        assert_eq!(progress.next_active, Some(1));
        assert_eq!(progress.next_title.as_deref(), Some("Week 2: W2"));
        assert!(progress.pace.starts_with("Slow and steady"));

        for i in 1..4 {
            store.toggle_completed(PlanKind::Free, i).unwrap();
        }
        let done = store.progress(PlanKind::Free);
        assert_eq!(done.percent, 100.0);
        assert_eq!(done.next_active, None);
        assert!(done.pace.starts_with("Push mode"));
    }

    #[test]
    fn reset_removes_only_one_kind() {
        let (_dir, mut store) = store();
        store.put_weeks(PlanKind::Free, &weeks(1)).unwrap();
        store.put_weeks(PlanKind::Premium, &weeks(1)).unwrap();
        assert!(store.reset(PlanKind::Free));
        assert!(!store.reset(PlanKind::Free));
        assert!(store.load_weeks(PlanKind::Free).is_empty());
        assert_eq!(store.load_weeks(PlanKind::Premium).len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_changes_for_their_key() {
        let (_dir, mut store) = store();
        let mut sub = store.subscribe("premiumRoadmapProgress");
        store.set("roadmapProgress", json!([]));
        store.set("premiumRoadmapProgress", json!([{ "week": 1, "title": "A" }]));
        store.remove("premiumRoadmapProgress");

        let first = sub.recv().await.unwrap().unwrap();
        assert_eq!(first[0]["title"], "A");
        assert_eq!(sub.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropped_store_ends_subscription() {
        let (_dir, store) = store();
        let mut sub = store.subscribe("roadmapProgress");
        drop(store);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn change_logger_stops_with_the_store() {
        let (_dir, mut store) = store();
        let logger = log_plan_changes(&store, PlanKind::Free);
        store.put_weeks(PlanKind::Free, &weeks(2)).unwrap();
        store.reset(PlanKind::Free);
        drop(store);
        logger.await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_save_writes_file() {
        let (_dir, mut store) = store();
        store.set("k", json!(1));
        let (path, data) = store.snapshot_for_save();
        store.set("k", json!(2));
        PlanStore::save_snapshot_async(path, data).await.unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"k\": 1"));
    }
}
