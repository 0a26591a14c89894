use super::cache::{KeyValueStore, ANALYSES_KEY};
use crate::extract::AnalysisRecord;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 10;
const BROADCAST_CAPACITY: usize = 64;

/// Most-recent-first list of records with a fixed capacity.
#[derive(Debug, Clone)]
pub struct RecentAnalyses {
    capacity: usize,
    records: VecDeque<AnalysisRecord>,
}

impl RecentAnalyses {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Build from a most-recent-first list, dropping anything past capacity.
    pub fn from_records(capacity: usize, records: Vec<AnalysisRecord>) -> Self {
        let mut recent = Self::new(capacity);
        recent.records.extend(records.into_iter().take(recent.capacity));
        recent
    }

    /// Push to the front; returns the evicted oldest record, if any.
    pub fn push(&mut self, record: AnalysisRecord) -> Option<AnalysisRecord> {
        self.records.push_front(record);
        if self.records.len() > self.capacity {
            self.records.pop_back()
        } else {
            None
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&AnalysisRecord> {
        self.records.front()
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<AnalysisRecord> {
        self.records.iter().cloned().collect()
    }
}

/// Owns the recent list, its cache and the "new analysis" channel.
pub struct AnalysisFeed<S: KeyValueStore> {
    recent: RecentAnalyses,
    store: S,
    tx: broadcast::Sender<AnalysisRecord>,
    seen: HashSet<String>,
}

impl<S: KeyValueStore> AnalysisFeed<S> {
    /// Start from whatever the cache already holds. Nothing is broadcast.
    pub fn open(store: S, capacity: usize) -> Result<Self> {
        let records = load_records(&store)?;
        let recent = RecentAnalyses::from_records(capacity, records);
        let seen = recent.iter().map(|r| r.id.clone()).collect();
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        tracing::debug!(cached = recent.len(), "analysis feed opened");
        Ok(Self {
            recent,
            store,
            tx,
            seen,
        })
    }

    /// Write the new list to the cache, then commit and broadcast. The list is
    /// re-read from the cache first so records other writers added since
    /// `open` are kept. A failed cache write leaves the feed unchanged.
    pub fn publish(&mut self, record: AnalysisRecord) -> Result<()> {
        let mut next = RecentAnalyses::from_records(self.recent.capacity(), load_records(&self.store)?);
        next.push(record.clone());

        let value = serde_json::to_value(next.to_vec()).context("failed to serialize analyses")?;
        self.store
            .set(ANALYSES_KEY, value)
            .context("failed to write analyses cache")?;

        self.recent = next;
        self.seen.insert(record.id.clone());
        tracing::info!(id = %record.id, teams = %record.analysis.teams, "analysis published");
        if self.tx.send(record).is_err() {
            tracing::debug!("no subscribers for new analysis");
        }
        Ok(())
    }

    /// Reload from the cache and broadcast records not seen before, oldest
    /// first. Returns how many were new.
    pub fn refresh(&mut self) -> Result<usize> {
        let records = load_records(&self.store)?;
        self.recent = RecentAnalyses::from_records(self.recent.capacity(), records);

        let fresh: Vec<AnalysisRecord> = self
            .recent
            .iter()
            .filter(|r| !self.seen.contains(&r.id))
            .cloned()
            .collect();
        for record in fresh.iter().rev() {
            self.seen.insert(record.id.clone());
            let _ = self.tx.send(record.clone());
        }
        if !fresh.is_empty() {
            tracing::info!(new = fresh.len(), "new analyses in cache");
        }
        Ok(fresh.len())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisRecord> {
        self.tx.subscribe()
    }

    pub fn recent(&self) -> &RecentAnalyses {
        &self.recent
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Cached records, most recent first. Bad data is skipped, never fatal.
fn load_records<S: KeyValueStore>(store: &S) -> Result<Vec<AnalysisRecord>> {
    let items = match store.get(ANALYSES_KEY)? {
        Some(Value::Array(items)) => items,
        Some(_) => {
            tracing::warn!(key = ANALYSES_KEY, "cached analyses are not a list; ignoring");
            return Ok(Vec::new());
        }
        None => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AnalysisRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed cached analysis");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Analysis;
    use crate::feed::cache::{FileStore, MemoryStore};
    use serde_json::json;

    fn record(teams: &str) -> AnalysisRecord {
        AnalysisRecord::new(Analysis {
            teams: teams.to_string(),
            ..Default::default()
        })
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        fn set(&mut self, _key: &str, _value: Value) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_ring_buffer_capacity_and_order() {
        let mut recent = RecentAnalyses::new(3);
        for i in 0..5 {
            recent.push(record(&format!("game {i}")));
        }
        let teams: Vec<String> = recent.iter().map(|r| r.analysis.teams.clone()).collect();
        assert_eq!(teams, vec!["game 4", "game 3", "game 2"]);
        assert_eq!(recent.latest().unwrap().analysis.teams, "game 4");
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut recent = RecentAnalyses::new(1);
        assert!(recent.push(record("a")).is_none());
        assert_eq!(recent.push(record("b")).unwrap().analysis.teams, "a");
    }

    #[test]
    fn test_publish_writes_cache_and_broadcasts() {
        let mut feed = AnalysisFeed::open(MemoryStore::new(), DEFAULT_CAPACITY).unwrap();
        let mut rx = feed.subscribe();
        let r = record("Lakers vs Warriors");
        feed.publish(r.clone()).unwrap();

        assert_eq!(rx.try_recv().unwrap(), r);
        let cached = feed.store().get(ANALYSES_KEY).unwrap().unwrap();
        assert_eq!(cached[0]["id"], json!(r.id));
        assert_eq!(feed.recent().len(), 1);
    }

    #[test]
    fn test_publish_keeps_ten() {
        let mut feed = AnalysisFeed::open(MemoryStore::new(), DEFAULT_CAPACITY).unwrap();
        for i in 0..12 {
            feed.publish(record(&format!("game {i}"))).unwrap();
        }
        assert_eq!(feed.recent().len(), 10);
        assert_eq!(feed.recent().latest().unwrap().analysis.teams, "game 11");
        let cached = feed.store().get(ANALYSES_KEY).unwrap().unwrap();
        assert_eq!(cached.as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_publish_keeps_records_from_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut first = AnalysisFeed::open(FileStore::open(&path).unwrap(), DEFAULT_CAPACITY).unwrap();
        let mut second = AnalysisFeed::open(FileStore::open(&path).unwrap(), DEFAULT_CAPACITY).unwrap();

        let a = record("Lakers vs Warriors");
        let b = record("Celtics vs Heat");
        first.publish(a.clone()).unwrap();
        second.publish(b.clone()).unwrap();

        let stored = FileStore::open(&path).unwrap().get(ANALYSES_KEY).unwrap().unwrap();
        let ids: Vec<&str> = stored
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);
        assert_eq!(second.recent().len(), 2);
        assert_eq!(second.recent().latest().unwrap().id, b.id);
    }

    #[test]
    fn test_failed_cache_write_commits_nothing() {
        let mut feed = AnalysisFeed::open(FailingStore, DEFAULT_CAPACITY).unwrap();
        let mut rx = feed.subscribe();
        assert!(feed.publish(record("x")).is_err());
        assert!(feed.recent().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_refresh_broadcasts_only_new() {
        let mut store = MemoryStore::new();
        let old = record("old");
        store.set(ANALYSES_KEY, json!([old])).unwrap();
        let mut feed = AnalysisFeed::open(store, DEFAULT_CAPACITY).unwrap();
        let mut rx = feed.subscribe();

        assert_eq!(feed.refresh().unwrap(), 0);

        let new = record("new");
        feed.store.set(ANALYSES_KEY, json!([new, old])).unwrap();
        assert_eq!(feed.refresh().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap().id, new.id);
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.refresh().unwrap(), 0);
    }

    #[test]
    fn test_refresh_tolerates_corrupt_cache() {
        let mut store = MemoryStore::new();
        let good = record("good");
        store
            .set(ANALYSES_KEY, json!([{"id": 5}, good, "garbage"]))
            .unwrap();
        let mut feed = AnalysisFeed::open(store, DEFAULT_CAPACITY).unwrap();
        assert_eq!(feed.recent().len(), 1);
        assert_eq!(feed.recent().get(&good.id).unwrap().analysis.teams, "good");

        feed.store.set(ANALYSES_KEY, json!({"not": "a list"})).unwrap();
        assert_eq!(feed.refresh().unwrap(), 0);
        assert!(feed.recent().is_empty());
    }
}
