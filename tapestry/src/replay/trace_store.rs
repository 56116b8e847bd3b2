//! Trace storage: an ordered, append-only log of capability calls keyed by
//! trace id. Stores are process-scoped state objects constructed at startup
//! and injected wherever recording happens; concurrent writers to the same
//! trace id are last-write-wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CoreError, CoreResult};
use crate::types::TraceId;

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_hash: String,
    pub input: Value,
    pub output: Value,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Append a step to the trace, creating the trace on first write.
    async fn append(&self, trace_id: &str, record: StepRecord) -> CoreResult<()>;

    /// The full recorded sequence for a trace, in append order.
    async fn get(&self, trace_id: &str) -> CoreResult<Option<Vec<StepRecord>>>;

    async fn list_traces(&self) -> CoreResult<Vec<TraceId>>;

    async fn clear(&self, trace_id: &str) -> CoreResult<()>;
}

/// In-memory trace store, the default for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryTraceStore {
    traces: DashMap<TraceId, Vec<StepRecord>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn append(&self, trace_id: &str, record: StepRecord) -> CoreResult<()> {
        self.traces
            .entry(trace_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn get(&self, trace_id: &str) -> CoreResult<Option<Vec<StepRecord>>> {
        Ok(self.traces.get(trace_id).map(|steps| steps.value().clone()))
    }

    async fn list_traces(&self) -> CoreResult<Vec<TraceId>> {
        let mut ids: Vec<TraceId> = self.traces.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn clear(&self, trace_id: &str) -> CoreResult<()> {
        self.traces.remove(trace_id);
        Ok(())
    }
}

/// File-backed trace store: one JSON file per trace under a base directory,
/// named by a sanitized trace id. Survives process restarts; fine for
/// development and replay-from-disk, not tuned for high write volume.
#[derive(Debug, Clone)]
pub struct FileTraceStore {
    base_dir: PathBuf,
}

impl FileTraceStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> std::io::Result<Self> {
        let dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { base_dir: dir })
    }

    fn path_for(&self, trace_id: &str) -> PathBuf {
        let safe: String = trace_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }

    fn read_steps(&self, trace_id: &str) -> CoreResult<Option<Vec<StepRecord>>> {
        let path = self.path_for(trace_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::Storage(format!("read {}: {e}", path.display())))?;
        let steps = serde_json::from_str(&content)
            .map_err(|e| CoreError::Storage(format!("decode {}: {e}", path.display())))?;
        Ok(Some(steps))
    }

    fn write_steps(&self, trace_id: &str, steps: &[StepRecord]) -> CoreResult<()> {
        let path = self.path_for(trace_id);
        let content = serde_json::to_string_pretty(steps)
            .map_err(|e| CoreError::Storage(format!("encode trace '{trace_id}': {e}")))?;
        std::fs::write(&path, content)
            .map_err(|e| CoreError::Storage(format!("write {}: {e}", path.display())))
    }
}

#[async_trait]
impl TraceStore for FileTraceStore {
    async fn append(&self, trace_id: &str, record: StepRecord) -> CoreResult<()> {
        let mut steps = self.read_steps(trace_id)?.unwrap_or_default();
        steps.push(record);
        self.write_steps(trace_id, &steps)
    }

    async fn get(&self, trace_id: &str) -> CoreResult<Option<Vec<StepRecord>>> {
        self.read_steps(trace_id)
    }

    async fn list_traces(&self) -> CoreResult<Vec<TraceId>> {
        let entries = std::fs::read_dir(&self.base_dir)
            .map_err(|e| CoreError::Storage(format!("read dir {}: {e}", self.base_dir.display())))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| CoreError::Storage(format!("read dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn clear(&self, trace_id: &str) -> CoreResult<()> {
        let path = self.path_for(trace_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::Storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(hash: &str) -> StepRecord {
        StepRecord {
            step_hash: hash.to_string(),
            input: json!({"n": 1}),
            output: json!({"rows": []}),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_store_appends_in_order() {
        let store = InMemoryTraceStore::new();
        store.append("t1", record("a")).await.unwrap();
        store.append("t1", record("b")).await.unwrap();
        let steps = store.get("t1").await.unwrap().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_hash, "a");
        assert_eq!(steps[1].step_hash, "b");
    }

    #[tokio::test]
    async fn missing_trace_reads_as_none() {
        let store = InMemoryTraceStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileTraceStore::new(dir.path()).unwrap();
            store.append("run/2024", record("a")).await.unwrap();
            store.append("run/2024", record("b")).await.unwrap();
        }
        let reopened = FileTraceStore::new(dir.path()).unwrap();
        let steps = reopened.get("run/2024").await.unwrap().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].step_hash, "b");
    }

    #[tokio::test]
    async fn clear_removes_the_trace() {
        let store = InMemoryTraceStore::new();
        store.append("t1", record("a")).await.unwrap();
        store.clear("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
        assert!(store.list_traces().await.unwrap().is_empty());
    }
}
