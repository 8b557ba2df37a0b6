//! `StateStore` implementations for hosts that do not bring their own.

use crate::config::data_dir;
use async_trait::async_trait;
use serde_json::{Map, Value};
use solscope_api::{ApiError, ApiResult, StateStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> ApiResult<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> ApiResult<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON object per solution, stored under the data directory.
pub struct JsonFileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStateStore {
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store for `solution_path` at `~/.solscope/state/<hash>.json`.
    pub fn for_solution(solution_path: &Path) -> Self {
        let canonical = solution_path
            .canonicalize()
            .unwrap_or_else(|_| solution_path.to_path_buf());
        let hash = xxh3_64(canonical.to_string_lossy().as_bytes());
        Self::at(data_dir().join("state").join(format!("{hash:016x}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> ApiResult<Map<String, Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(ApiError::Internal(err.to_string())),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!("Ignoring corrupt state file {}", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn get(&self, key: &str) -> ApiResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> ApiResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);

        let internal = |err: std::io::Error| ApiError::Internal(err.to_string());
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(internal)?;
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(all))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(internal)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", json!(["a", "b"])).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(["a", "b"])));
    }

    #[tokio::test]
    async fn test_file_store_persists_keys_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = JsonFileStateStore::at(path.clone());
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!("two")).await.unwrap();

        let reopened = JsonFileStateStore::at(path.clone());
        assert_eq!(reopened.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(reopened.get("b").await.unwrap(), Some(json!("two")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStateStore::at(path);
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", json!(true)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!(true)));
    }
}
