use crate::ApiResult;
use async_trait::async_trait;

/// Key under which the expanded node id list is persisted.
pub const EXPANDED_STATE_KEY: &str = "solutionTreeExpanded";

/// Host-owned key/value storage that survives across sessions.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value, `None` if the key was never written.
    async fn get(&self, key: &str) -> ApiResult<Option<serde_json::Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: serde_json::Value) -> ApiResult<()>;
}
