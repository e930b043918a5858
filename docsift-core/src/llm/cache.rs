// LLM response cache keyed by (model_id, prompt_template_version, input_hash).
// Entries are JSON files under the configured cache directory.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ChatMessage;

/// Compute a cache key from the inputs that would go into an LLM call.
pub fn compute_input_hash(
    model_id: &str,
    template_version: &str,
    messages: &[ChatMessage],
) -> u64 {
    let mut hasher = DefaultHasher::new();
    model_id.hash(&mut hasher);
    template_version.hash(&mut hasher);
    for message in messages {
        format!("{:?}", message.role).hash(&mut hasher);
        message.content.hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    model_id: String,
    template_version: String,
    input_hash: u64,
    response: String,
    cached_at: DateTime<Utc>,
}

/// File-backed cache of raw LLM replies. A cache without a directory is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    dir: Option<PathBuf>,
}

impl ResponseCache {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    fn entry_path(dir: &Path, input_hash: u64) -> PathBuf {
        dir.join(format!("{input_hash:016x}.json"))
    }

    /// Look up a cached reply. Unreadable or mismatched entries count as misses.
    pub async fn get(&self, model_id: &str, input_hash: u64) -> Option<String> {
        let dir = self.dir.as_ref()?;
        let path = Self::entry_path(dir, input_hash);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.input_hash == input_hash && entry.model_id == model_id => {
                debug!(hash = input_hash, "LLM cache hit");
                Some(entry.response)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store a reply. Failures are logged and otherwise ignored.
    pub async fn put(
        &self,
        model_id: &str,
        template_version: &str,
        input_hash: u64,
        response: &str,
    ) {
        let Some(dir) = self.dir.as_ref() else {
            return;
        };
        let entry = CacheEntry {
            model_id: model_id.to_string(),
            template_version: template_version.to_string(),
            input_hash,
            response: response.to_string(),
            cached_at: Utc::now(),
        };
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            let bytes = serde_json::to_vec_pretty(&entry).map_err(std::io::Error::other)?;
            tokio::fs::write(Self::entry_path(dir, input_hash), bytes).await
        }
        .await;
        if let Err(e) = result {
            warn!(dir = %dir.display(), error = %e, "Failed to write LLM cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(text)]
    }

    #[test]
    fn input_hash_deterministic() {
        let h1 = compute_input_hash("model", "v1", &msgs("raw text"));
        let h2 = compute_input_hash("model", "v1", &msgs("raw text"));
        assert_eq!(h1, h2);
    }

    #[test]
    fn input_hash_changes_with_model() {
        let h1 = compute_input_hash("model-a", "v1", &msgs("text"));
        let h2 = compute_input_hash("model-b", "v1", &msgs("text"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn input_hash_changes_with_template_version() {
        let h1 = compute_input_hash("model", "v1", &msgs("text"));
        let h2 = compute_input_hash("model", "v2", &msgs("text"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn input_hash_changes_with_role() {
        let h1 = compute_input_hash("model", "v1", &[ChatMessage::user("x")]);
        let h2 = compute_input_hash("model", "v1", &[ChatMessage::system("x")]);
        assert_ne!(h1, h2);
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = ResponseCache::disabled();
        cache.put("m", "v1", 7, "reply").await;
        assert!(cache.get("m", 7).await.is_none());
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn put_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(Some(tmp.path().join("cache")));
        cache.put("m", "v1", 42, "{\"Name\": \"A\"}").await;

        assert_eq!(cache.get("m", 42).await.as_deref(), Some("{\"Name\": \"A\"}"));
        assert!(cache.get("other-model", 42).await.is_none());
        assert!(cache.get("m", 43).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let path = ResponseCache::entry_path(tmp.path(), 1);
        std::fs::write(&path, "not json").unwrap();
        let cache = ResponseCache::new(Some(tmp.path().to_path_buf()));
        assert!(cache.get("m", 1).await.is_none());
    }
}
