//! JSON file implementation of `LocalSessionCache`.

use crate::paths::SidechatPaths;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sidechat_core::error::Result;
use sidechat_core::session::{LocalSessionCache, Session};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    sessions: Vec<Session>,
}

/// Stores the session collection in a single JSON file.
///
/// Writes go to a temporary sibling first and are renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileSessionCache {
    path: PathBuf,
}

impl JsonFileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the platform location (`~/.cache/sidechat/sessions.json`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(SidechatPaths::session_cache_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sessions.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LocalSessionCache for JsonFileSessionCache {
    async fn load_all(&self) -> Result<Vec<Session>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("[JsonFileSessionCache] No cache at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let file: CacheFile = serde_json::from_slice(&content)?;
        if file.version != CACHE_VERSION {
            tracing::warn!(
                "[JsonFileSessionCache] Ignoring cache with version {} (expected {})",
                file.version,
                CACHE_VERSION
            );
            return Ok(Vec::new());
        }
        tracing::debug!(
            "[JsonFileSessionCache] Loaded {} sessions from {}",
            file.sessions.len(),
            self.path.display()
        );
        Ok(file.sessions)
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(&CacheFile {
            version: CACHE_VERSION,
            sessions: sessions.to_vec(),
        })?;

        let tmp_path = self.temp_path();
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        tmp_file.write_all(&json).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);
        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!(
            "[JsonFileSessionCache] Wrote {} sessions to {}",
            sessions.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(key: &str) -> Session {
        Session {
            key: key.into(),
            url: format!("https://{key}.test"),
            title: key.to_uppercase(),
            ..Session::default()
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileSessionCache::new(dir.path().join("absent.json"));
        assert!(cache.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileSessionCache::new(dir.path().join("nested/sessions.json"));
        let sessions = vec![session("a"), session("b")];

        cache.save_all(&sessions).await.unwrap();

        assert_eq!(cache.load_all().await.unwrap(), sessions);
        assert!(!cache.temp_path().exists());
    }

    #[tokio::test]
    async fn later_snapshot_replaces_earlier() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileSessionCache::new(dir.path().join("sessions.json"));

        cache.save_all(&[session("a"), session("b")]).await.unwrap();
        cache.save_all(&[session("c")]).await.unwrap();

        let loaded = cache.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, "c");
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileSessionCache::new(path).load_all().await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn unknown_version_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, r#"{"version": 99, "sessions": [{"key": "a"}]}"#).unwrap();

        assert!(JsonFileSessionCache::new(path).load_all().await.unwrap().is_empty());
    }
}
