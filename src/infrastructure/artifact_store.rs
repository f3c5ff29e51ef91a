//! 归档存储 - 基础设施层
//!
//! 只写接口：给定路径键、正文与内容类型，创建（或覆盖）该对象。

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::debug;

/// 归档存储接口
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError>;
}

/// 内存中保存的一个对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// 内存归档存储
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<String, StoredArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredArtifact> {
        self.lock().get(key).cloned()
    }

    /// 所有键，按字典序
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredArtifact>> {
        // 写入方从不在持锁时 panic，中毒时沿用内部数据
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.lock().insert(
            key.to_string(),
            StoredArtifact {
                body: body.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

/// 元数据旁路文件的后缀
pub const METADATA_SUFFIX: &str = ".meta.json";

/// 与对象并列保存的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ArtifactMetadata {
    content_type: String,
    content_length: usize,
}

/// 文件系统归档存储，路径键映射为根目录下的相对路径
///
/// 正文写入 `<键>`，内容类型写入旁边的 `<键>.meta.json`。
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes_root {
            return Err(StorageError::unavailable(
                key,
                io::Error::new(io::ErrorKind::InvalidInput, "路径键不能离开归档根目录"),
            ));
        }
        Ok(self.root.join(relative))
    }

    /// 读回已写入的对象及其内容类型
    pub async fn read(&self, key: &str) -> Result<StoredArtifact, StorageError> {
        let path = self.resolve(key)?;
        let body = fs::read(&path)
            .await
            .map_err(|e| StorageError::unavailable(key, e))?;
        let raw = fs::read(metadata_path(&path))
            .await
            .map_err(|e| StorageError::unavailable(key, e))?;
        let metadata: ArtifactMetadata =
            serde_json::from_slice(&raw).map_err(|e| StorageError::unavailable(key, e))?;

        Ok(StoredArtifact {
            body,
            content_type: metadata.content_type,
        })
    }
}

fn metadata_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::unavailable(key, e))?;
        }
        fs::write(&path, body)
            .await
            .map_err(|e| StorageError::unavailable(key, e))?;

        let metadata = ArtifactMetadata {
            content_type: content_type.to_string(),
            content_length: body.len(),
        };
        let encoded =
            serde_json::to_vec(&metadata).map_err(|e| StorageError::unavailable(key, e))?;
        fs::write(metadata_path(&path), encoded)
            .await
            .map_err(|e| StorageError::unavailable(key, e))?;

        debug!("已写入 {} ({}, {} 字节)", path.display(), content_type, body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites_same_key() {
        let store = MemoryArtifactStore::new();
        store.put("a/b", b"one", "text/plain").await.unwrap();
        store.put("a/b", b"two", "application/xml").await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get("a/b").unwrap();
        assert_eq!(stored.body, b"two");
        assert_eq!(stored.content_type, "application/xml");
    }

    #[tokio::test]
    async fn fs_store_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store
            .put("hw1/s1/2024/05/06/07/08/TestResult.xml", b"<r/>", "application/xml")
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("hw1/s1/2024/05/06/07/08/TestResult.xml")).unwrap();
        assert_eq!(written, b"<r/>");

        let stored = store
            .read("hw1/s1/2024/05/06/07/08/TestResult.xml")
            .await
            .unwrap();
        assert_eq!(stored.body, b"<r/>");
        assert_eq!(stored.content_type, "application/xml");
        assert!(dir
            .path()
            .join("hw1/s1/2024/05/06/07/08/TestResult.xml.meta.json")
            .exists());
    }

    #[tokio::test]
    async fn fs_store_overwrite_replaces_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store.put("a/b.xml", b"one", "text/plain").await.unwrap();
        store.put("a/b.xml", b"two", "application/xml").await.unwrap();

        let stored = store.read("a/b.xml").await.unwrap();
        assert_eq!(stored.body, b"two");
        assert_eq!(stored.content_type, "application/xml");
    }

    #[tokio::test]
    async fn fs_store_rejects_keys_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let err = store.put("../escape.xml", b"x", "application/xml").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }
}
