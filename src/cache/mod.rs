//! Local artifact content cache
//!
//! Artifacts are stored under `(group, artifact, version, classifier)` keys in
//! a Maven-style directory layout. Entries are written once via a temp file
//! and an atomic rename, then only ever read; a new version is a new key,
//! never an overwrite. The cache directory is shared across concurrent
//! javelin processes, so writers serialize on an advisory `flock` around the
//! publish step.

pub mod download;

pub use download::{DownloadManager, DownloadOutcome, DownloadRequest, Fetcher};

use crate::error::{JavelinError, JavelinResult};
use crate::model::Coordinate;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Cache key: coordinate plus optional classifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub coordinate: Coordinate,
    pub classifier: Option<String>,
}

impl CacheKey {
    pub fn new(coordinate: Coordinate, classifier: Option<String>) -> Self {
        Self {
            coordinate,
            classifier,
        }
    }

    /// Artifact filename for this key.
    pub fn filename(&self) -> String {
        self.coordinate.filename(self.classifier.as_deref())
    }

    /// Repository-relative artifact path for this key.
    pub fn repo_path(&self) -> String {
        self.coordinate.repo_path(self.classifier.as_deref())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.classifier {
            Some(c) => write!(f, "{}:{}", self.coordinate, c),
            None => write!(f, "{}", self.coordinate),
        }
    }
}

/// `sha256:<hex>` digest of a byte buffer
pub fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Handle to the process-wide artifact cache directory. Explicitly passed to
/// whoever needs it; there is no hidden singleton.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final on-disk path for a key:
    /// `{root}/{group}/{artifact}/{version}/{filename}`.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(&key.coordinate.group)
            .join(&key.coordinate.artifact)
            .join(&key.coordinate.version)
            .join(key.filename())
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    /// Read a cached entry's bytes.
    pub async fn read(&self, key: &CacheKey) -> JavelinResult<Vec<u8>> {
        let path = self.path(key);
        fs::read(&path)
            .await
            .map_err(|e| JavelinError::io(format!("reading cache entry {}", path.display()), e))
    }

    /// Publish verified bytes under a key. Writes a uniquely-named temp file,
    /// takes the cache write lock, and renames into place. Existing entries
    /// are immutable; a concurrent or earlier writer winning the race is a
    /// success, not a conflict.
    pub async fn put(&self, key: &CacheKey, bytes: &[u8]) -> JavelinResult<PathBuf> {
        let final_path = self.path(key);
        if final_path.is_file() {
            return Ok(final_path);
        }

        let dir = final_path
            .parent()
            .ok_or_else(|| JavelinError::PathNotFound(final_path.clone()))?;
        fs::create_dir_all(dir)
            .await
            .map_err(|e| JavelinError::DirCreate {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let tmp = dir.join(format!(".{}.{}.part", key.filename(), Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(JavelinError::io(
                format!("writing cache temp {}", tmp.display()),
                e,
            ));
        }

        let _guard = match CacheWriteLock::acquire(&self.root).await {
            Ok(guard) => guard,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        if final_path.is_file() {
            // another process published this key first
            let _ = fs::remove_file(&tmp).await;
            return Ok(final_path);
        }

        if let Err(e) = fs::rename(&tmp, &final_path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(JavelinError::io(
                format!("publishing cache entry {}", final_path.display()),
                e,
            ));
        }

        debug!("Cached {} ({} bytes)", key, bytes.len());
        Ok(final_path)
    }
}

/// Advisory exclusive lock on `{root}/.lock`, held for the duration of a
/// cache publish. Released when dropped.
struct CacheWriteLock {
    _file: std::fs::File,
}

impl CacheWriteLock {
    async fn acquire(root: &Path) -> JavelinResult<Self> {
        let lock_path = root.join(".lock");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            #[cfg(unix)]
            {
                use std::os::unix::io::AsRawFd;
                let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
                if rc != 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }
            Ok(file)
        })
        .await
        .map_err(|e| JavelinError::Internal(format!("lock task panicked: {e}")))?
        .map_err(|e| JavelinError::io("locking cache directory", e))?;

        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(coordinate: &str) -> CacheKey {
        CacheKey::new(coordinate.parse().unwrap(), None)
    }

    #[test]
    fn path_follows_layout() {
        let cache = ArtifactCache::new(PathBuf::from("/cache"));
        let k = key("org.slf4j:slf4j-api:2.0.13");
        assert_eq!(
            cache.path(&k),
            PathBuf::from("/cache/org.slf4j/slf4j-api/2.0.13/slf4j-api-2.0.13.jar")
        );
    }

    #[test]
    fn classifier_is_part_of_the_key() {
        let cache = ArtifactCache::new(PathBuf::from("/cache"));
        let plain = key("a:b:1.0");
        let sources = CacheKey::new("a:b:1.0".parse().unwrap(), Some("sources".to_string()));
        assert_ne!(cache.path(&plain), cache.path(&sources));
        assert_eq!(sources.filename(), "b-1.0-sources.jar");
    }

    #[test]
    fn digest_format() {
        let digest = sha256_digest(b"hello");
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
    }

    #[tokio::test]
    async fn put_then_has_then_read() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().to_path_buf());
        let k = key("com.example:lib:1.0");

        assert!(!cache.has(&k));
        let path = cache.put(&k, b"jar bytes").await.unwrap();
        assert!(cache.has(&k));
        assert_eq!(path, cache.path(&k));
        assert_eq!(cache.read(&k).await.unwrap(), b"jar bytes");
    }

    #[tokio::test]
    async fn put_existing_entry_is_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().to_path_buf());
        let k = key("com.example:lib:1.0");

        cache.put(&k, b"original").await.unwrap();
        cache.put(&k, b"replacement").await.unwrap();
        assert_eq!(cache.read(&k).await.unwrap(), b"original");
    }

    #[tokio::test]
    async fn concurrent_puts_leave_one_clean_entry() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().to_path_buf());
        let k = key("com.example:lib:1.0");

        let (a, b) = tokio::join!(cache.put(&k, b"payload"), cache.put(&k, b"payload"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.read(&k).await.unwrap(), b"payload");

        // no stray temp files
        let dir = cache.path(&k).parent().unwrap().to_path_buf();
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
