//! Lock file persistence (javelin.lock)
//!
//! The lock records the exact resolved coordinate, scope, checksum and source
//! repository of every artifact, plus a fingerprint of the declared dependency
//! set it was computed from. A fingerprint mismatch means the lock is stale
//! and resolution must run again; otherwise the lock is authoritative and
//! installs reproduce byte-for-byte across machines.

use crate::error::{JavelinError, JavelinResult};
use crate::model::{Coordinate, Dependency, Identity, Scope};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Lock file name next to javelin.toml
pub const LOCK_FILE_NAME: &str = "javelin.lock";

/// One pinned artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    pub scope: Scope,
    /// `sha256:<hex>` over the artifact bytes
    pub checksum: String,
    /// Base URL of the repository the artifact was resolved from
    pub repository: String,
}

impl LockEntry {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.group, &self.artifact)
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group, &self.artifact, &self.version)
    }
}

/// The persisted lock: fingerprinted, ordered, format-versioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,
    pub fingerprint: String,
    #[serde(rename = "artifact", default)]
    pub artifacts: Vec<LockEntry>,
}

impl LockFile {
    pub const FORMAT_VERSION: u32 = 1;

    /// Build a lock with entries sorted for byte-identical serialization.
    pub fn new(fingerprint: String, mut artifacts: Vec<LockEntry>) -> Self {
        artifacts.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then_with(|| a.artifact.cmp(&b.artifact))
                .then_with(|| a.classifier.cmp(&b.classifier))
        });
        Self {
            version: Self::FORMAT_VERSION,
            fingerprint,
            artifacts,
        }
    }

    pub fn entry(&self, identity: &Identity) -> Option<&LockEntry> {
        self.artifacts
            .iter()
            .find(|e| e.group == identity.group && e.artifact == identity.artifact)
    }
}

/// Fingerprint of a declared dependency set: `sha256:` over a canonical JSON
/// projection. Invariant to declaration order.
pub fn fingerprint(declared: &[Dependency]) -> String {
    let mut canonical: Vec<&Dependency> = declared.iter().collect();
    canonical.sort_by(|a, b| {
        a.identity
            .cmp(&b.identity)
            .then_with(|| a.scope.rank().cmp(&b.scope.rank()))
            .then_with(|| a.version.cmp(&b.version))
    });

    let json = serde_json::to_vec(&canonical).expect("dependencies serialize");
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Loads and commits the lock file for one project
pub struct LockManager {
    path: PathBuf,
}

impl LockManager {
    /// Manager for `javelin.lock` in a project directory
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(LOCK_FILE_NAME),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the lock, `None` when absent. A present-but-unreadable lock is an
    /// error rather than a silent re-resolve.
    pub async fn load(&self) -> JavelinResult<Option<LockFile>> {
        if !self.path.exists() {
            debug!("No lock file at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| JavelinError::io(format!("reading lock file {}", self.path.display()), e))?;

        let lock: LockFile =
            toml::from_str(&content).map_err(|e| JavelinError::LockInvalid {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if lock.version != LockFile::FORMAT_VERSION {
            return Err(JavelinError::LockInvalid {
                path: self.path.clone(),
                reason: format!("unsupported lock format version {}", lock.version),
            });
        }

        Ok(Some(lock))
    }

    /// Whether the stored fingerprint no longer matches the declared set.
    pub fn is_stale(lock: &LockFile, declared: &[Dependency]) -> bool {
        lock.fingerprint != fingerprint(declared)
    }

    /// Write the lock atomically: serialize to a temp file in the same
    /// directory, then rename over the final path. A crash mid-write never
    /// leaves a truncated lock.
    pub async fn commit(&self, lock: &LockFile) -> JavelinResult<()> {
        let content = toml::to_string_pretty(lock)?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let tmp = dir.join(format!(".{}.{}.tmp", LOCK_FILE_NAME, Uuid::new_v4()));

        fs::write(&tmp, &content)
            .await
            .map_err(|e| JavelinError::io(format!("writing lock temp {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(JavelinError::io(
                format!("replacing lock file {}", self.path.display()),
                e,
            ));
        }

        debug!("Committed lock with {} artifact(s)", lock.artifacts.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dep(coordinate: &str, scope: Scope) -> Dependency {
        let c: Coordinate = coordinate.parse().unwrap();
        Dependency::new(c.identity(), c.version).with_scope(scope)
    }

    fn entry(coordinate: &str, scope: Scope) -> LockEntry {
        let c: Coordinate = coordinate.parse().unwrap();
        LockEntry {
            group: c.group,
            artifact: c.artifact,
            version: c.version,
            classifier: None,
            scope,
            checksum: "sha256:00".to_string(),
            repository: "https://repo.test/maven2/".to_string(),
        }
    }

    #[test]
    fn fingerprint_ignores_declaration_order() {
        let a = dep("org.slf4j:slf4j-api:2.0.13", Scope::Compile);
        let b = dep("junit:junit:4.13.2", Scope::Test);

        assert_eq!(
            fingerprint(&[a.clone(), b.clone()]),
            fingerprint(&[b, a])
        );
    }

    #[test]
    fn fingerprint_changes_with_the_declared_set() {
        let a = dep("org.slf4j:slf4j-api:2.0.13", Scope::Compile);
        let b = dep("junit:junit:4.13.2", Scope::Test);

        let base = fingerprint(&[a.clone()]);
        assert_ne!(base, fingerprint(&[a.clone(), b]));
        // version bump changes it too
        assert_ne!(
            base,
            fingerprint(&[dep("org.slf4j:slf4j-api:2.0.14", Scope::Compile)])
        );
        // scope change changes it
        assert_ne!(
            base,
            fingerprint(&[dep("org.slf4j:slf4j-api:2.0.13", Scope::Runtime)])
        );
    }

    #[test]
    fn lock_entries_are_sorted() {
        let lock = LockFile::new(
            "sha256:f".to_string(),
            vec![
                entry("z.group:artifact:1.0", Scope::Compile),
                entry("a.group:artifact:1.0", Scope::Compile),
                entry("a.group:aardvark:1.0", Scope::Compile),
            ],
        );

        let order: Vec<&str> = lock.artifacts.iter().map(|e| e.artifact.as_str()).collect();
        assert_eq!(order, vec!["aardvark", "artifact", "artifact"]);
        assert_eq!(lock.artifacts[2].group, "z.group");
    }

    #[tokio::test]
    async fn commit_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let manager = LockManager::new(temp.path());

        let lock = LockFile::new(
            fingerprint(&[dep("org.slf4j:slf4j-api:2.0.13", Scope::Compile)]),
            vec![entry("org.slf4j:slf4j-api:2.0.13", Scope::Compile)],
        );

        manager.commit(&lock).await.unwrap();
        let loaded = manager.load().await.unwrap().unwrap();
        assert_eq!(loaded, lock);
    }

    #[tokio::test]
    async fn commit_is_byte_deterministic() {
        let temp = TempDir::new().unwrap();
        let manager = LockManager::new(temp.path());

        let lock = LockFile::new(
            "sha256:f".to_string(),
            vec![
                entry("b:b:1.0", Scope::Compile),
                entry("a:a:1.0", Scope::Runtime),
            ],
        );

        manager.commit(&lock).await.unwrap();
        let first = std::fs::read(manager.path()).unwrap();
        manager.commit(&lock).await.unwrap();
        let second = std::fs::read(manager.path()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn load_absent_lock() {
        let temp = TempDir::new().unwrap();
        let manager = LockManager::new(temp.path());
        assert!(manager.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_corrupt_lock_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCK_FILE_NAME), "not toml [").unwrap();

        let err = LockManager::new(temp.path()).load().await.unwrap_err();
        assert!(matches!(err, JavelinError::LockInvalid { .. }));
    }

    #[tokio::test]
    async fn load_rejects_future_format_version() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(LOCK_FILE_NAME),
            "version = 99\nfingerprint = \"sha256:f\"\n",
        )
        .unwrap();

        let err = LockManager::new(temp.path()).load().await.unwrap_err();
        assert!(matches!(err, JavelinError::LockInvalid { .. }));
    }

    #[test]
    fn staleness_tracks_fingerprint() {
        let declared = vec![dep("org.slf4j:slf4j-api:2.0.13", Scope::Compile)];
        let lock = LockFile::new(fingerprint(&declared), vec![]);

        assert!(!LockManager::is_stale(&lock, &declared));

        let mut grown = declared.clone();
        grown.push(dep("junit:junit:4.13.2", Scope::Test));
        assert!(LockManager::is_stale(&lock, &grown));
    }

    #[test]
    fn entry_lookup_by_identity() {
        let lock = LockFile::new(
            "sha256:f".to_string(),
            vec![entry("org.slf4j:slf4j-api:2.0.13", Scope::Compile)],
        );

        let found = lock.entry(&Identity::new("org.slf4j", "slf4j-api")).unwrap();
        assert_eq!(found.version, "2.0.13");
        assert_eq!(found.coordinate().to_string(), "org.slf4j:slf4j-api:2.0.13");
        assert!(lock.entry(&Identity::new("junit", "junit")).is_none());
    }
}
