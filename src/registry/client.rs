//! Registry client over Maven-layout repositories
//!
//! Two transports behind one type: `http(s)://` via a blocking ureq agent
//! driven from `spawn_blocking`, and `file://` for local repositories and
//! tests. Metadata requests retry transient failures with bounded backoff;
//! 404 is the only permanent miss signal and is never retried.

use crate::config::NetworkConfig;
use crate::error::{JavelinError, JavelinResult};
use crate::model::{Coordinate, Identity};
use crate::project::Repository;
use crate::registry::pom::{parse_pom, parse_versions};
use crate::registry::{Metadata, Registry};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Registry client for a prioritized list of repositories
pub struct MavenRegistry {
    repositories: Vec<Repository>,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl MavenRegistry {
    pub fn new(repositories: Vec<Repository>, network: &NetworkConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(network.timeout_secs)))
            .build()
            .into();

        Self {
            repositories,
            agent,
            retry_attempts: network.retry_attempts.max(1),
        }
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// One GET against either transport. `Ok(None)` means 404 / file absent.
    pub async fn transport_get(&self, url: &str) -> JavelinResult<Option<Vec<u8>>> {
        if let Some(path) = url.strip_prefix("file://") {
            return match tokio::fs::read(path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(JavelinError::io(format!("reading {}", path), e)),
            };
        }

        let agent = self.agent.clone();
        let owned = url.to_string();
        tokio::task::spawn_blocking(move || match agent.get(&owned).call() {
            Ok(mut response) => {
                let bytes = response
                    .body_mut()
                    .read_to_vec()
                    .map_err(|e| JavelinError::network(&owned, e.to_string()))?;
                Ok(Some(bytes))
            }
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(JavelinError::network(&owned, e.to_string())),
        })
        .await
        .map_err(|e| JavelinError::Internal(format!("fetch task panicked: {e}")))?
    }

    /// GET with bounded exponential backoff on transient failures.
    async fn get_with_retry(&self, url: &str) -> JavelinResult<Option<Vec<u8>>> {
        let mut last: Option<JavelinError> = None;
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(200 * (1 << (attempt - 2).min(4)));
                tokio::time::sleep(backoff).await;
            }
            match self.transport_get(url).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_retryable() => {
                    warn!("Attempt {}/{} failed for {}: {}", attempt, self.retry_attempts, url, e);
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last {
            Some(JavelinError::Network { url, reason, .. }) => Err(JavelinError::Network {
                url,
                attempts: self.retry_attempts,
                reason,
            }),
            Some(e) => Err(e),
            None => Err(JavelinError::Internal("retry loop without attempts".to_string())),
        }
    }

    fn tried(&self) -> String {
        self.repositories
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Join a repository base URL and a relative path with exactly one slash.
pub fn join_url(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel.trim_start_matches('/'))
}

fn pom_path(coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{}/{}-{}.pom",
        coordinate.group.replace('.', "/"),
        coordinate.artifact,
        coordinate.version,
        coordinate.artifact,
        coordinate.version
    )
}

fn metadata_path(identity: &Identity) -> String {
    format!(
        "{}/{}/maven-metadata.xml",
        identity.group.replace('.', "/"),
        identity.artifact
    )
}

// Artifact bytes ride the same transport as metadata; the download manager
// owns the retry policy, so this is a single attempt.
#[async_trait]
impl crate::cache::Fetcher for MavenRegistry {
    async fn fetch(&self, url: &str) -> JavelinResult<Option<Vec<u8>>> {
        self.transport_get(url).await
    }
}

#[async_trait]
impl Registry for MavenRegistry {
    async fn fetch_metadata(&self, coordinate: &Coordinate) -> JavelinResult<Metadata> {
        let path = pom_path(coordinate);
        for repo in &self.repositories {
            let url = join_url(&repo.url, &path);
            debug!("Fetching metadata {}", url);
            match self.get_with_retry(&url).await? {
                Some(bytes) => {
                    let xml = String::from_utf8_lossy(&bytes);
                    let pom = parse_pom(&xml, coordinate)?;
                    return Ok(Metadata {
                        coordinate: coordinate.clone(),
                        dependencies: pom.dependencies,
                        parent: pom.parent,
                        managed: pom.managed,
                        repository: repo.url.clone(),
                    });
                }
                None => continue,
            }
        }

        Err(JavelinError::ArtifactNotFound {
            coordinate: coordinate.to_string(),
            repositories: self.tried(),
        })
    }

    async fn fetch_versions(&self, identity: &Identity) -> JavelinResult<Vec<String>> {
        let path = metadata_path(identity);
        for repo in &self.repositories {
            let url = join_url(&repo.url, &path);
            debug!("Fetching version list {}", url);
            match self.get_with_retry(&url).await? {
                Some(bytes) => {
                    let versions = parse_versions(&String::from_utf8_lossy(&bytes));
                    if !versions.is_empty() {
                        return Ok(versions);
                    }
                }
                None => continue,
            }
        }

        Err(JavelinError::ArtifactNotFound {
            coordinate: identity.to_string(),
            repositories: self.tried(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn file_repo(dir: &Path) -> Repository {
        Repository {
            name: "local".to_string(),
            url: format!("file://{}", dir.display()),
        }
    }

    fn write_pom(dir: &Path, coordinate: &Coordinate, body: &str) {
        let rel = pom_path(coordinate);
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://r/", "/a/b.pom"), "https://r/a/b.pom");
        assert_eq!(join_url("https://r", "a/b.pom"), "https://r/a/b.pom");
    }

    #[test]
    fn paths_follow_maven_layout() {
        let c = Coordinate::new("org.slf4j", "slf4j-api", "2.0.13");
        assert_eq!(
            pom_path(&c),
            "org/slf4j/slf4j-api/2.0.13/slf4j-api-2.0.13.pom"
        );
        assert_eq!(
            metadata_path(&c.identity()),
            "org/slf4j/slf4j-api/maven-metadata.xml"
        );
    }

    #[tokio::test]
    async fn fetch_metadata_from_file_repo() {
        let temp = TempDir::new().unwrap();
        let coordinate = Coordinate::new("com.example", "lib", "1.0");
        write_pom(
            temp.path(),
            &coordinate,
            r#"<project>
  <groupId>com.example</groupId>
  <artifactId>lib</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>2.0.13</version>
    </dependency>
  </dependencies>
</project>"#,
        );

        let registry =
            MavenRegistry::new(vec![file_repo(temp.path())], &NetworkConfig::default());
        let metadata = registry.fetch_metadata(&coordinate).await.unwrap();

        assert_eq!(metadata.dependencies.len(), 1);
        assert_eq!(metadata.repository, format!("file://{}", temp.path().display()));
    }

    #[tokio::test]
    async fn missing_artifact_reports_tried_repositories() {
        let temp = TempDir::new().unwrap();
        let registry =
            MavenRegistry::new(vec![file_repo(temp.path())], &NetworkConfig::default());

        let err = registry
            .fetch_metadata(&Coordinate::new("no.such", "thing", "1.0"))
            .await
            .unwrap_err();

        match err {
            JavelinError::ArtifactNotFound { repositories, .. } => {
                assert_eq!(repositories, "local");
            }
            other => panic!("expected ArtifactNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_repository_is_consulted() {
        let empty = TempDir::new().unwrap();
        let stocked = TempDir::new().unwrap();
        let coordinate = Coordinate::new("com.example", "lib", "2.0");
        write_pom(
            stocked.path(),
            &coordinate,
            "<project><groupId>com.example</groupId><artifactId>lib</artifactId><version>2.0</version></project>",
        );

        let registry = MavenRegistry::new(
            vec![file_repo(empty.path()), Repository {
                name: "backup".to_string(),
                url: format!("file://{}", stocked.path().display()),
            }],
            &NetworkConfig::default(),
        );

        let metadata = registry.fetch_metadata(&coordinate).await.unwrap();
        assert!(metadata.repository.contains(&stocked.path().display().to_string()));
    }

    #[tokio::test]
    async fn fetch_versions_from_file_repo() {
        let temp = TempDir::new().unwrap();
        let identity = Identity::new("com.example", "lib");
        let path = temp.path().join(metadata_path(&identity));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "<metadata><versioning><versions><version>1.0</version><version>1.1</version></versions></versioning></metadata>",
        )
        .unwrap();

        let registry =
            MavenRegistry::new(vec![file_repo(temp.path())], &NetworkConfig::default());
        let versions = registry.fetch_versions(&identity).await.unwrap();
        assert_eq!(versions, vec!["1.0", "1.1"]);
    }
}
