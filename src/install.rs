//! Install orchestration
//!
//! Composes the resolver, lock manager and download manager:
//! declared dependencies -> lock load + staleness check -> resolve when stale,
//! absent or forced -> download everything -> commit the lock -> materialize
//! artifacts into the project's lib/ directory. A fresh lock is authoritative
//! and skips resolution entirely, which is what makes installs reproducible
//! across machines.

use crate::cache::{ArtifactCache, CacheKey, DownloadManager, DownloadOutcome, DownloadRequest, Fetcher};
use crate::config::{merge_repositories, Config};
use crate::error::{JavelinError, JavelinResult};
use crate::lockfile::{fingerprint, LockEntry, LockFile, LockManager};
use crate::project::Manifest;
use crate::registry::{MavenRegistry, Registry};
use crate::resolver::Resolver;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Install behavior flags
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Skip test and provided scopes for download and materialization
    pub production: bool,
    /// Ignore an up-to-date lock and re-resolve
    pub force: bool,
}

/// What an install did, for CLI reporting
#[derive(Debug)]
pub struct InstallReport {
    /// Artifacts covered by this install (after scope filtering)
    pub resolved: usize,
    /// Artifacts actually fetched over the network
    pub downloaded: usize,
    /// True when the existing lock was authoritative
    pub from_lock: bool,
    /// True when a new lock was committed
    pub lock_written: bool,
    /// Files placed into the project's lib directory
    pub materialized: Vec<PathBuf>,
}

/// Build the registry client for a project: manifest repositories first,
/// then the globally configured ones.
pub fn registry_for(manifest: &Manifest, config: &Config) -> Arc<MavenRegistry> {
    let repositories = merge_repositories(&manifest.repositories(), &config.repositories());
    Arc::new(MavenRegistry::new(repositories, &config.network))
}

/// Build the download manager over the shared artifact cache.
pub fn downloads_for<F: Fetcher>(fetcher: Arc<F>, config: &Config) -> DownloadManager<F> {
    DownloadManager::new(ArtifactCache::new(config.cache_dir()), fetcher, &config.network)
}

/// Race a fallible operation against Ctrl-C. On interrupt the operation's
/// future is dropped: in-flight downloads are abandoned and no lock commit
/// can happen afterwards.
pub async fn run_cancellable<T>(
    operation: impl Future<Output = JavelinResult<T>>,
) -> JavelinResult<T> {
    tokio::select! {
        result = operation => result,
        _ = tokio::signal::ctrl_c() => Err(JavelinError::Interrupted),
    }
}

/// One-project install orchestrator
pub struct Installer<R: Registry, F: Fetcher> {
    resolver: Resolver<R>,
    downloads: DownloadManager<F>,
}

impl<R: Registry, F: Fetcher> Installer<R, F> {
    pub fn new(resolver: Resolver<R>, downloads: DownloadManager<F>) -> Self {
        Self {
            resolver,
            downloads,
        }
    }

    /// Run a full install for the project the manifest describes.
    pub async fn install(
        &self,
        manifest: &Manifest,
        options: InstallOptions,
    ) -> JavelinResult<InstallReport> {
        let declared = manifest.declared_dependencies()?;
        let locks = LockManager::new(&manifest.project_dir());
        let declared_fingerprint = fingerprint(&declared);

        let authoritative = if options.force {
            debug!("Forced install, ignoring lock");
            None
        } else {
            locks
                .load()
                .await?
                .filter(|lock| lock.fingerprint == declared_fingerprint)
        };

        match authoritative {
            Some(lock) => self.install_from_lock(manifest, &lock, options).await,
            None => {
                self.resolve_and_install(manifest, &locks, declared_fingerprint, options)
                    .await
            }
        }
    }

    async fn install_from_lock(
        &self,
        manifest: &Manifest,
        lock: &LockFile,
        options: InstallOptions,
    ) -> JavelinResult<InstallReport> {
        info!("Lock is up to date, installing {} artifact(s)", lock.artifacts.len());

        let entries: Vec<&LockEntry> = lock
            .artifacts
            .iter()
            .filter(|e| !options.production || e.scope.in_production())
            .collect();

        let requests = entries
            .iter()
            .map(|e| DownloadRequest {
                key: CacheKey::new(e.coordinate(), e.classifier.clone()),
                repository: e.repository.clone(),
                expected: Some(e.checksum.clone()),
            })
            .collect();
        let outcomes = self.downloads.ensure_all(requests).await?;
        let materialized = materialize(&manifest.lib_dir(), &outcomes).await?;

        Ok(InstallReport {
            resolved: entries.len(),
            downloaded: outcomes.iter().filter(|o| o.fetched).count(),
            from_lock: true,
            lock_written: false,
            materialized,
        })
    }

    async fn resolve_and_install(
        &self,
        manifest: &Manifest,
        locks: &LockManager,
        declared_fingerprint: String,
        options: InstallOptions,
    ) -> JavelinResult<InstallReport> {
        let declared = manifest.declared_dependencies()?;
        let graph = self.resolver.resolve(&declared).await?;
        info!("Resolved {} artifact(s)", graph.len());

        let view = if options.production {
            graph.production()
        } else {
            graph.clone()
        };

        let requests = view
            .nodes()
            .map(|node| DownloadRequest {
                key: CacheKey::new(node.coordinate.clone(), node.classifier.clone()),
                repository: node.repository.clone(),
                expected: None,
            })
            .collect();
        let outcomes = self.downloads.ensure_all(requests).await?;

        // A production install downloads only part of the graph, so it cannot
        // produce a complete lock; the next full install writes one.
        let lock_written = if options.production {
            false
        } else {
            // nodes and outcomes are both (group, artifact)-sorted
            let entries = view
                .nodes()
                .zip(outcomes.iter())
                .map(|(node, outcome)| LockEntry {
                    group: node.coordinate.group.clone(),
                    artifact: node.coordinate.artifact.clone(),
                    version: node.coordinate.version.clone(),
                    classifier: node.classifier.clone(),
                    scope: node.scope,
                    checksum: outcome.checksum.clone(),
                    repository: node.repository.clone(),
                })
                .collect();
            locks
                .commit(&LockFile::new(declared_fingerprint, entries))
                .await?;
            true
        };

        let materialized = materialize(&manifest.lib_dir(), &outcomes).await?;

        Ok(InstallReport {
            resolved: view.len(),
            downloaded: outcomes.iter().filter(|o| o.fetched).count(),
            from_lock: false,
            lock_written,
            materialized,
        })
    }
}

/// Place cache entries into the project's dependency directory.
/// Hard link when the filesystem allows it, copy otherwise.
async fn materialize(
    lib_dir: &Path,
    outcomes: &[DownloadOutcome],
) -> JavelinResult<Vec<PathBuf>> {
    fs::create_dir_all(lib_dir)
        .await
        .map_err(|e| JavelinError::DirCreate {
            path: lib_dir.to_path_buf(),
            source: e,
        })?;

    let mut placed = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let dest = lib_dir.join(outcome.key.filename());
        if dest.exists() {
            fs::remove_file(&dest)
                .await
                .map_err(|e| JavelinError::io(format!("replacing {}", dest.display()), e))?;
        }
        if std::fs::hard_link(&outcome.path, &dest).is_err() {
            fs::copy(&outcome.path, &dest).await.map_err(|e| {
                JavelinError::io(
                    format!("copying {} into {}", outcome.key, dest.display()),
                    e,
                )
            })?;
        }
        placed.push(dest);
    }

    debug!("Materialized {} artifact(s) into {}", placed.len(), lib_dir.display());
    Ok(placed)
}
