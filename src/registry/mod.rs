//! Registry access: dependency metadata from Maven-style repositories
//!
//! The `Registry` trait is the data-fetch boundary the resolver talks to.
//! `MavenRegistry` implements it over HTTP and local (`file://`) repositories;
//! tests substitute in-memory fakes.

pub mod client;
pub mod pom;

pub use client::MavenRegistry;

use crate::error::JavelinResult;
use crate::model::{Coordinate, Dependency, Identity};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Metadata for one artifact version: its direct dependencies plus the
/// version-management context needed to fill in unversioned declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub coordinate: Coordinate,
    /// Direct dependencies as declared
    pub dependencies: Vec<Dependency>,
    /// Parent POM for inherited managed versions
    pub parent: Option<Coordinate>,
    /// dependencyManagement table: identity -> version
    pub managed: BTreeMap<Identity, String>,
    /// Base URL of the repository that served this metadata
    pub repository: String,
}

/// Fetches dependency metadata for coordinates. Stateless per call; the
/// resolver memoizes, so each distinct coordinate is fetched at most once
/// per resolution run.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch metadata for one coordinate, trying repositories in order.
    async fn fetch_metadata(&self, coordinate: &Coordinate) -> JavelinResult<Metadata>;

    /// List the published versions of an identity, oldest first as the
    /// repository reports them.
    async fn fetch_versions(&self, identity: &Identity) -> JavelinResult<Vec<String>>;
}
