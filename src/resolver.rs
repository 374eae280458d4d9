//! Transitive dependency resolution
//!
//! Breadth-first traversal from the declared dependencies. Conflicts between
//! versions of one artifact identity are settled by a two-tier rule applied
//! level by level: the version closest to the root wins, and at equal depth
//! the higher version wins (`model::compare_versions`). The outcome depends
//! only on depth, version and scope, never on fetch completion order.
//!
//! Metadata fetches are memoized per coordinate behind single-flight cells,
//! so diamond dependencies cost one fetch and concurrent branches requesting
//! the same coordinate join the outstanding request.

use crate::error::{JavelinError, JavelinResult};
use crate::model::{compare_versions, Coordinate, Dependency, Identity, Scope};
use crate::registry::{Metadata, Registry};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

/// One resolved artifact identity: the winning version and how it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: Coordinate,
    pub classifier: Option<String>,
    pub scope: Scope,
    pub depth: usize,
    /// Base URL of the repository that served the winning metadata
    pub repository: String,
    /// Chains from a declared root to this artifact, winning chain first
    pub paths: Vec<Vec<Coordinate>>,
}

impl ResolvedArtifact {
    pub fn identity(&self) -> Identity {
        self.coordinate.identity()
    }

    /// The winning chain, for error messages and `tree` output.
    pub fn chain(&self) -> &[Coordinate] {
        self.paths.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Output of one resolution run: one node per artifact identity plus the
/// declared child edges of every winner, acyclic by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGraph {
    nodes: BTreeMap<Identity, ResolvedArtifact>,
    edges: BTreeMap<Identity, Vec<Dependency>>,
    roots: Vec<Identity>,
}

impl ResolvedGraph {
    pub fn get(&self, identity: &Identity) -> Option<&ResolvedArtifact> {
        self.nodes.get(identity)
    }

    /// Nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResolvedArtifact> {
        self.nodes.values()
    }

    /// Declared children of a resolved node (winner's metadata).
    pub fn children(&self, identity: &Identity) -> &[Dependency] {
        self.edges.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identities of the declared dependencies, manifest order.
    pub fn roots(&self) -> &[Identity] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop test and provided nodes (production install view).
    pub fn production(&self) -> ResolvedGraph {
        let nodes: BTreeMap<Identity, ResolvedArtifact> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.scope.in_production())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(k, _)| nodes.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let roots = self
            .roots
            .iter()
            .filter(|r| nodes.contains_key(*r))
            .cloned()
            .collect();
        ResolvedGraph { nodes, edges, roots }
    }
}

/// A dependency reached during traversal, with its branch context
#[derive(Debug, Clone)]
struct Candidate {
    dep: Dependency,
    depth: usize,
    /// Coordinates from root to this candidate, inclusive
    chain: Vec<Coordinate>,
    /// Exclusions accumulated from every ancestor edge
    inherited_exclusions: BTreeSet<Identity>,
    repository: String,
}

impl Candidate {
    fn coordinate(&self) -> Coordinate {
        self.dep
            .coordinate()
            .expect("candidate versions are filled before queueing")
    }

    /// Exclusions governing this candidate's subtree.
    fn subtree_exclusions(&self) -> BTreeSet<Identity> {
        let mut all = self.inherited_exclusions.clone();
        all.extend(self.dep.exclusions.iter().cloned());
        all
    }
}

/// Deterministic preference between two same-depth candidates:
/// higher version first, then scope rank, then chain as final arbiter.
fn prefer(a: &Candidate, b: &Candidate) -> Ordering {
    compare_versions(
        b.dep.version.as_deref().unwrap_or(""),
        a.dep.version.as_deref().unwrap_or(""),
    )
    .then_with(|| a.dep.scope.rank().cmp(&b.dep.scope.rank()))
    .then_with(|| a.chain.cmp(&b.chain))
}

/// Effective scope of a transitive edge. Only compile and runtime parents are
/// expanded, and transitive test/provided children are dropped before this is
/// called, so both sides are compile or runtime here.
fn propagate_scope(parent: Scope, child: Scope) -> Scope {
    if parent == Scope::Runtime || child == Scope::Runtime {
        Scope::Runtime
    } else {
        Scope::Compile
    }
}

fn format_chain(chain: &[Coordinate]) -> String {
    chain
        .iter()
        .map(Coordinate::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Breadth-first version resolver over a `Registry`
pub struct Resolver<R: Registry> {
    registry: Arc<R>,
    fetch_parallel: usize,
    metadata: Mutex<HashMap<Coordinate, Arc<OnceCell<Arc<Metadata>>>>>,
}

impl<R: Registry> Resolver<R> {
    pub fn new(registry: Arc<R>, fetch_parallel: usize) -> Self {
        Self {
            registry,
            fetch_parallel: fetch_parallel.max(1),
            metadata: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch metadata at most once per coordinate; concurrent requesters for
    /// the same coordinate join the in-flight fetch.
    async fn fetch(&self, coordinate: &Coordinate) -> JavelinResult<Arc<Metadata>> {
        let cell = {
            let mut cache = self.metadata.lock().expect("metadata cache poisoned");
            cache
                .entry(coordinate.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let metadata = cell
            .get_or_try_init(|| async {
                debug!("Fetching metadata for {}", coordinate);
                self.registry.fetch_metadata(coordinate).await.map(Arc::new)
            })
            .await?;
        Ok(metadata.clone())
    }

    /// The managed-version table in effect for one POM: its own table merged
    /// over its parent chain, nearest declaration winning.
    async fn managed_context(
        &self,
        metadata: &Metadata,
    ) -> JavelinResult<BTreeMap<Identity, String>> {
        let mut tables = vec![metadata.managed.clone()];
        let mut parent = metadata.parent.clone();
        let mut hops = 0;
        while let Some(coordinate) = parent {
            if hops >= 10 {
                debug!("Parent chain of {} exceeds 10 hops, truncating", metadata.coordinate);
                break;
            }
            let meta = self.fetch(&coordinate).await?;
            tables.push(meta.managed.clone());
            parent = meta.parent.clone();
            hops += 1;
        }

        let mut managed = BTreeMap::new();
        for table in tables.into_iter().rev() {
            managed.extend(table);
        }
        Ok(managed)
    }

    /// Resolve the declared dependencies into a graph with one winning
    /// version per artifact identity.
    pub async fn resolve(&self, declared: &[Dependency]) -> JavelinResult<ResolvedGraph> {
        let mut graph = ResolvedGraph::default();
        let mut frontier: Vec<Candidate> = Vec::with_capacity(declared.len());

        for dep in declared {
            let version = dep.version.clone().ok_or_else(|| JavelinError::Resolution {
                identity: dep.identity.to_string(),
                chain: "declared dependencies".to_string(),
            })?;
            let coordinate = dep.identity.at(version);
            if !graph.roots.contains(&dep.identity) {
                graph.roots.push(dep.identity.clone());
            }
            frontier.push(Candidate {
                dep: dep.clone(),
                depth: 0,
                chain: vec![coordinate],
                inherited_exclusions: BTreeSet::new(),
                repository: String::new(),
            });
        }

        while !frontier.is_empty() {
            let to_expand = self.select_level(&mut graph, frontier);
            frontier = self.expand_level(&mut graph, to_expand).await?;
        }

        Ok(graph)
    }

    /// Apply conflict resolution to one frontier level. Returns the winners
    /// that still need their subtree expanded.
    fn select_level(&self, graph: &mut ResolvedGraph, mut frontier: Vec<Candidate>) -> Vec<Candidate> {
        // Deterministic order regardless of how the level was produced: the
        // preferred candidate for each identity comes first
        frontier.sort_by(|a, b| {
            a.dep
                .identity
                .cmp(&b.dep.identity)
                .then_with(|| prefer(a, b))
        });

        let mut winners = Vec::new();
        for candidate in frontier {
            let identity = candidate.dep.identity.clone();

            if let Some(existing) = graph.nodes.get_mut(&identity) {
                // Already selected at a shallower level, or a preferred
                // same-level candidate came first; keep the chain for
                // diagnostics and drop the loser's subtree.
                if !existing.paths.contains(&candidate.chain) {
                    existing.paths.push(candidate.chain.clone());
                }
                continue;
            }

            graph.nodes.insert(
                identity,
                ResolvedArtifact {
                    coordinate: candidate.coordinate(),
                    classifier: candidate.dep.classifier.clone(),
                    scope: candidate.dep.scope,
                    depth: candidate.depth,
                    repository: candidate.repository.clone(),
                    paths: vec![candidate.chain.clone()],
                },
            );
            winners.push(candidate);
        }

        winners
    }

    /// Fetch metadata for the level winners and queue their children.
    async fn expand_level(
        &self,
        graph: &mut ResolvedGraph,
        winners: Vec<Candidate>,
    ) -> JavelinResult<Vec<Candidate>> {
        let fetches: Vec<_> = winners
            .iter()
            .map(|candidate| {
                let coordinate = candidate.coordinate();
                async move { self.fetch(&coordinate).await }
            })
            .collect();
        let metadatas: Vec<Arc<Metadata>> = stream::iter(fetches)
            .buffered(self.fetch_parallel)
            .try_collect()
            .await?;

        let mut next = Vec::new();
        for (candidate, metadata) in winners.into_iter().zip(metadatas) {
            let identity = candidate.dep.identity.clone();

            // Record the serving repository on the node
            if let Some(node) = graph.nodes.get_mut(&identity) {
                node.repository = metadata.repository.clone();
            }
            graph
                .edges
                .insert(identity.clone(), metadata.dependencies.clone());

            // test/provided subtrees are never expanded
            if !candidate.dep.scope.propagates() {
                continue;
            }

            let exclusions = candidate.subtree_exclusions();
            let managed = self.managed_context(&metadata).await?;

            for child in &metadata.dependencies {
                if child.optional {
                    debug!("Skipping optional transitive dependency {}", child.identity);
                    continue;
                }
                if !child.scope.propagates() {
                    // transitive test/provided dependencies are omitted
                    continue;
                }
                if exclusions.contains(&child.identity) {
                    debug!(
                        "Excluding {} from the subtree of {}",
                        child.identity, identity
                    );
                    continue;
                }

                let version = child
                    .version
                    .clone()
                    .or_else(|| managed.get(&child.identity).cloned())
                    .ok_or_else(|| JavelinError::Resolution {
                        identity: child.identity.to_string(),
                        chain: format_chain(&candidate.chain),
                    })?;
                let child_coordinate = child.identity.at(&version);

                if candidate
                    .chain
                    .iter()
                    .any(|c| c.identity() == child.identity)
                {
                    let mut cycle = candidate.chain.clone();
                    cycle.push(child_coordinate);
                    return Err(JavelinError::Cycle {
                        chain: format_chain(&cycle),
                    });
                }

                let mut chain = candidate.chain.clone();
                chain.push(child_coordinate);
                next.push(Candidate {
                    dep: Dependency {
                        identity: child.identity.clone(),
                        version: Some(version),
                        scope: propagate_scope(candidate.dep.scope, child.scope),
                        optional: false,
                        classifier: child.classifier.clone(),
                        exclusions: child.exclusions.clone(),
                    },
                    depth: candidate.depth + 1,
                    chain,
                    inherited_exclusions: exclusions.clone(),
                    repository: metadata.repository.clone(),
                });
            }
        }

        Ok(next)
    }

    /// Newest published version of an identity (`update --latest`).
    pub async fn latest_version(&self, identity: &Identity) -> JavelinResult<String> {
        let versions = self.registry.fetch_versions(identity).await?;
        versions
            .into_iter()
            .max_by(|a, b| compare_versions(a, b))
            .ok_or_else(|| JavelinError::MetadataInvalid {
                coordinate: identity.to_string(),
                reason: "repository lists no versions".to_string(),
            })
    }
}
