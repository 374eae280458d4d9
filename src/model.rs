//! Coordinate and dependency value types
//!
//! Artifact identity, versioned coordinates, scopes and declared dependencies.
//! All types here are plain values; resolution state lives in `resolver`.

use crate::error::{JavelinError, JavelinResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Artifact identity: `group:artifact`, version-independent.
///
/// Conflict resolution and exclusions operate on identities; two versions of
/// the same identity are the same logical artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub group: String,
    pub artifact: String,
}

impl Identity {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    /// Attach a version, producing a full coordinate.
    pub fn at(&self, version: impl Into<String>) -> Coordinate {
        Coordinate {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for Identity {
    type Err = JavelinError;

    fn from_str(s: &str) -> JavelinResult<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(a), None) if !g.is_empty() && !a.is_empty() => {
                Ok(Self::new(g, a))
            }
            _ => Err(JavelinError::CoordinateInvalid {
                input: s.to_string(),
                expected: "group:artifact",
            }),
        }
    }
}

/// Full artifact coordinate: `group:artifact:version`. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.group, &self.artifact)
    }

    /// Jar filename for this coordinate, e.g. `guava-33.0.0-jre.jar`.
    pub fn filename(&self, classifier: Option<&str>) -> String {
        match classifier {
            Some(c) => format!("{}-{}-{}.jar", self.artifact, self.version, c),
            None => format!("{}-{}.jar", self.artifact, self.version),
        }
    }

    /// Repository-relative path for an artifact file, Maven layout:
    /// `com/example/lib/1.0/lib-1.0.jar`.
    pub fn repo_path(&self, classifier: Option<&str>) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.filename(classifier)
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = JavelinError;

    fn from_str(s: &str) -> JavelinResult<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(a), Some(v), None) if !g.is_empty() && !a.is_empty() && !v.is_empty() => {
                Ok(Self::new(g, a, v))
            }
            _ => Err(JavelinError::CoordinateInvalid {
                input: s.to_string(),
                expected: "group:artifact:version",
            }),
        }
    }
}

/// Build phase a dependency applies to, and how it propagates transitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Test,
    Provided,
}

impl Scope {
    /// Whether dependencies of this scope have their own dependencies
    /// expanded. `test` and `provided` subtrees are never visited.
    pub fn propagates(&self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }

    /// Whether this scope is part of a production install.
    pub fn in_production(&self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }

    /// Tie-break rank when one identity is reached at equal depth and version
    /// through differently-scoped chains. Lower rank wins.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Compile => 0,
            Self::Runtime => 1,
            Self::Provided => 2,
            Self::Test => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Test => "test",
            Self::Provided => "provided",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scope {
    type Err = JavelinError;

    fn from_str(s: &str) -> JavelinResult<Self> {
        match s {
            "compile" => Ok(Self::Compile),
            "runtime" => Ok(Self::Runtime),
            "test" => Ok(Self::Test),
            "provided" => Ok(Self::Provided),
            other => Err(JavelinError::User(format!(
                "Unknown scope '{}'. Valid scopes: compile, runtime, test, provided",
                other
            ))),
        }
    }
}

/// A declared dependency edge: identity plus requested version and modifiers.
///
/// `version` is `None` when the declaration relies on managed versions
/// (dependencyManagement); the resolver fills it in or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub identity: Identity,
    pub version: Option<String>,
    pub scope: Scope,
    pub optional: bool,
    pub classifier: Option<String>,
    pub exclusions: BTreeSet<Identity>,
}

impl Dependency {
    pub fn new(identity: Identity, version: impl Into<String>) -> Self {
        Self {
            identity,
            version: Some(version.into()),
            scope: Scope::Compile,
            optional: false,
            classifier: None,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn unversioned(identity: Identity) -> Self {
        Self {
            identity,
            version: None,
            scope: Scope::Compile,
            optional: false,
            classifier: None,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_exclusions(mut self, exclusions: impl IntoIterator<Item = Identity>) -> Self {
        self.exclusions = exclusions.into_iter().collect();
        self
    }

    /// The full coordinate, once a version is known.
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.version.as_ref().map(|v| self.identity.at(v))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}", self.identity, v),
            None => write!(f, "{}", self.identity),
        }
    }
}

/// Total order over version strings.
///
/// Semver comparison when both sides parse as semver. Otherwise segments are
/// split on `.` and `-` and compared pairwise:
///
/// - numeric vs numeric: numeric comparison
/// - textual vs textual: byte comparison
/// - numeric vs textual: numeric wins (`1.2.0` > `1.2.rc`)
/// - one side exhausted: a remaining numeric segment makes that side greater
///   (`1.2.1` > `1.2`); a remaining textual segment makes it smaller
///   (`1.2` > `1.2-rc1`)
///
/// The order is deliberately simple rather than Maven-complete; what matters
/// for reproducibility is that it is total and applied everywhere.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Ok(sa), Ok(sb)) = (semver::Version::parse(a), semver::Version::parse(b)) {
        return sa.cmp(&sb);
    }

    let split = |s: &str| -> Vec<String> {
        s.split(['.', '-'])
            .map(|seg| seg.to_string())
            .collect()
    };
    let sa = split(a);
    let sb = split(b);

    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let num_cmp = |x: &str, y: &str| {
        let x = x.trim_start_matches('0');
        let y = y.trim_start_matches('0');
        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
    };

    let mut ia = sa.iter();
    let mut ib = sb.iter();
    loop {
        match (ia.next(), ib.next()) {
            (Some(x), Some(y)) => {
                let ord = match (numeric(x), numeric(y)) {
                    (true, true) => num_cmp(x, y),
                    (false, false) => x.cmp(y),
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), None) => {
                // trailing ".0" segments are equal
                if numeric(x) && x.trim_start_matches('0').is_empty() {
                    continue;
                }
                return if numeric(x) { Ordering::Greater } else { Ordering::Less };
            }
            (None, Some(y)) => {
                if numeric(y) && y.trim_start_matches('0').is_empty() {
                    continue;
                }
                return if numeric(y) { Ordering::Less } else { Ordering::Greater };
            }
            (None, None) => return Ordering::Equal,
        }
    }
}
