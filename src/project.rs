//! Project manifest (javelin.toml)
//!
//! Declared dependencies are grouped by scope section and map a
//! `"group:artifact"` key to either a bare version string or a detailed
//! table. Edits go through `toml_edit` so user formatting and comments
//! survive `add`/`remove`/`update`.

use crate::error::{JavelinError, JavelinResult};
use crate::model::{Dependency, Identity, Scope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use toml_edit::{value, DocumentMut, Item, Table};
use tracing::debug;

/// Manifest file name looked up in the project directory
pub const MANIFEST_NAME: &str = "javelin.toml";

/// A named remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    project: ProjectSection,
    #[serde(default)]
    repositories: BTreeMap<String, String>,
    #[serde(default, rename = "dependencies")]
    compile: BTreeMap<String, DependencySpec>,
    #[serde(default, rename = "runtime-dependencies")]
    runtime: BTreeMap<String, DependencySpec>,
    #[serde(default, rename = "test-dependencies")]
    test: BTreeMap<String, DependencySpec>,
    #[serde(default, rename = "provided-dependencies")]
    provided: BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Deserialize)]
struct ProjectSection {
    name: String,
    #[allow(dead_code)]
    #[serde(default)]
    version: Option<String>,
}

/// Either `"1.2.3"` or `{ version = "1.2.3", optional = true, ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependencySpec {
    Version(String),
    Detailed {
        version: String,
        #[serde(default)]
        classifier: Option<String>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        exclusions: Vec<String>,
    },
}

/// A loaded project manifest
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    doc: DocumentMut,
    parsed: ManifestDoc,
}

fn section_name(scope: Scope) -> &'static str {
    match scope {
        Scope::Compile => "dependencies",
        Scope::Runtime => "runtime-dependencies",
        Scope::Test => "test-dependencies",
        Scope::Provided => "provided-dependencies",
    }
}

const ALL_SECTIONS: [Scope; 4] = [Scope::Compile, Scope::Runtime, Scope::Test, Scope::Provided];

impl Manifest {
    /// Load the manifest from an explicit file path.
    pub async fn load(path: &Path) -> JavelinResult<Self> {
        if !path.exists() {
            let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            return Err(JavelinError::ManifestNotFound(dir));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| JavelinError::io(format!("reading manifest {}", path.display()), e))?;

        Self::parse(path.to_path_buf(), &content)
    }

    /// Load `javelin.toml` from a project directory.
    pub async fn load_dir(dir: &Path) -> JavelinResult<Self> {
        Self::load(&dir.join(MANIFEST_NAME)).await
    }

    fn parse(path: PathBuf, content: &str) -> JavelinResult<Self> {
        let parsed: ManifestDoc =
            toml::from_str(content).map_err(|e| JavelinError::ManifestInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let doc: DocumentMut = content
            .parse()
            .map_err(|e: toml_edit::TomlError| JavelinError::ManifestInvalid {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!("Loaded manifest {}", path.display());
        Ok(Self { path, doc, parsed })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project_name(&self) -> &str {
        &self.parsed.project.name
    }

    /// The directory the manifest lives in.
    pub fn project_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory artifacts are materialized into.
    pub fn lib_dir(&self) -> PathBuf {
        self.project_dir().join("lib")
    }

    /// Repositories declared in the manifest, in name order.
    pub fn repositories(&self) -> Vec<Repository> {
        self.parsed
            .repositories
            .iter()
            .map(|(name, url)| Repository {
                name: name.clone(),
                url: url.clone(),
            })
            .collect()
    }

    /// All declared dependencies across the four scope sections.
    ///
    /// Deterministic order: scope sections in fixed order, identities sorted
    /// within each section.
    pub fn declared_dependencies(&self) -> JavelinResult<Vec<Dependency>> {
        let mut deps = Vec::new();
        for scope in ALL_SECTIONS {
            let section = match scope {
                Scope::Compile => &self.parsed.compile,
                Scope::Runtime => &self.parsed.runtime,
                Scope::Test => &self.parsed.test,
                Scope::Provided => &self.parsed.provided,
            };
            for (key, spec) in section {
                deps.push(self.build_dependency(key, spec, scope)?);
            }
        }
        Ok(deps)
    }

    fn build_dependency(
        &self,
        key: &str,
        spec: &DependencySpec,
        scope: Scope,
    ) -> JavelinResult<Dependency> {
        let identity: Identity = key.parse()?;
        let dep = match spec {
            DependencySpec::Version(v) => Dependency::new(identity, v).with_scope(scope),
            DependencySpec::Detailed {
                version,
                classifier,
                optional,
                exclusions,
            } => {
                let exclusions = exclusions
                    .iter()
                    .map(|s| s.parse::<Identity>())
                    .collect::<JavelinResult<Vec<_>>>()?;
                let mut dep = Dependency::new(identity, version)
                    .with_scope(scope)
                    .with_optional(*optional)
                    .with_exclusions(exclusions);
                if let Some(c) = classifier {
                    dep = dep.with_classifier(c);
                }
                dep
            }
        };
        Ok(dep)
    }

    /// Find the scope section a dependency is declared in, if any.
    pub fn scope_of(&self, identity: &Identity) -> Option<Scope> {
        let key = identity.to_string();
        for scope in ALL_SECTIONS {
            if self
                .doc
                .get(section_name(scope))
                .and_then(Item::as_table)
                .map(|t| t.contains_key(&key))
                .unwrap_or(false)
            {
                return Some(scope);
            }
        }
        None
    }

    /// Declare a new dependency. Fails if the identity is already declared
    /// in any scope section.
    pub fn add_dependency(
        &mut self,
        identity: &Identity,
        version: &str,
        scope: Scope,
        optional: bool,
    ) -> JavelinResult<()> {
        if self.scope_of(identity).is_some() {
            return Err(JavelinError::DependencyExists(identity.to_string()));
        }

        let section = self
            .doc
            .entry(section_name(scope))
            .or_insert(Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| JavelinError::ManifestInvalid {
                path: self.path.clone(),
                reason: format!("[{}] is not a table", section_name(scope)),
            })?;

        let key = identity.to_string();
        if optional {
            let mut inline = toml_edit::InlineTable::new();
            inline.insert("version", version.into());
            inline.insert("optional", true.into());
            section.insert(&key, value(inline));
        } else {
            section.insert(&key, value(version));
        }

        self.reparse()
    }

    /// Remove a declared dependency from whichever section holds it.
    pub fn remove_dependency(&mut self, identity: &Identity) -> JavelinResult<Scope> {
        let scope = self
            .scope_of(identity)
            .ok_or_else(|| JavelinError::DependencyNotDeclared(identity.to_string()))?;

        let key = identity.to_string();
        if let Some(table) = self
            .doc
            .get_mut(section_name(scope))
            .and_then(Item::as_table_mut)
        {
            table.remove(&key);
        }

        self.reparse()?;
        Ok(scope)
    }

    /// Change the pinned version of an already-declared dependency,
    /// preserving any detailed-table fields.
    pub fn set_version(&mut self, identity: &Identity, version: &str) -> JavelinResult<()> {
        let scope = self
            .scope_of(identity)
            .ok_or_else(|| JavelinError::DependencyNotDeclared(identity.to_string()))?;

        let key = identity.to_string();
        let table = self
            .doc
            .get_mut(section_name(scope))
            .and_then(Item::as_table_mut)
            .expect("section exists: scope_of found it");

        let entry = table.get_mut(&key).expect("key exists: scope_of found it");
        if let Some(t) = entry.as_table_like_mut() {
            t.insert("version", value(version));
        } else {
            *entry = value(version);
        }

        self.reparse()
    }

    // toml_edit mutations and the serde view must stay in sync
    fn reparse(&mut self) -> JavelinResult<()> {
        let content = self.doc.to_string();
        self.parsed =
            toml::from_str(&content).map_err(|e| JavelinError::ManifestInvalid {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Write the manifest back to disk, formatting preserved.
    pub async fn save(&self) -> JavelinResult<()> {
        fs::write(&self.path, self.doc.to_string())
            .await
            .map_err(|e| JavelinError::io(format!("writing manifest {}", self.path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[project]
name = "demo-app"
version = "1.0.0"

[repositories]
central = "https://repo1.maven.org/maven2/"

[dependencies]
"org.slf4j:slf4j-api" = "2.0.13"
"com.google.guava:guava" = { version = "33.0.0-jre", exclusions = ["com.google.code.findbugs:jsr305"] }

[test-dependencies]
"junit:junit" = "4.13.2"
"#;

    fn sample() -> Manifest {
        Manifest::parse(PathBuf::from("/tmp/javelin.toml"), SAMPLE).unwrap()
    }

    #[test]
    fn declared_dependencies_cover_all_sections() {
        let deps = sample().declared_dependencies().unwrap();
        assert_eq!(deps.len(), 3);

        let junit = deps
            .iter()
            .find(|d| d.identity.artifact == "junit")
            .unwrap();
        assert_eq!(junit.scope, Scope::Test);
        assert_eq!(junit.version.as_deref(), Some("4.13.2"));
    }

    #[test]
    fn detailed_spec_parses_exclusions() {
        let deps = sample().declared_dependencies().unwrap();
        let guava = deps
            .iter()
            .find(|d| d.identity.artifact == "guava")
            .unwrap();
        assert_eq!(guava.version.as_deref(), Some("33.0.0-jre"));
        assert!(guava
            .exclusions
            .contains(&Identity::new("com.google.code.findbugs", "jsr305")));
    }

    #[test]
    fn repositories_in_name_order() {
        let repos = sample().repositories();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "central");
        assert_eq!(repos[0].url, "https://repo1.maven.org/maven2/");
    }

    #[test]
    fn add_dependency_new_section() {
        let mut m = sample();
        let id = Identity::new("org.postgresql", "postgresql");
        m.add_dependency(&id, "42.7.3", Scope::Runtime, false).unwrap();

        assert_eq!(m.scope_of(&id), Some(Scope::Runtime));
        let deps = m.declared_dependencies().unwrap();
        assert!(deps.iter().any(|d| d.identity == id && d.scope == Scope::Runtime));
        // original formatting intact
        assert!(m.doc.to_string().contains("\"org.slf4j:slf4j-api\" = \"2.0.13\""));
    }

    #[test]
    fn add_duplicate_rejected() {
        let mut m = sample();
        let id = Identity::new("junit", "junit");
        let err = m.add_dependency(&id, "5.0.0", Scope::Compile, false).unwrap_err();
        assert!(matches!(err, JavelinError::DependencyExists(_)));
    }

    #[test]
    fn remove_dependency_from_its_section() {
        let mut m = sample();
        let id = Identity::new("junit", "junit");
        let scope = m.remove_dependency(&id).unwrap();
        assert_eq!(scope, Scope::Test);
        assert_eq!(m.scope_of(&id), None);
    }

    #[test]
    fn remove_missing_rejected() {
        let mut m = sample();
        let err = m
            .remove_dependency(&Identity::new("no.such", "artifact"))
            .unwrap_err();
        assert!(matches!(err, JavelinError::DependencyNotDeclared(_)));
    }

    #[test]
    fn set_version_plain_and_detailed() {
        let mut m = sample();
        m.set_version(&Identity::new("junit", "junit"), "4.13.9").unwrap();
        m.set_version(&Identity::new("com.google.guava", "guava"), "33.1.0-jre")
            .unwrap();

        let deps = m.declared_dependencies().unwrap();
        let junit = deps.iter().find(|d| d.identity.artifact == "junit").unwrap();
        assert_eq!(junit.version.as_deref(), Some("4.13.9"));

        let guava = deps.iter().find(|d| d.identity.artifact == "guava").unwrap();
        assert_eq!(guava.version.as_deref(), Some("33.1.0-jre"));
        // exclusions preserved through the version bump
        assert!(!guava.exclusions.is_empty());
    }

    #[test]
    fn malformed_key_rejected() {
        let bad = r#"
[project]
name = "x"

[dependencies]
"not-a-coordinate" = "1.0"
"#;
        let m = Manifest::parse(PathBuf::from("/tmp/javelin.toml"), bad).unwrap();
        assert!(m.declared_dependencies().is_err());
    }

    #[tokio::test]
    async fn load_missing_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Manifest::load_dir(dir.path()).await.unwrap_err();
        assert!(matches!(err, JavelinError::ManifestNotFound(_)));
    }

    #[tokio::test]
    async fn save_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_NAME);
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let mut m = Manifest::load(&path).await.unwrap();
        m.add_dependency(&Identity::new("org.assertj", "assertj-core"), "3.25.3", Scope::Test, false)
            .unwrap();
        m.save().await.unwrap();

        let reloaded = Manifest::load(&path).await.unwrap();
        assert_eq!(
            reloaded.scope_of(&Identity::new("org.assertj", "assertj-core")),
            Some(Scope::Test)
        );
    }
}
