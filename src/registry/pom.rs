//! Minimal POM and maven-metadata extraction
//!
//! Pulls out exactly what resolution needs: coordinates, parent, direct
//! dependencies, the dependencyManagement table and simple `${...}` property
//! interpolation. This is a field extractor over the well-formed POMs
//! repositories actually serve, not a general XML parser.

use crate::error::{JavelinError, JavelinResult};
use crate::model::{Coordinate, Dependency, Identity, Scope};
use std::collections::BTreeMap;
use tracing::debug;

/// Parsed subset of a POM
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group: Option<String>,
    pub artifact: Option<String>,
    pub version: Option<String>,
    pub parent: Option<Coordinate>,
    pub dependencies: Vec<Dependency>,
    pub managed: BTreeMap<Identity, String>,
}

impl Pom {
    /// Effective group, falling back to the parent's.
    pub fn effective_group(&self) -> Option<&str> {
        self.group
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.group.as_str()))
    }

    /// Effective version, falling back to the parent's.
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.version.as_str()))
    }
}

/// Parse the POM subset for `coordinate` (used for error context and the
/// `${project.*}` interpolation defaults).
pub fn parse_pom(xml: &str, coordinate: &Coordinate) -> JavelinResult<Pom> {
    let invalid = |reason: String| JavelinError::MetadataInvalid {
        coordinate: coordinate.to_string(),
        reason,
    };

    let cleaned = strip_comments(xml);
    let mut body = match find_section(&cleaned, "project") {
        Some(inner) => inner.to_string(),
        None => return Err(invalid("no <project> element".to_string())),
    };

    // Sections that can carry their own nested groupId/version tags
    for tag in ["build", "profiles", "reporting"] {
        remove_section(&mut body, tag);
    }

    let parent_xml = remove_section(&mut body, "parent");
    let dep_mgmt_xml = remove_section(&mut body, "dependencyManagement");
    let deps_xml = remove_section(&mut body, "dependencies");
    let props_xml = remove_section(&mut body, "properties");

    let parent = parent_xml.as_deref().and_then(|p| {
        match (
            tag_value(p, "groupId"),
            tag_value(p, "artifactId"),
            tag_value(p, "version"),
        ) {
            (Some(g), Some(a), Some(v)) => Some(Coordinate::new(g, a, v)),
            _ => None,
        }
    });

    let group = tag_value(&body, "groupId");
    let artifact = tag_value(&body, "artifactId");
    let version = tag_value(&body, "version");

    let mut properties = props_xml
        .as_deref()
        .map(parse_properties)
        .unwrap_or_default();
    let effective_group = group
        .clone()
        .or_else(|| parent.as_ref().map(|p| p.group.clone()))
        .unwrap_or_else(|| coordinate.group.clone());
    let effective_version = version
        .clone()
        .or_else(|| parent.as_ref().map(|p| p.version.clone()))
        .unwrap_or_else(|| coordinate.version.clone());
    for key in ["project.groupId", "pom.groupId"] {
        properties.insert(key.to_string(), effective_group.clone());
    }
    for key in ["project.version", "pom.version"] {
        properties.insert(key.to_string(), effective_version.clone());
    }
    properties.insert(
        "project.artifactId".to_string(),
        artifact.clone().unwrap_or_else(|| coordinate.artifact.clone()),
    );

    let dependencies = deps_xml
        .as_deref()
        .map(|d| parse_dependencies(d, &properties))
        .unwrap_or_default();

    let managed = dep_mgmt_xml
        .as_deref()
        .and_then(|m| find_section(m, "dependencies").map(str::to_string))
        .map(|d| parse_managed(&d, &properties))
        .unwrap_or_default();

    Ok(Pom {
        group,
        artifact,
        version,
        parent,
        dependencies,
        managed,
    })
}

/// Parse the `<versions>` list of a maven-metadata.xml, in document order.
pub fn parse_versions(xml: &str) -> Vec<String> {
    let cleaned = strip_comments(xml);
    match find_section(&cleaned, "versions") {
        Some(inner) => tag_values(inner, "version"),
        None => Vec::new(),
    }
}

fn parse_dependencies(xml: &str, properties: &BTreeMap<String, String>) -> Vec<Dependency> {
    tag_blocks(xml, "dependency")
        .into_iter()
        .filter_map(|block| parse_dependency(&block, properties))
        .collect()
}

fn parse_dependency(block: &str, properties: &BTreeMap<String, String>) -> Option<Dependency> {
    let mut block = block.to_string();
    let exclusions_xml = remove_section(&mut block, "exclusions");

    let group = interpolate(&tag_value(&block, "groupId")?, properties)?;
    let artifact = interpolate(&tag_value(&block, "artifactId")?, properties)?;
    let identity = Identity::new(group, artifact);

    // Unversioned declarations lean on managed versions; an uninterpolatable
    // version is treated the same way
    let version = tag_value(&block, "version").and_then(|v| interpolate(&v, properties));

    let scope = match tag_value(&block, "scope").as_deref() {
        None => Scope::Compile,
        Some(s) => match s.parse::<Scope>() {
            Ok(scope) => scope,
            Err(_) => {
                debug!("Skipping dependency {} with unsupported scope {}", identity, s);
                return None;
            }
        },
    };

    let optional = tag_value(&block, "optional").as_deref() == Some("true");

    let exclusions = exclusions_xml
        .as_deref()
        .map(|x| {
            tag_blocks(x, "exclusion")
                .into_iter()
                .filter_map(|e| {
                    match (tag_value(&e, "groupId"), tag_value(&e, "artifactId")) {
                        (Some(g), Some(a)) => Some(Identity::new(g, a)),
                        _ => None,
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut dep = Dependency {
        identity,
        version,
        scope,
        optional,
        classifier: tag_value(&block, "classifier"),
        exclusions: exclusions.into_iter().collect(),
    };
    if let Some(c) = &dep.classifier {
        if c.is_empty() {
            dep.classifier = None;
        }
    }
    Some(dep)
}

fn parse_managed(xml: &str, properties: &BTreeMap<String, String>) -> BTreeMap<Identity, String> {
    let mut managed = BTreeMap::new();
    for block in tag_blocks(xml, "dependency") {
        // BOM imports (scope=import) are out of scope for the managed table
        if tag_value(&block, "scope").as_deref() == Some("import") {
            continue;
        }
        let (group, artifact, version) = match (
            tag_value(&block, "groupId").and_then(|v| interpolate(&v, properties)),
            tag_value(&block, "artifactId").and_then(|v| interpolate(&v, properties)),
            tag_value(&block, "version").and_then(|v| interpolate(&v, properties)),
        ) {
            (Some(g), Some(a), Some(v)) => (g, a, v),
            _ => continue,
        };
        managed.insert(Identity::new(group, artifact), version);
    }
    managed
}

fn parse_properties(xml: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        if after.starts_with('/') || after.starts_with('!') || after.starts_with('?') {
            rest = &rest[open + 1..];
            continue;
        }
        let Some(name_end) = after.find('>') else { break };
        let name = after[..name_end].trim();
        if name.is_empty() || name.contains(' ') || name.ends_with('/') {
            rest = &after[name_end + 1..];
            continue;
        }
        let value_start = &after[name_end + 1..];
        let close = format!("</{}>", name);
        let Some(close_at) = value_start.find(&close) else {
            rest = value_start;
            continue;
        };
        props.insert(
            name.to_string(),
            value_start[..close_at].trim().to_string(),
        );
        rest = &value_start[close_at + close.len()..];
    }
    props
}

/// Substitute `${key}` references. Returns `None` if unresolved references
/// remain after a few passes.
fn interpolate(value: &str, properties: &BTreeMap<String, String>) -> Option<String> {
    let mut current = value.trim().to_string();
    for _ in 0..5 {
        if !current.contains("${") {
            return Some(current);
        }
        let mut next = String::with_capacity(current.len());
        let mut rest = current.as_str();
        let mut changed = false;
        while let Some(start) = rest.find("${") {
            next.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match properties.get(key) {
                        Some(replacement) => {
                            next.push_str(replacement);
                            changed = true;
                        }
                        None => {
                            next.push_str("${");
                            next.push_str(key);
                            next.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    next.push_str(rest);
                    rest = "";
                }
            }
        }
        next.push_str(rest);
        if !changed {
            return None;
        }
        current = next;
    }
    (!current.contains("${")).then_some(current)
}

fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Byte span of the first `<tag ...>...</tag>` occurrence:
/// (open_start, inner_start, inner_end, close_end).
fn locate(s: &str, tag: &str) -> Option<(usize, usize, usize, usize)> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut from = 0;
    loop {
        let start = s[from..].find(&open)? + from;
        let after_name = start + open.len();
        // reject prefix matches like <versions> for tag "version"
        let inner_start = match s.as_bytes().get(after_name).copied() {
            Some(b'>') => after_name + 1,
            Some(b' ') | Some(b'\n') | Some(b'\t') | Some(b'\r') => {
                s[after_name..].find('>')? + after_name + 1
            }
            _ => {
                from = after_name;
                continue;
            }
        };
        let inner_end = s[inner_start..].find(&close)? + inner_start;
        return Some((start, inner_start, inner_end, inner_end + close.len()));
    }
}

/// Inner text of the first `<tag ...>...</tag>` occurrence.
fn find_section<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    let (_, inner_start, inner_end, _) = locate(s, tag)?;
    Some(&s[inner_start..inner_end])
}

/// Remove the first `<tag>...</tag>` occurrence, returning its inner text.
fn remove_section(s: &mut String, tag: &str) -> Option<String> {
    let (start, inner_start, inner_end, end) = locate(s, tag)?;
    let inner = s[inner_start..inner_end].to_string();
    s.replace_range(start..end, "");
    Some(inner)
}

/// First `<tag>value</tag>` scalar, trimmed.
fn tag_value(s: &str, tag: &str) -> Option<String> {
    find_section(s, tag).map(|v| v.trim().to_string())
}

/// All `<tag>value</tag>` scalars, in document order.
fn tag_values(s: &str, tag: &str) -> Vec<String> {
    tag_blocks(s, tag)
        .into_iter()
        .map(|v| v.trim().to_string())
        .collect()
}

/// All non-overlapping `<tag>...</tag>` inner texts, in document order.
fn tag_blocks(s: &str, tag: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = s;
    while let Some((_, inner_start, inner_end, end)) = locate(rest, tag) {
        blocks.push(rest[inner_start..inner_end].to_string());
        rest = &rest[end..];
    }
    blocks
}
