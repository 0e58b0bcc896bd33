//! Optional skills store (spec §4.9).
//!
//! A skill is an on-disk markdown file with YAML frontmatter declaring
//! a name, a description, and the set of tools it is allowed to
//! invoke. This is a policy layer, not a capability: the store only
//! loads and validates manifests and answers "is this tool allowed for
//! this skill", it does not execute anything. Agents that want to
//! gate tool access by skill consult [`SkillStore::is_tool_allowed`]
//! before dispatching a call.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One skill's parsed manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub allowed_tools: HashSet<String>,
    /// The markdown body following the frontmatter, e.g. instructions
    /// for an agent invoking this skill.
    #[serde(skip)]
    pub body: String,
}

const FRONTMATTER_DELIMITER: &str = "---";

impl SkillManifest {
    /// Parse a skill manifest from the contents of a `<skill>.md` file:
    /// a `---`-delimited YAML frontmatter block followed by a markdown
    /// body.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the frontmatter delimiters
    /// are missing or the YAML block does not parse.
    pub fn parse(contents: &str) -> Result<Self> {
        let trimmed = contents.trim_start();
        let rest = trimmed
            .strip_prefix(FRONTMATTER_DELIMITER)
            .ok_or_else(|| Error::Configuration("skill manifest missing opening frontmatter delimiter".to_string()))?;
        let end = rest
            .find(FRONTMATTER_DELIMITER)
            .ok_or_else(|| Error::Configuration("skill manifest missing closing frontmatter delimiter".to_string()))?;
        let (frontmatter, body) = rest.split_at(end);
        let body = body[FRONTMATTER_DELIMITER.len()..].trim_start().to_string();

        let mut manifest: SkillManifest = serde_yaml::from_str(frontmatter)
            .map_err(|err| Error::Configuration(format!("invalid skill frontmatter: {err}")))?;
        manifest.body = body;
        Ok(manifest)
    }

    #[must_use]
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.allowed_tools.contains(tool)
    }
}

/// In-memory registry of every loaded skill, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SkillStore {
    skills: HashMap<String, SkillManifest>,
}

impl SkillStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.md` file in `dir` as a skill manifest. A file that
    /// fails to parse is skipped with a warning rather than aborting
    /// the whole load, so one malformed skill cannot take down every
    /// other skill.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] only if `dir` itself cannot be
    /// read.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut store = Self::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|err| Error::Configuration(format!("failed to read skills dir {}: {err}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| Error::Configuration(err.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match SkillManifest::parse(&contents) {
                    Ok(manifest) => store.insert(manifest),
                    Err(err) => tracing::warn!(%err, path = %path.display(), "skipping malformed skill manifest"),
                },
                Err(err) => tracing::warn!(%err, path = %path.display(), "failed to read skill manifest"),
            }
        }
        Ok(store)
    }

    pub fn insert(&mut self, manifest: SkillManifest) {
        self.skills.insert(manifest.name.clone(), manifest);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SkillManifest> {
        self.skills.get(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    /// Whether `skill` is known and permits `tool`. Unknown skills are
    /// treated as denying everything rather than allowing everything —
    /// a missing manifest is a misconfiguration, not an open policy.
    #[must_use]
    pub fn is_tool_allowed(&self, skill: &str, tool: &str) -> bool {
        self.skills.get(skill).is_some_and(|manifest| manifest.allows_tool(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"---
name: deploy-review
description: Reviews a deploy plan before rollout.
allowed_tools:
  - read_file
  - run_tests
---
Check the rollout plan for missing health checks.
"#;

    #[test]
    fn parses_frontmatter_and_body() {
        let manifest = SkillManifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.name, "deploy-review");
        assert!(manifest.allows_tool("read_file"));
        assert!(!manifest.allows_tool("delete_branch"));
        assert!(manifest.body.starts_with("Check the rollout plan"));
    }

    #[test]
    fn rejects_manifest_missing_frontmatter() {
        assert!(SkillManifest::parse("just markdown, no frontmatter").is_err());
    }

    #[test]
    fn unknown_skill_denies_every_tool() {
        let store = SkillStore::new();
        assert!(!store.is_tool_allowed("nonexistent", "read_file"));
    }

    #[test]
    fn store_enforces_known_skills_allowed_tools() {
        let mut store = SkillStore::new();
        store.insert(SkillManifest::parse(SAMPLE).unwrap());
        assert!(store.is_tool_allowed("deploy-review", "run_tests"));
        assert!(!store.is_tool_allowed("deploy-review", "force_push"));
    }
}
