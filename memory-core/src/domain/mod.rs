//! Domain configuration loader (spec §4.8).
//!
//! `SemanticMemory` stores [`crate::types::KnowledgeDocument`] facets as
//! an open `serde_json::Value` bag so the core crate never needs to
//! know what fields a given deployment cares about. A domain config is
//! how an operator describes those fields to the ranking layer without
//! a redeploy: which facets exist, how they should be matched
//! (exact/hierarchical/categorical), and how much each match should
//! boost a document's rank. Absent a configured domain, `query_memory`
//! falls back to plain text+tag search with no facet boosting.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How a facet's value on a candidate document should be compared
/// against the query's facet filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Values must be byte-for-byte equal.
    Exact,
    /// The document's value must be equal to, or a descendant of (by
    /// `/`-separated path prefix), the query's value — e.g. a document
    /// facet `"infra/networking/dns"` matches a query for `"infra"`.
    Hierarchical,
    /// The document's value must appear in a fixed enumeration the
    /// query selects a subset from.
    Categorical,
}

/// Describes one ranking-relevant facet field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetField {
    pub name: String,
    pub match_kind: MatchKind,
    /// Multiplier applied to a document's composite score when this
    /// facet matches the query (spec §4.8).
    pub boost: f32,
}

/// One domain's full schema descriptor, as loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub domain: String,
    #[serde(default)]
    pub facets: Vec<FacetField>,
}

impl DomainConfig {
    /// Load a single domain config from a YAML file.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the file cannot be read or
    /// does not parse as a valid domain descriptor.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| Error::Configuration(format!("failed to read domain config {}: {err}", path.display())))?;
        Self::load_from_str(&contents)
    }

    /// Parse a domain config from a YAML string.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the YAML does not match the
    /// expected schema.
    pub fn load_from_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|err| Error::Configuration(format!("invalid domain config: {err}")))
    }

    /// The boost multiplier a candidate document's facet set should
    /// receive against a query's facet filter, computed as the product
    /// of every configured facet's boost that the candidate satisfies.
    /// Unconfigured facets, or facets absent from either side, neither
    /// help nor hurt the score.
    #[must_use]
    pub fn score_boost(&self, query_facets: &HashMap<String, serde_json::Value>, document_facets: &serde_json::Value) -> f32 {
        let mut boost = 1.0;
        for field in &self.facets {
            let Some(query_value) = query_facets.get(&field.name) else { continue };
            let Some(document_value) = document_facets.get(&field.name) else { continue };
            if facet_matches(field.match_kind, query_value, document_value) {
                boost *= field.boost;
            }
        }
        boost
    }
}

fn facet_matches(kind: MatchKind, query_value: &serde_json::Value, document_value: &serde_json::Value) -> bool {
    match kind {
        MatchKind::Exact | MatchKind::Categorical => query_value == document_value,
        MatchKind::Hierarchical => match (query_value.as_str(), document_value.as_str()) {
            (Some(query), Some(document)) => document == query || document.starts_with(&format!("{query}/")),
            _ => false,
        },
    }
}

/// Registry of loaded domain configs, keyed by domain name. The
/// unified surface holds one of these and falls back to unboosted
/// text+tag search for any domain (including `None`) with no entry.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: HashMap<String, DomainConfig>,
}

impl DomainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml`/`*.yml` file in `dir` as a domain config.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the directory cannot be read
    /// or any file in it fails to parse.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|err| Error::Configuration(format!("failed to read domain config dir {}: {err}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| Error::Configuration(err.to_string()))?;
            let path = entry.path();
            let is_yaml = path.extension().and_then(|e| e.to_str()).is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml {
                let config = DomainConfig::load_from_path(&path)?;
                registry.insert(config);
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, config: DomainConfig) {
        self.domains.insert(config.domain.clone(), config);
    }

    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&DomainConfig> {
        self.domains.get(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
domain: incident_response
facets:
  - name: severity
    match_kind: categorical
    boost: 1.5
  - name: service_path
    match_kind: hierarchical
    boost: 1.2
"#;

    #[test]
    fn loads_facet_fields_from_yaml() {
        let config = DomainConfig::load_from_str(SAMPLE).unwrap();
        assert_eq!(config.domain, "incident_response");
        assert_eq!(config.facets.len(), 2);
    }

    #[test]
    fn hierarchical_match_accepts_descendant_paths() {
        let config = DomainConfig::load_from_str(SAMPLE).unwrap();
        let mut query = HashMap::new();
        query.insert("service_path".to_string(), serde_json::json!("infra"));
        let document = serde_json::json!({"service_path": "infra/networking/dns"});
        assert!(config.score_boost(&query, &document) > 1.0);
    }

    #[test]
    fn missing_facet_on_either_side_does_not_boost() {
        let config = DomainConfig::load_from_str(SAMPLE).unwrap();
        let query = HashMap::new();
        let document = serde_json::json!({"severity": "critical"});
        assert_eq!(config.score_boost(&query, &document), 1.0);
    }

    #[test]
    fn registry_returns_none_for_unconfigured_domain() {
        let registry = DomainRegistry::new();
        assert!(registry.get("unknown").is_none());
    }
}
