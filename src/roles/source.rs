use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::rules::RoleRule;
use super::Role;

pub const DEFAULT_RULES_JSON: &str = include_str!("../../rules/default_role_rules.json");

const DEFAULT_PRIORITY: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Builtin,
    File(PathBuf),
}

impl RuleSource {
    pub fn from_optional_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(path),
            None => Self::Builtin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    rules: Vec<RuleRecord>,
}

#[derive(Debug, Deserialize)]
struct RuleRecord {
    role: String,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default, alias = "label_patterns")]
    name_regex: Vec<String>,
    #[serde(default, alias = "required_tags")]
    tags_all: Vec<String>,
    #[serde(default, alias = "any_of_tags")]
    tags_any: Vec<String>,
    #[serde(default)]
    exclude_patterns: Vec<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// Ordered, immutable rule list. Ties on priority go to the earlier rule.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<RoleRule>,
    version: Option<u32>,
}

impl RuleSet {
    pub fn new(rules: Vec<RoleRule>) -> Self {
        Self {
            rules,
            version: None,
        }
    }

    /// Parses a rule document. Any invalid record rejects the whole document.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let file: RuleFile =
            serde_json::from_str(raw).map_err(|err| format!("malformed rule document: {err}"))?;
        let mut rules = Vec::with_capacity(file.rules.len());
        for (idx, record) in file.rules.into_iter().enumerate() {
            let role: Role = record
                .role
                .parse()
                .map_err(|err| format!("rule #{idx}: {err}"))?;
            let rule = RoleRule::new(
                role,
                record.priority,
                &record.tags_all,
                &record.tags_any,
                &record.name_regex,
                &record.exclude_patterns,
            )
            .map_err(|err| format!("rule #{idx} ({role}): {err}"))?;
            rules.push(rule);
        }
        Ok(Self {
            rules,
            version: file.version,
        })
    }

    pub fn builtin() -> Self {
        match Self::from_json(DEFAULT_RULES_JSON) {
            Ok(rules) => rules,
            Err(err) => {
                tracing::error!(error = %err, "invalid built-in role rules; no roles will resolve");
                Self::new(Vec::new())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Never fails: a missing or malformed source falls back to the built-in set.
    pub fn load(source: &RuleSource) -> Self {
        match source {
            RuleSource::Builtin => {
                let rules = Self::builtin();
                tracing::info!(count = rules.len(), "loaded built-in role rules");
                rules
            }
            RuleSource::File(path) if !path.exists() => {
                tracing::warn!(
                    path = %path.display(),
                    "no role rule file; using built-in defaults"
                );
                Self::builtin()
            }
            RuleSource::File(path) => match Self::from_file(path) {
                Ok(rules) => {
                    tracing::info!(
                        path = %path.display(),
                        count = rules.len(),
                        version = ?rules.version,
                        "loaded role rules"
                    );
                    rules
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to load role rules; using built-in defaults"
                    );
                    Self::builtin()
                }
            },
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn rules(&self) -> &[RoleRule] {
        &self.rules
    }

    pub fn infer_role(&self, label: &str, tags: &BTreeSet<String>) -> Option<Role> {
        let mut best: Option<&RoleRule> = None;
        for rule in &self.rules {
            if !rule.matches(label, tags) {
                continue;
            }
            if best.map_or(true, |current| rule.priority < current.priority) {
                best = Some(rule);
            }
        }
        best.map(|rule| rule.role)
    }
}
