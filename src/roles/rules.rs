use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

use super::{tag_key, Role};
use crate::naming::decode;

#[derive(Debug, Clone)]
pub struct RoleRule {
    pub role: Role,
    /// Lower wins.
    pub priority: i32,
    pub required_tags: BTreeSet<String>,
    pub any_of_tags: BTreeSet<String>,
    pub label_patterns: Vec<Regex>,
    pub exclude_patterns: Vec<Regex>,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, String> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|err| format!("invalid pattern {pattern:?}: {err}"))
        })
        .collect()
}

impl RoleRule {
    pub fn new(
        role: Role,
        priority: i32,
        required_tags: &[String],
        any_of_tags: &[String],
        label_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, String> {
        Ok(Self {
            role,
            priority,
            required_tags: required_tags.iter().filter_map(|t| tag_key(t)).collect(),
            any_of_tags: any_of_tags.iter().filter_map(|t| tag_key(t)).collect(),
            label_patterns: compile_patterns(label_patterns)?,
            exclude_patterns: compile_patterns(exclude_patterns)?,
        })
    }

    /// `tags` must already be normalized with [`tag_key`].
    pub fn matches(&self, label: &str, tags: &BTreeSet<String>) -> bool {
        if !self.required_tags.is_subset(tags) {
            return false;
        }
        if !self.any_of_tags.is_empty() && self.any_of_tags.is_disjoint(tags) {
            return false;
        }
        if self.label_patterns.is_empty() && self.exclude_patterns.is_empty() {
            return true;
        }

        let decoded = decode(label);
        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(&decoded))
        {
            return false;
        }
        if self.label_patterns.is_empty() {
            return true;
        }
        self.label_patterns
            .iter()
            .any(|pattern| pattern.is_match(&decoded))
    }
}
