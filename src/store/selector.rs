//! # Label Selector
//!
//! Conjunction of equality and existence requirements over record labels.
//! Renders to the Kubernetes selector syntax for server-side filtering and
//! evaluates locally for stores (and workload templates) that filter client-side.

use std::collections::BTreeMap;
use std::fmt;

/// A single selector requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `key=value`
    Equals { key: String, value: String },
    /// `key` (label present, any value)
    Exists { key: String },
}

impl Requirement {
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::Exists { key } => labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::Exists { key } => write!(f, "{key}"),
        }
    }
}

/// All requirements must hold; an empty selector matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.push(Requirement::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::Exists { key: key.into() });
        self
    }

    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// Kubernetes selector string, e.g. `environmentGroupName=db,environmentGroupVersion`
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_renders_kubernetes_syntax() {
        let selector = LabelSelector::new()
            .eq("environmentGroupName", "db")
            .exists("environmentGroupVersion");
        assert_eq!(
            selector.to_string(),
            "environmentGroupName=db,environmentGroupVersion"
        );
        assert_eq!(LabelSelector::new().to_string(), "");
    }

    #[test]
    fn test_matches_requires_all_requirements() {
        let selector = LabelSelector::new().eq("a", "1").exists("b");

        assert!(selector.matches(&labels(&[("a", "1"), ("b", "")])));
        assert!(!selector.matches(&labels(&[("a", "1")])));
        assert!(!selector.matches(&labels(&[("a", "2"), ("b", "x")])));
        assert!(LabelSelector::new().matches(&labels(&[])));
    }
}
