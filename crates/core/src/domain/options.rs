// Caller-supplied generator options

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::{DomainError, Result};

/// Keys accepted for the "include example code" toggle
pub const INCLUDE_EXAMPLES_KEYS: [&str; 2] = ["includeExamples", "include_examples"];

/// Keys accepted for the "include test code" toggle
pub const INCLUDE_TESTS_KEYS: [&str; 2] = ["includeTests", "include_tests"];

/// Keys owned by the job itself; never forwarded as generator options
pub const RESERVED_KEYS: [&str; 3] = ["packageName", "package_name", "package"];

pub const DEFAULT_INCLUDE_EXAMPLES: bool = true;
pub const DEFAULT_INCLUDE_TESTS: bool = false;

/// Free-form option map (keys are not statically enumerable)
///
/// Two keys are typed toggles; everything else is passed through to the
/// selected generator untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions(BTreeMap<String, String>);

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// "Include example code" toggle (default: true)
    pub fn include_examples(&self) -> Result<bool> {
        self.toggle(&INCLUDE_EXAMPLES_KEYS, DEFAULT_INCLUDE_EXAMPLES)
    }

    /// "Include test code" toggle (default: false)
    pub fn include_tests(&self) -> Result<bool> {
        self.toggle(&INCLUDE_TESTS_KEYS, DEFAULT_INCLUDE_TESTS)
    }

    /// Options that are neither typed toggles nor reserved, in key order
    pub fn passthrough(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter(|(k, _)| {
                let key = k.as_str();
                !INCLUDE_EXAMPLES_KEYS.contains(&key)
                    && !INCLUDE_TESTS_KEYS.contains(&key)
                    && !RESERVED_KEYS.contains(&key)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn toggle(&self, keys: &[&str], default: bool) -> Result<bool> {
        let Some((key, raw)) = keys
            .iter()
            .find_map(|k| self.0.get(*k).map(|v| (*k, v.as_str())))
        else {
            return Ok(default);
        };

        parse_bool(raw).ok_or_else(|| {
            DomainError::ValidationError(format!(
                "option '{}' must be a boolean, got '{}'",
                key, raw
            ))
        })
    }
}

impl FromIterator<(String, String)> for JobOptions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Strict boolean parsing; anything unrecognized is rejected rather than
/// coerced to a default
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_defaults() {
        let options = JobOptions::new();
        assert!(options.include_examples().unwrap());
        assert!(!options.include_tests().unwrap());
    }

    #[test]
    fn test_explicit_false_is_honored() {
        let options = JobOptions::new()
            .with("includeExamples", "false")
            .with("include_tests", "yes");
        assert!(!options.include_examples().unwrap());
        assert!(options.include_tests().unwrap());
    }

    #[test]
    fn test_invalid_boolean_is_rejected() {
        let options = JobOptions::new().with("includeTests", "maybe");
        let err = options.include_tests().unwrap_err();
        assert!(err.to_string().contains("includeTests"));
    }

    #[test]
    fn test_passthrough_excludes_toggles() {
        let options = JobOptions::new()
            .with("includeExamples", "true")
            .with("clientName", "Acme")
            .with("noSerdeLayer", "true");

        let extra = options.passthrough();
        assert_eq!(extra.len(), 2);
        assert_eq!(extra.get("clientName").map(String::as_str), Some("Acme"));
        assert!(!extra.contains_key("includeExamples"));
    }

    #[test]
    fn test_passthrough_never_carries_package_name() {
        let options = JobOptions::new()
            .with("packageName", "../../evil name")
            .with("package_name", "other")
            .with("package", "third")
            .with("clientName", "Acme");

        let extra = options.passthrough();
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("clientName"));
    }

    #[test]
    fn test_on_off_are_not_booleans() {
        assert_eq!(parse_bool("on"), None);
        assert_eq!(parse_bool("off"), None);
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
    }
}
