//! Dispatch configuration
//!
//! One rule per line, `<regex> : <backend>[, <backend>...]`:
//!
//! ```text
//! # everything product related goes to both backends
//! ^product      : file, mysql
//! .*            : file
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Rules keep their
//! order; the first rule whose regex matches a method name decides.

use std::fmt;
use std::path::Path;

use opsirpc_common::protocol::error::{BackendError, Result};
use regex::Regex;
use serde_json::{json, Value};

/// One routing rule.
#[derive(Debug, Clone)]
pub struct DispatchRule {
    pattern: Regex,
    backends: Vec<String>,
}

impl DispatchRule {
    /// # Errors
    ///
    /// Returns `BackendError::Configuration` for an invalid regex, no
    /// backends or an empty backend name.
    pub fn new(pattern: &str, backends: Vec<String>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            BackendError::Configuration(format!(
                "Bad dispatcher config: invalid regex '{}': {}",
                pattern, e
            ))
        })?;
        if backends.is_empty() || backends.iter().any(String::is_empty) {
            return Err(BackendError::Configuration(format!(
                "Bad dispatcher config: {} has empty target backend: {:?}",
                pattern, backends
            )));
        }
        Ok(Self {
            pattern: regex,
            backends,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Whether the regex matches anywhere in `method`.
    pub fn matches(&self, method: &str) -> bool {
        self.pattern.is_match(method)
    }
}

/// Ordered routing rules.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    rules: Vec<DispatchRule>,
}

impl DispatchConfig {
    pub fn new(rules: Vec<DispatchRule>) -> Self {
        Self { rules }
    }

    /// Parses the line-based rule format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (pattern, backends) = line.split_once(':').ok_or_else(|| {
                BackendError::Configuration(format!(
                    "Bad dispatcher config line {}: missing ':' in '{}'",
                    number + 1,
                    line
                ))
            })?;
            let backends = backends
                .split(',')
                .map(|b| b.trim().to_string())
                .collect();
            rules.push(DispatchRule::new(pattern.trim(), backends)?);
        }
        Ok(Self { rules })
    }

    /// Reads and parses a dispatch config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BackendError::Configuration(format!(
                "Failed to load dispatch config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&text)
    }

    pub fn rules(&self) -> &[DispatchRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every backend name referenced by any rule, first mention first.
    pub fn backend_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for backend in self.rules.iter().flat_map(|r| r.backends.iter()) {
            if !names.contains(&backend.as_str()) {
                names.push(backend);
            }
        }
        names
    }

    /// The rules as `[[regex, [backend, ...]], ...]`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.rules
                .iter()
                .map(|r| json!([r.pattern(), r.backends]))
                .collect(),
        )
    }
}

impl fmt::Display for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{} : {}", rule.pattern(), rule.backends.join(", "))?;
        }
        Ok(())
    }
}
