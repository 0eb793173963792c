//! Rule set loading
//!
//! Rule files are YAML documents with a top-level `rules:` list. A bundled
//! default set is compiled into the binary; a directory of rule files can be
//! loaded instead. Duplicate ids are rejected across the whole set.

use crate::models::Rule;
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the file holding the ruleset version
pub const VERSION_FILE: &str = "VERSION";

const EMBEDDED_VERSION: &str = include_str!("../../rules/VERSION");

const EMBEDDED_RULES: &[(&str, &str)] = &[
    ("cpu.yml", include_str!("../../rules/cpu.yml")),
    ("memory.yml", include_str!("../../rules/memory.yml")),
    ("runtime.yml", include_str!("../../rules/runtime.yml")),
];

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("rule without id in {file}")]
    MissingId { file: String },
    #[error("duplicate id {id} in {file} (first defined in {first})")]
    DuplicateId {
        id: String,
        file: String,
        first: String,
    },
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Immutable, validated rule set loaded once per run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
    version: Option<String>,
}

impl RuleSet {
    /// Build a rule set from rules, rejecting duplicate ids
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleLoadError> {
        let mut builder = RuleSetBuilder::default();
        builder.add("<inline>", rules)?;
        Ok(builder.build(None))
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Deref for RuleSet {
    type Target = [Rule];

    fn deref(&self) -> &[Rule] {
        &self.rules
    }
}

/// Accumulates rule files while tracking where each id was first seen
#[derive(Debug, Default)]
struct RuleSetBuilder {
    rules: Vec<Rule>,
    seen: HashMap<String, String>,
}

impl RuleSetBuilder {
    fn add(&mut self, file: &str, rules: Vec<Rule>) -> Result<(), RuleLoadError> {
        for rule in rules {
            if rule.id.trim().is_empty() {
                return Err(RuleLoadError::MissingId {
                    file: file.to_string(),
                });
            }
            if !rule.id.contains('@') {
                warn!(rule_id = %rule.id, file = %file, "Rule id has no @version suffix");
            }
            if let Some(first) = self.seen.get(&rule.id) {
                return Err(RuleLoadError::DuplicateId {
                    id: rule.id.clone(),
                    file: file.to_string(),
                    first: first.clone(),
                });
            }
            self.seen.insert(rule.id.clone(), file.to_string());
            self.rules.push(rule);
        }
        Ok(())
    }

    fn build(self, version: Option<String>) -> RuleSet {
        RuleSet {
            rules: self.rules,
            version,
        }
    }
}

/// Parse one YAML rule file
pub fn parse_rule_file(file: &str, content: &str) -> Result<Vec<Rule>, RuleLoadError> {
    let parsed: RuleFile = serde_yaml::from_str(content).map_err(|source| RuleLoadError::Parse {
        file: file.to_string(),
        source,
    })?;
    Ok(parsed.rules)
}

/// Build a rule set from `(file name, content)` pairs in the given order
pub fn load_sources<'a>(
    sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    version: Option<String>,
) -> Result<RuleSet, RuleLoadError> {
    let mut builder = RuleSetBuilder::default();
    for (file, content) in sources {
        let rules = parse_rule_file(file, content)?;
        debug!(file = %file, count = rules.len(), "Parsed rule file");
        builder.add(file, rules)?;
    }
    Ok(builder.build(version))
}

/// Version string of the bundled rule set
pub fn embedded_version() -> &'static str {
    EMBEDDED_VERSION.trim()
}

/// Load the rule set compiled into the binary
pub fn load_embedded() -> Result<RuleSet, RuleLoadError> {
    load_sources(
        EMBEDDED_RULES.iter().copied(),
        Some(embedded_version().to_string()),
    )
}

/// Load every `.yml`/`.yaml` file of a directory, in file name order.
///
/// A `VERSION` file, when present, becomes the ruleset version.
pub fn load_dir(dir: &Path) -> Result<RuleSet, RuleLoadError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| RuleLoadError::Io { path, source }
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yml" || e == "yaml");
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();

    let mut contents = Vec::with_capacity(files.len());
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content = std::fs::read_to_string(path).map_err(io_err(path))?;
        contents.push((name, content));
    }

    let version_path = dir.join(VERSION_FILE);
    let version = if version_path.is_file() {
        let raw = std::fs::read_to_string(&version_path).map_err(io_err(&version_path))?;
        Some(raw.trim().to_string()).filter(|v| !v.is_empty())
    } else {
        None
    };

    load_sources(
        contents.iter().map(|(n, c)| (n.as_str(), c.as_str())),
        version,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DB_RULES: &str = r#"
rules:
  - id: mem-cap-db@1.0.0
    priority: 80
    match:
      kind: db
    if: peak_mem_mb > 800
    set:
      mem_limit: "1024m"
  - id: cpu-limit-db@1.0.0
    priority: 70
    match:
      kind: db
    set:
      cpus: "0.5"
"#;

    #[test]
    fn test_embedded_rules_load() {
        let rules = load_embedded().unwrap();
        assert!(!rules.is_empty());
        assert_eq!(rules.version(), Some(embedded_version()));
        assert!(rules.iter().any(|r| r.id == "mem-cap-db@1.0.0"));
        assert!(rules.iter().all(|r| r.id.contains('@')));
    }

    #[test]
    fn test_parse_rule_file() {
        let rules = parse_rule_file("db.yml", DB_RULES).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].priority, 80);
        assert_eq!(rules[1].set.get("cpus").map(String::as_str), Some("0.5"));
    }

    #[test]
    fn test_duplicate_ids_across_files() {
        let err = load_sources([("a.yml", DB_RULES), ("b.yml", DB_RULES)], None).unwrap_err();
        match err {
            RuleLoadError::DuplicateId { id, file, first } => {
                assert_eq!(id, "mem-cap-db@1.0.0");
                assert_eq!(file, "b.yml");
                assert_eq!(first, "a.yml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_set_new_rejects_duplicates() {
        let rules = parse_rule_file("db.yml", DB_RULES).unwrap();
        let mut doubled = rules.clone();
        doubled.extend(rules);
        assert!(matches!(
            RuleSet::new(doubled),
            Err(RuleLoadError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_missing_id_rejected() {
        let yaml = "rules:\n  - id: \"  \"\n    priority: 1\n";
        assert!(matches!(
            load_sources([("x.yml", yaml)], None),
            Err(RuleLoadError::MissingId { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load_sources([("bad.yml", "rules: [")], None).unwrap_err();
        assert!(matches!(err, RuleLoadError::Parse { .. }));
        assert!(err.to_string().contains("bad.yml"));
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("db.yml"), DB_RULES).unwrap();
        std::fs::write(
            dir.path().join("web.yaml"),
            "rules:\n  - id: web@1.0.0\n    priority: 5\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not rules").unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "2026.01.0\n").unwrap();

        let rules = load_dir(dir.path()).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.version(), Some("2026.01.0"));
        assert_eq!(rules[2].id, "web@1.0.0");
    }

    #[test]
    fn test_load_missing_dir() {
        let err = load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RuleLoadError::Io { .. }));
    }
}
