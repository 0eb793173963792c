//! Subcommand implementations

pub mod rules;
pub mod scan;

use anyhow::{Context, Result};
use rightsize_lib::rules::{load_dir, load_embedded, RuleSet};
use std::path::Path;
use tracing::debug;

/// Load rules from `dir`, or the bundled rules when no directory is given
pub fn load_rules(dir: Option<&Path>) -> Result<RuleSet> {
    let rules = match dir {
        Some(dir) => load_dir(dir)
            .with_context(|| format!("Failed to load rules from {}", dir.display()))?,
        None => load_embedded().context("Failed to load bundled rules")?,
    };

    debug!(
        rules = rules.len(),
        version = rules.version().unwrap_or("unversioned"),
        "Rules loaded"
    );
    Ok(rules)
}
