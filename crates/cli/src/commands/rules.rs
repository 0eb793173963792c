//! Rule inspection commands

use anyhow::Result;
use rightsize_lib::Rule;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::load_rules;
use crate::output::{color_priority, print_info, print_json, print_warning, render_table, OutputFormat};

/// Row for the rules table
#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Match")]
    selector: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Note")]
    note: String,
}

#[derive(Serialize)]
struct RuleListing<'a> {
    version: Option<&'a str>,
    rules: &'a [Rule],
}

fn format_selector(rule: &Rule) -> String {
    if rule.selector.is_empty() {
        return "(any)".to_string();
    }
    rule.selector
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// List every rule of the active rule set
pub fn list_rules(rules_dir: Option<&Path>, format: OutputFormat) -> Result<()> {
    let rules = load_rules(rules_dir)?;

    match format {
        OutputFormat::Json => print_json(&RuleListing {
            version: rules.version(),
            rules: rules.rules(),
        })?,
        OutputFormat::Table => {
            if rules.is_empty() {
                print_warning("No rules found");
                return Ok(());
            }

            let rows: Vec<RuleRow> = rules
                .iter()
                .map(|rule| RuleRow {
                    id: rule.id.clone(),
                    priority: color_priority(rule.priority),
                    selector: format_selector(rule),
                    condition: rule.condition.clone().unwrap_or_default(),
                    note: rule.note.clone().unwrap_or_default(),
                })
                .collect();

            println!("{}", render_table(rows));
            print_info(&format!(
                "{} rules, ruleset version {}",
                rules.len(),
                rules.version().unwrap_or("unversioned")
            ));
        }
    }

    Ok(())
}
