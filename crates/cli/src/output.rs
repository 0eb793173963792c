//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use rightsize_lib::compose::ServiceReport;
use serde::Serialize;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows as a rounded table
pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a rule priority by band
pub fn color_priority(priority: i32) -> String {
    let text = priority.to_string();
    if priority >= 80 {
        text.red().to_string()
    } else if priority >= 50 {
        text.yellow().to_string()
    } else {
        text.normal().to_string()
    }
}

/// Row for the scan summary table
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Changes")]
    changes: String,
    #[tabled(rename = "Warnings")]
    warnings: String,
}

/// Human-readable report: a summary table followed by per-service details
pub fn render_reports(reports: &[ServiceReport]) -> String {
    if !reports.iter().any(ServiceReport::has_findings) {
        return "No optimizations or static issues found across all services.".to_string();
    }

    let rows: Vec<SummaryRow> = reports
        .iter()
        .map(|report| {
            let (rule, priority, changes) = match &report.patch {
                Some(patch) => (
                    patch.rule_id.clone().unwrap_or_default(),
                    color_priority(patch.priority),
                    (patch.set.len() + patch.set_env.len()).to_string(),
                ),
                None => ("-".to_string(), "-".to_string(), "0".to_string()),
            };
            SummaryRow {
                service: report.service_name.clone(),
                rule,
                priority,
                changes,
                warnings: report.static_warnings.len().to_string(),
            }
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{}", "Optimization Report".bold());
    let _ = writeln!(out, "{}", render_table(rows));

    for report in reports {
        let _ = writeln!(out, "\n{} {}", "Service:".bold(), report.service_name.cyan());

        if !report.has_findings() {
            let _ = writeln!(out, "  No optimizations or static warnings found for this service.");
            continue;
        }

        if !report.static_warnings.is_empty() {
            let _ = writeln!(out, "  Static Analysis Warnings:");
            for warning in &report.static_warnings {
                let _ = writeln!(out, "    {} {}", "⚠".yellow(), warning);
            }
        }

        let Some(patch) = &report.patch else {
            continue;
        };

        let _ = writeln!(
            out,
            "  Triggered Rule: {} (Priority: {})",
            patch.rule_id.as_deref().unwrap_or("-"),
            color_priority(patch.priority)
        );

        if !patch.set.is_empty() {
            let _ = writeln!(out, "  Suggested Changes:");
            for (key, value) in &patch.set {
                let was = report
                    .current
                    .get(key)
                    .and_then(|current| current.as_deref())
                    .unwrap_or("(not set)");
                let _ = writeln!(out, "    - Set {}: {} (was: {})", key, value.green(), was);
            }
        }

        if !patch.set_env.is_empty() {
            let _ = writeln!(out, "  Environment Variable Changes:");
            for (key, value) in &patch.set_env {
                let _ = writeln!(out, "    - Set {}={}", key, value.green());
            }
        }

        if let Some(action) = &patch.action {
            let _ = writeln!(out, "  Action Required: {}", action.yellow());
        }
    }

    out
}
