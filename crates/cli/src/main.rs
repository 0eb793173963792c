//! Rightsize CLI
//!
//! A command-line tool that evaluates right-sizing rules against a compose
//! project and its running containers.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{rules, scan};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rightsize CLI
#[derive(Parser)]
#[command(name = "rightsize")]
#[command(author, about = "Recommend container resource limits from observed usage", long_about = None)]
pub struct Cli {
    /// Output format (defaults to the configured format)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a compose file and recommend resource settings
    Scan {
        /// Compose file to analyze
        compose: Option<PathBuf>,

        /// Use simulated stats instead of querying Docker
        #[arg(long)]
        simulate: bool,

        /// Seconds to wait for container stats
        #[arg(long, env = "RIGHTSIZE_TIMEOUT_SECS")]
        timeout: Option<u64>,

        /// Directory of rule files to use instead of the bundled rules
        #[arg(long, env = "RIGHTSIZE_RULES_DIR")]
        rules_dir: Option<PathBuf>,

        /// Print Prometheus metrics to stderr after the report
        #[arg(long)]
        metrics: bool,
    },

    /// Inspect the rule set
    #[command(subcommand)]
    Rules(RulesCommands),
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List every rule
    List {
        /// Directory of rule files to use instead of the bundled rules
        #[arg(long, env = "RIGHTSIZE_RULES_DIR")]
        rules_dir: Option<PathBuf>,
    },
}

/// Binary version plus the bundled ruleset version
fn version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        format!(
            "{} (rules {})",
            env!("CARGO_PKG_VERSION"),
            rightsize_lib::rules::embedded_version()
        )
    })
}

fn init_tracing(debug: bool, json: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Cli::command().version(version()).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let settings = config::Settings::load()?;
    init_tracing(cli.debug, settings.log_json);

    let format = match cli.format {
        Some(format) => format,
        None => settings.output_format()?,
    };

    match cli.command {
        Commands::Scan {
            compose,
            simulate,
            timeout,
            rules_dir,
            metrics,
        } => {
            let options = scan::ScanOptions {
                compose,
                simulate,
                timeout: timeout
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| settings.timeout()),
                rules_dir: rules_dir.or_else(|| settings.rules_dir.clone()),
                format,
                metrics,
            };
            scan::run(options).await?;
        }
        Commands::Rules(rules_cmd) => match rules_cmd {
            RulesCommands::List { rules_dir } => {
                let rules_dir = rules_dir.or_else(|| settings.rules_dir.clone());
                rules::list_rules(rules_dir.as_deref(), format)?;
            }
        },
    }

    Ok(())
}
