pub mod classify;
pub mod rules;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wireaudit_core::ClassifierConfig;

#[derive(Parser)]
#[command(
    name = "wireaudit",
    about = "Weak-security-practice triage for network flow and alert logs",
    long_about = "wireaudit - heuristic triage of flow/alert records for cleartext admin protocols,\n\
                  Basic auth, plaintext password submission, exposed databases, outdated TLS,\n\
                  default SNMP communities, boundary-crossing SMB, scanners and legacy clients.",
    version,
    propagate_version = true,
    styles = get_styles(),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a batch (JSON array, EVE ndjson, or Suricata fast.log) and write a report
    Classify(classify::ClassifyArgs),

    /// Show the rule battery, scanner thresholds and legacy client signatures
    Rules(rules::RulesArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Classify(args) => classify::run(args),
        Commands::Rules(args) => rules::run(args),
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<ClassifierConfig> {
    match path {
        Some(p) => ClassifierConfig::load(p),
        None => Ok(ClassifierConfig::default()),
    }
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .usage(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .literal(
            clap::builder::styling::AnsiColor::BrightGreen
                .on_default()
                .bold(),
        )
        .placeholder(
            clap::builder::styling::AnsiColor::BrightWhite
                .on_default()
                .dimmed(),
        )
}
