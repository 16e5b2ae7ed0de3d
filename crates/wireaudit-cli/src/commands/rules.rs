use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use wireaudit_core::{Classifier, Rule};

#[derive(Args)]
pub struct RulesArgs {
    /// Classifier policy (TOML) to show instead of the built-in defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: RulesArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    // compile once so a broken table is reported here rather than mid-run
    let classifier = Classifier::new(config).context("classifier policy rejected")?;
    let config = classifier.config();

    println!("  {}", console::style("rules").cyan().bold());
    for rule in Rule::ALL {
        println!(
            "        {:<16} {}",
            console::style(rule.name()).green(),
            rule.description(),
        );
    }

    println!("  {}", console::style("scanner thresholds").cyan().bold());
    println!(
        "        distinct destination ports > {}  or  flows > {}",
        console::style(config.scanner.max_distinct_ports).yellow(),
        console::style(config.scanner.max_flows).yellow(),
    );

    println!(
        "  {} ({})",
        console::style("legacy client signatures").cyan().bold(),
        config.legacy_signatures.len(),
    );
    for sig in &config.legacy_signatures {
        println!(
            "        {:<20} {:<28} {}",
            console::style(&sig.id).green(),
            sig.pattern,
            console::style(sig.description.as_deref().unwrap_or("-")).dim(),
        );
    }

    Ok(())
}
