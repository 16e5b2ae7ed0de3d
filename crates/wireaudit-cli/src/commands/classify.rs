use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use clap::Args;
use serde::Serialize;

use wireaudit_core::ingest::{self, InputMetadata};
use wireaudit_core::{ClassificationResult, Classifier};

#[derive(Args)]
pub struct ClassifyArgs {
    /// Input batch: JSON array, newline-delimited JSON (EVE), or Suricata fast.log
    pub input: PathBuf,

    /// Classifier policy (TOML): scanner thresholds and legacy signatures
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the JSON report
    #[arg(short, long, default_value = "wireaudit-report.json")]
    pub out: PathBuf,

    /// Only classify records within N hours of the newest timestamp (0 = everything)
    #[arg(long, default_value_t = 0)]
    pub window_hours: i64,

    /// Keep only the last N lines of a fast.log (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_lines: usize,

    /// Rows to print per ranked list
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Records per parallel shard (0 = single pass)
    #[arg(long, default_value_t = 0)]
    pub shard_size: usize,
}

#[derive(Serialize)]
struct ReportMetadata {
    wireaudit_version: String,
    generated_at: DateTime<Utc>,
    input: InputMetadata,
    record_count: usize,
    window_hours: Option<i64>,
    duration_ms: u64,
}

#[derive(Serialize)]
struct Report<'a> {
    metadata: ReportMetadata,
    result: &'a ClassificationResult,
}

pub fn run(args: ClassifyArgs) -> Result<()> {
    let started = Instant::now();

    let window = recency_window(args.window_hours)?;
    let config = super::load_config(args.config.as_deref())?;
    let classifier = Classifier::new(config).context("classifier policy rejected")?;

    // 1. Load
    println!(
        "  {} {}",
        console::style("[1/3] loading").cyan().bold(),
        args.input.display(),
    );

    let max_lines = (args.max_lines > 0).then_some(args.max_lines);
    let mut batch = ingest::load_records(&args.input, max_lines)
        .with_context(|| format!("failed to load {}", args.input.display()))?;

    println!(
        "        {} records ({:?}, {} bytes, sha256:{})",
        console::style(batch.records.len()).green().bold(),
        batch.metadata.format,
        batch.metadata.size_bytes,
        &batch.metadata.sha256[..16],
    );

    let window_hours = window.map(|_| args.window_hours);
    if let Some(window) = window {
        let before = batch.records.len();
        ingest::retain_recent(&mut batch.records, window);
        println!(
            "        window {}h: kept {} of {} records",
            args.window_hours,
            console::style(batch.records.len()).green(),
            before,
        );
    }

    if batch.records.is_empty() {
        println!(
            "  {} no usable records found in this input",
            console::style("warning:").yellow().bold(),
        );
    }

    // 2. Classify
    println!("  {}", console::style("[2/3] classifying").cyan().bold());
    tracing::debug!(records = batch.records.len(), shard_size = args.shard_size, "classifying batch");

    let result = if args.shard_size > 0 {
        classifier.classify_parallel(&batch.records, args.shard_size)
    } else {
        classifier.classify(&batch.records)
    };

    if result.is_clean() {
        println!("        {}", console::style("no findings in this batch").green());
    }
    print_metrics(&result);
    print_scanners(&result, args.top);
    print_legacy_clients(&result, args.top);

    // 3. Write report
    println!("  {}", console::style("[3/3] writing report").cyan().bold());

    let elapsed = started.elapsed();
    let report = Report {
        metadata: ReportMetadata {
            wireaudit_version: wireaudit_core::VERSION.to_string(),
            generated_at: Utc::now(),
            input: batch.metadata,
            record_count: batch.records.len(),
            window_hours,
            duration_ms: elapsed.as_millis() as u64,
        },
        result: &result,
    };

    let report_json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    std::fs::write(&args.out, &report_json)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!();
    println!(
        "  {} {}",
        console::style("report ->").green().bold(),
        args.out.display(),
    );
    println!(
        "  {} {:.1}ms",
        console::style("completed in").white().bold(),
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(())
}

/// `0` disables the window; negative or out-of-range hours are rejected.
fn recency_window(hours: i64) -> Result<Option<TimeDelta>> {
    if hours < 0 {
        bail!("--window-hours must not be negative (got {hours})");
    }
    if hours == 0 {
        return Ok(None);
    }
    match TimeDelta::try_hours(hours) {
        Some(window) => Ok(Some(window)),
        None => bail!("--window-hours {hours} is out of range"),
    }
}

fn print_metrics(result: &ClassificationResult) {
    if result.metrics.is_clear() {
        println!("        no weak-practice indicators found");
    }
    for (rule, count) in result.metrics.iter() {
        let count_style = if count > 0 {
            console::style(count).red().bold()
        } else {
            console::style(count).dim()
        };
        println!(
            "        {:<16} {:>6}  {}",
            console::style(rule.name()).cyan(),
            count_style,
            console::style(rule.description()).dim(),
        );
    }
}

fn print_scanners(result: &ClassificationResult, top: usize) {
    if result.scanners.is_empty() {
        println!("        scanners: none");
        return;
    }
    println!(
        "        {} {}",
        console::style("SCANNERS:").red().bold(),
        console::style(result.scanners.len()).red().bold(),
    );
    for s in result.scanners.iter().take(top) {
        println!(
            "          {} {} distinct ports, {} flows",
            console::style(&s.address).yellow(),
            s.distinct_ports,
            s.flow_count,
        );
    }
    if result.scanners.len() > top {
        println!("          ... and {} more", result.scanners.len() - top);
    }
}

fn print_legacy_clients(result: &ClassificationResult, top: usize) {
    if result.legacy_clients.is_empty() {
        println!("        legacy clients: none");
        return;
    }
    println!(
        "        {} {}",
        console::style("LEGACY CLIENTS:").red().bold(),
        console::style(result.legacy_clients.len()).red().bold(),
    );
    for f in result.legacy_clients.iter().take(top) {
        println!(
            "          {} x{}",
            console::style(&f.pattern).yellow(),
            f.count,
        );
    }
    if result.legacy_clients.len() > top {
        println!("          ... and {} more", result.legacy_clients.len() - top);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_window() {
        assert_eq!(recency_window(0).unwrap(), None);
        assert_eq!(recency_window(24).unwrap(), Some(TimeDelta::hours(24)));
        assert!(recency_window(-1).is_err());
        assert!(recency_window(i64::MAX).is_err());
        assert!(recency_window(10_000_000_000).unwrap().is_some());
    }
}
