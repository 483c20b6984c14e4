use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use flowsieve_core::analyzer::Analyzer;
use flowsieve_core::ingest::DEFAULT_BATCH_SIZE;
use flowsieve_core::models::{
    AnalysisReport, AnalyzerConfig, Category, ReportMetadata, SuggestParams,
};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to the CSV firewall log
    pub log: PathBuf,

    /// Top-N rows to show per category
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Coverage fraction a network scope must capture before it is proposed
    #[arg(long, default_value_t = 0.9)]
    pub ip_threshold: f64,

    /// Minimum share of destination-port traffic a port needs to be listed
    #[arg(long, default_value_t = 0.01)]
    pub min_port_share: f64,

    /// Maximum ports listed per rule
    #[arg(long, default_value_t = 3)]
    pub max_ports: usize,

    /// Maximum rules to emit
    #[arg(long, default_value_t = 10)]
    pub max_rules: usize,

    /// Stop once this fraction of destination traffic is covered
    #[arg(long, default_value_t = 0.8)]
    pub target_coverage: f64,

    /// Rows counted per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Write the full report as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let started = Instant::now();

    // 1. Ingest the log
    println!(
        "  {} {}",
        console::style("[1/3] ingesting").cyan().bold(),
        args.log.display(),
    );

    let mut analyzer = Analyzer::new(AnalyzerConfig {
        ip_threshold: args.ip_threshold,
        top_n: args.top,
    });
    let summary = analyzer
        .ingest_path(&args.log, args.batch_size)
        .with_context(|| format!("failed to ingest {}", args.log.display()))?;

    println!(
        "        {} records counted, {} malformed, sha256:{}",
        console::style(summary.records).green().bold(),
        summary.bad_rows,
        &summary.file_sha256[..16],
    );

    if analyzer.records() == 0 {
        println!(
            "  {} no countable records found in this file",
            console::style("warning:").yellow().bold(),
        );
        return Ok(());
    }

    // 2. Frequency rankings
    println!("  {}", console::style("[2/3] top values").cyan().bold());

    for (category, entries) in analyzer.top_tables() {
        println!("        {}:", console::style(category.label()).cyan());
        for (key, count) in &entries {
            println!("          {:>10}  {}", count, key);
        }
    }

    // 3. Condensed rule suggestions
    println!(
        "  {}",
        console::style("[3/3] condensing allow rules").cyan().bold(),
    );

    let params = SuggestParams {
        max_ports: args.max_ports,
        min_port_share: args.min_port_share,
        max_rules: args.max_rules,
        target_coverage: args.target_coverage,
    };
    let suggestions = analyzer.suggest_rules(&params);

    for suggestion in &suggestions {
        println!("        {} {}", console::style("*").green(), suggestion);
    }

    if let Some(ref json_path) = args.json {
        let report = AnalysisReport {
            metadata: ReportMetadata {
                flowsieve_version: flowsieve_core::VERSION.to_string(),
                generated_at: chrono::Utc::now(),
                log_filename: summary.filename.clone(),
                log_sha256: summary.file_sha256.clone(),
                log_size_bytes: summary.file_size,
                total_records: analyzer.records(),
                bad_rows: analyzer.bad_rows(),
            },
            top_source_ips: analyzer.top_n(Category::SrcIp, args.top),
            top_dest_ips: analyzer.top_n(Category::DstIp, args.top),
            top_source_ports: analyzer.top_n(Category::SrcPort, args.top),
            top_dest_ports: analyzer.top_n(Category::DstPort, args.top),
            suggestions: suggestions.clone(),
        };

        let report_json =
            serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(json_path, &report_json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;

        println!(
            "  {} {}",
            console::style("report ->").green().bold(),
            json_path.display(),
        );
    }

    println!(
        "  {} {:.1}ms",
        console::style("completed in").white().bold(),
        started.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(())
}
