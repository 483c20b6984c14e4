use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use flowsieve_core::analyzer::Analyzer;
use flowsieve_core::ingest::DEFAULT_BATCH_SIZE;
use flowsieve_core::models::{AnalyzerConfig, SuggestParams};

#[derive(Args)]
pub struct SuggestArgs {
    /// Path to the CSV firewall log
    pub log: PathBuf,

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
}

pub fn run(args: SuggestArgs) -> Result<()> {
    let mut analyzer = Analyzer::new(AnalyzerConfig {
        ip_threshold: args.ip_threshold,
        ..Default::default()
    });
    analyzer
        .ingest_path(&args.log, args.batch_size)
        .with_context(|| format!("failed to ingest {}", args.log.display()))?;

    let params = SuggestParams {
        max_ports: args.max_ports,
        min_port_share: args.min_port_share,
        max_rules: args.max_rules,
        target_coverage: args.target_coverage,
    };

    for suggestion in analyzer.suggest_rules(&params) {
        println!("  {} {}", console::style("*").green(), suggestion);
    }

    Ok(())
}
