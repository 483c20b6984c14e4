pub mod analyze;
pub mod suggest;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "flowsieve",
    about = "Firewall log analyser and condensed allow-rule suggester",
    long_about = "flowsieve - streaming firewall-log analysis: frequency rankings of\n\
                  sources, destinations and ports, condensed into the fewest, broadest\n\
                  allow-rule suggestions that still cover the observed traffic.",
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
    /// Analyze a firewall log: rank talkers, condense allow rules, write a report
    Analyze(analyze::AnalyzeArgs),

    /// Print only the condensed allow-rule suggestions
    Suggest(suggest::SuggestArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze(args) => analyze::run(args),
        Commands::Suggest(args) => suggest::run(args),
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
