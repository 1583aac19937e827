use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "tech-radar", version)]
#[command(about = "Technology radar analytics over patent, project and publication data")]
pub struct Cli {
    #[arg(long, short, global = true, default_value = "tech-radar.toml")]
    pub config: PathBuf,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every analysis for one search term and print the response as JSON
    Analyze {
        #[arg(long, short)]
        term: String,

        /// Horizon in years, ending at the reference year
        #[arg(long, short)]
        years: Option<i32>,

        #[arg(long, help = "Pretty-print the JSON response")]
        pretty: bool,
    },
    /// Suggest search terms from dataset titles
    Suggest {
        #[arg(long, short)]
        prefix: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show dataset availability and completeness
    Status,
}
