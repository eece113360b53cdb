use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "menubar-invert",
    about = "Invert the menu-bar icons of installed macOS apps for a dark menu bar",
    version
)]
pub struct Cli {
    /// Catalog file to use instead of ~/.menubar-invert/catalog.toml
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Log every command that runs
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Invert icons and relaunch every installed catalog entry (default)
    Run {
        /// Only process entries with this name (repeatable)
        #[arg(long)]
        only: Vec<String>,
    },
    /// Show catalog entries and where each one resolves
    List {
        #[arg(long)]
        only: Vec<String>,
    },
}
