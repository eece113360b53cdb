use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

mod cli;
mod config;
mod engine;
mod host;
mod logging;
mod target;

use cli::{Cli, Command};
use config::Config;
use host::{Host, MacHost};
use target::{Locations, Target};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}", e);
    }

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = match &cli.config {
        Some(path) => config::load_from(&config::expand_path(path, &home))?,
        None => config::load(&home)?,
    };
    let locations = config.locations(home);

    match cli.command.unwrap_or(Command::Run { only: Vec::new() }) {
        Command::Run { only } => Ok(run(&config, &locations, &only)),
        Command::List { only } => {
            list(&config, &locations, &only);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_targets(config: &Config, locations: &Locations, only: &[String]) -> Vec<Target> {
    for name in only {
        if !config.targets.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            log::warn!("{}: not in catalog", name);
        }
    }
    config
        .select(only)
        .into_iter()
        .map(|entry| entry.to_target(locations))
        .collect()
}

fn run(config: &Config, locations: &Locations, only: &[String]) -> ExitCode {
    let targets = build_targets(config, locations, only);
    let mut host = MacHost::new(&config.settings);
    invert_all(&targets, &mut host, &mut io::stderr())
}

/// Run the catalog and turn the result into the process exit code. A fatal
/// failure writes its remediation hint to `hint_out`.
fn invert_all(targets: &[Target], host: &mut dyn Host, hint_out: &mut dyn Write) -> ExitCode {
    match engine::run(targets, host) {
        Ok(report) => {
            log::info!(
                "done: {} inverted, {} skipped",
                report.inverted.len(),
                report.skipped.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            let _ = writeln!(hint_out, "    {}", e.hint());
            ExitCode::FAILURE
        }
    }
}

fn list(config: &Config, locations: &Locations, only: &[String]) {
    for target in build_targets(config, locations, only) {
        println!(
            "{:<7} {:<32} {}",
            target.variant.label(),
            target.name,
            target.resolve()
        );
    }
}
