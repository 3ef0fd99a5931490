//! FLYNC CLI - validate vehicle E/E network workspaces

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("flync=debug")
    } else {
        EnvFilter::new("flync=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color;
    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, color),
        Commands::Explain(args) => commands::explain::execute(args),
        Commands::Completions(args) => commands::completions::execute(args).map(|()| 0),
    }
}
