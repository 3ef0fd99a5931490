//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// FLYNC - load, link and validate vehicle E/E network workspaces
#[derive(Parser)]
#[command(name = "flync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a workspace and report every problem found
    Validate(ValidateArgs),

    /// Show where an entity is declared and what it is linked to
    Explain(ExplainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Workspace root directory
    pub path: PathBuf,

    /// Expected workspace name (defaults to the root directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Print diagnostics as JSON
    #[arg(long)]
    pub json: bool,

    /// Load documents on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Treat warnings as errors
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Args)]
pub struct ExplainArgs {
    /// Workspace root directory
    pub path: PathBuf,

    /// Entity kind (ecu, ecu_port, connection, switch, switch_port, controller,
    /// controller_interface, socket, service_interface)
    pub kind: String,

    /// Entity name
    pub entity: String,

    /// Expected workspace name (defaults to the root directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
