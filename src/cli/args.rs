//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Javelin - Fast Java dependency manager
///
/// Resolves declared dependencies into a reproducible lock file and
/// installs artifacts from Maven-style repositories into your project.
#[derive(Parser, Debug)]
#[command(name = "javelin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "JAVELIN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve dependencies and install artifacts
    Install(InstallArgs),

    /// Declare a new dependency and install it
    Add(AddArgs),

    /// Remove a declared dependency
    Remove(RemoveArgs),

    /// Update declared dependencies and re-resolve
    Update(UpdateArgs),

    /// Print the resolved dependency tree
    Tree(TreeArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Manifest file to install from (defaults to ./javelin.toml)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Skip test and provided scopes
    #[arg(long)]
    pub production: bool,

    /// Ignore the lock file and re-resolve
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the add command
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Dependency coordinate (group:artifact:version)
    pub coordinate: String,

    /// Dependency scope
    #[arg(short, long, default_value = "compile")]
    pub scope: String,

    /// Mark the dependency optional
    #[arg(long)]
    pub optional: bool,
}

/// Arguments for the remove command
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Dependency identity (group:artifact)
    pub coordinate: String,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Dependency identity (group:artifact); all when omitted
    pub coordinate: Option<String>,

    /// Bump the manifest pin to the newest published version
    #[arg(long)]
    pub latest: bool,
}

/// Arguments for the tree command
#[derive(Parser, Debug)]
pub struct TreeArgs {
    /// Show the full transitive tree, not only direct dependencies
    #[arg(long)]
    pub transitive: bool,
}
