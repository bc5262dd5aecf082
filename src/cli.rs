//! CLI argument definitions.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::commands::{ConfigCmd, DownloadCmd, PackagesCmd, VersionsCmd};

#[derive(Parser)]
#[command(name = "upmirror")]
#[command(about = "Upmirror - query and download packages from upstream NuGet feeds")]
#[command(version)]
pub struct Cli {
    /// Mirror config file (default: ~/.config/upmirror/mirror.toml)
    #[arg(long, short = 'c', global = true, env = "UPMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every version of a package known to the upstream feeds
    Versions(VersionsCmd),

    /// Show package metadata from the upstream feeds
    Packages(PackagesCmd),

    /// Download a package from the first feed that has it
    Download(DownloadCmd),

    /// Inspect the mirror configuration
    Config(ConfigCmd),
}

impl Command {
    pub async fn execute(&self, config: Option<&Path>) -> anyhow::Result<()> {
        match self {
            Command::Versions(cmd) => cmd.run(config).await,
            Command::Packages(cmd) => cmd.run(config).await,
            Command::Download(cmd) => cmd.run(config).await,
            Command::Config(cmd) => cmd.run(config),
        }
    }
}
