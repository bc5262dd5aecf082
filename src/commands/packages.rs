//! Packages command - show package metadata across all upstream feeds.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use upstream_mirror::upstream::UpstreamClient;

use super::{connect, interrupt_token};

#[derive(Args)]
pub struct PackagesCmd {
    /// Package ID (e.g., Newtonsoft.Json)
    pub id: String,

    /// Print the full metadata as JSON
    #[arg(long)]
    pub json: bool,
}

impl PackagesCmd {
    pub async fn run(&self, config: Option<&Path>) -> Result<()> {
        let upstream = connect(config)?;
        let cancel = interrupt_token();

        let packages = upstream.list_packages(&self.id, &cancel).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&packages)
                .context("Failed to serialize package metadata")?;
            println!("{}", json);
            return Ok(());
        }

        if packages.is_empty() {
            println!("No packages named '{}' found upstream.", self.id);
            return Ok(());
        }

        for package in &packages {
            let mut flags = Vec::new();
            if !package.listed {
                flags.push("unlisted");
            }
            if package.is_prerelease {
                flags.push("prerelease");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };

            let dependencies = package
                .dependencies
                .iter()
                .filter(|d| !d.is_empty_group())
                .count();

            println!(
                "{}  {}  {} deps{}",
                package.identity(),
                package.published.format("%Y-%m-%d"),
                dependencies,
                flags
            );
            if let Some(description) = &package.description {
                println!("    {}", description.lines().next().unwrap_or_default());
            }
        }
        Ok(())
    }
}
