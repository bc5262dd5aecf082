//! Versions command - list versions across all upstream feeds.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use upstream_mirror::upstream::UpstreamClient;

use super::{connect, interrupt_token};

#[derive(Args)]
pub struct VersionsCmd {
    /// Package ID (e.g., Newtonsoft.Json)
    pub id: String,

    /// Print normalized versions instead of the feed's original text
    #[arg(long)]
    pub normalized: bool,
}

impl VersionsCmd {
    pub async fn run(&self, config: Option<&Path>) -> Result<()> {
        let upstream = connect(config)?;
        let cancel = interrupt_token();

        let versions = upstream.list_package_versions(&self.id, &cancel).await?;

        if versions.is_empty() {
            println!("No versions of '{}' found upstream.", self.id);
            return Ok(());
        }

        for version in &versions {
            if self.normalized {
                println!("{}", version);
            } else {
                println!("{}", version.original());
            }
        }
        Ok(())
    }
}
