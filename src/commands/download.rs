//! Download command - fetch package content from the first feed that has it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::info;
use upstream_mirror::types::PackageVersion;
use upstream_mirror::upstream::UpstreamClient;

use super::{connect, interrupt_token};

#[derive(Args)]
pub struct DownloadCmd {
    /// Package ID (e.g., Newtonsoft.Json)
    pub id: String,

    /// Package version (e.g., 13.0.3)
    pub version: String,

    /// Output file (default: {id}.{version}.nupkg in the current directory)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl DownloadCmd {
    pub async fn run(&self, config: Option<&Path>) -> Result<()> {
        let version = PackageVersion::parse(&self.version)
            .with_context(|| format!("Invalid version: {}", self.version))?;

        let upstream = connect(config)?;
        let cancel = interrupt_token();

        let Some(content) = upstream
            .download_package_or_none(&self.id, &version, &cancel)
            .await?
        else {
            bail!("{}@{} was not found on any upstream feed", self.id, version);
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_file_name(&self.id, &version));

        let written = content
            .persist_to(&output)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!(package = %self.id, version = %version, bytes = written, "package saved");
        println!("Saved {} ({} bytes)", output.display(), written);
        Ok(())
    }
}

fn default_file_name(id: &str, version: &PackageVersion) -> PathBuf {
    PathBuf::from(format!("{}.{}.nupkg", id, version).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_name() {
        let version = PackageVersion::parse("1.0.0-Beta+build").unwrap();
        assert_eq!(
            default_file_name("Newtonsoft.Json", &version),
            PathBuf::from("newtonsoft.json.1.0.0-beta.nupkg")
        );
    }
}
